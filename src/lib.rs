//! Milk-tea POS checkout terminal core.
//!
//! Logic layer for the counter terminal of a milk-tea shop: load the active
//! order from the back-office REST API, aggregate line-item prices, validate
//! a cash tender against the drawer balance, and dispatch cash or MoMo
//! wallet payments. The UI shell on top of this crate only renders state and
//! forwards operator input; all checkout behavior lives here.

use std::path::Path;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod checkout;
pub mod models;
pub mod notice;
pub mod pricing;
pub mod reconcile;
pub mod session;

#[cfg(test)]
mod testutil;

/// Initialize structured logging: console plus a daily-rolling file in
/// `log_dir`. Call once at startup.
pub fn init_logging(log_dir: &Path) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,milktea_pos=debug"));

    std::fs::create_dir_all(log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(log_dir, "pos");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Dropping the guard flushes and stops the writer, so leak it; logging
    // runs until process exit.
    std::mem::forget(guard);

    info!("milktea-pos terminal core v{}", env!("CARGO_PKG_VERSION"));
}
