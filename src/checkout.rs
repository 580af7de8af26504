//! Checkout flow: order loading, cart mutations, and payment dispatch.
//!
//! Data flows one direction: fetch the active order, aggregate prices,
//! take the operator's tender, reconcile, then dispatch exactly one payment
//! path. Nothing here survives beyond a single cart session; every open
//! re-derives state from the backend.
//!
//! Invariant: at most one in-flight payment dispatch per order at any time.
//! A second dispatch while one is pending is rejected locally before any
//! network call.

use std::collections::HashSet;
use std::sync::Mutex;

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, CashPaymentRequest};
use crate::models::{ItemUpdate, LineItem, Order, OrderStatus, PaymentIntent, PaymentMethod};
use crate::notice::{self, Notice};
use crate::pricing;
use crate::reconcile::{self, TenderStatus};
use crate::session::{Session, SessionStore};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The one-dispatch-per-order invariant rejected a duplicate submit.
    #[error("a payment for order {0} is already in progress")]
    DispatchInFlight(String),
    /// A blocking tender validation error; the message is user-facing.
    #[error("{0}")]
    InvalidTender(String),
    #[error("session storage failure: {0}")]
    Store(String),
    #[error("failed to open payment page: {0}")]
    Browser(String),
}

/// Map a checkout failure to the notice the UI shell shows. Generic surface
/// for loads and cart mutations; dispatch call sites use
/// [`payment_failure_notice`] instead.
pub fn notice_for(err: &CheckoutError) -> Notice {
    match err {
        CheckoutError::Api(ApiError::SessionExpired) => {
            Notice::error(notice::MSG_SESSION_EXPIRED)
        }
        CheckoutError::InvalidTender(msg) => Notice::error(msg.clone()),
        CheckoutError::DispatchInFlight(_) => Notice::warning(notice::MSG_DISPATCH_IN_FLIGHT),
        CheckoutError::Api(_) | CheckoutError::Store(_) | CheckoutError::Browser(_) => {
            Notice::error(notice::MSG_RETRY_LATER)
        }
    }
}

/// Notice for a failed payment dispatch. The intent stays open for retry.
pub fn payment_failure_notice(err: &CheckoutError) -> Notice {
    match err {
        CheckoutError::Api(ApiError::SessionExpired) => {
            Notice::error(notice::MSG_SESSION_EXPIRED)
        }
        CheckoutError::InvalidTender(msg) => Notice::error(msg.clone()),
        CheckoutError::DispatchInFlight(_) => Notice::warning(notice::MSG_DISPATCH_IN_FLIGHT),
        _ => Notice::error(notice::MSG_PAYMENT_FAILED),
    }
}

// ---------------------------------------------------------------------------
// In-flight dispatch guard
// ---------------------------------------------------------------------------

/// Tracks which orders currently have a payment dispatch in flight.
#[derive(Debug, Default)]
pub struct CheckoutState {
    in_flight: Mutex<HashSet<String>>,
}

impl CheckoutState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dispatching(&self, order_id: &str) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(order_id))
            .unwrap_or(false)
    }

    /// Claim the dispatch slot for an order. The returned guard releases the
    /// slot on drop, including on early return and panic unwind.
    fn begin_dispatch(&self, order_id: &str) -> Result<DispatchGuard<'_>, CheckoutError> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|e| CheckoutError::Store(e.to_string()))?;
        if !set.insert(order_id.to_string()) {
            return Err(CheckoutError::DispatchInFlight(order_id.to_string()));
        }
        Ok(DispatchGuard {
            state: self,
            order_id: order_id.to_string(),
        })
    }
}

#[derive(Debug)]
struct DispatchGuard<'a> {
    state: &'a CheckoutState,
    order_id: String,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.state.in_flight.lock() {
            set.remove(&self.order_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Session helpers
// ---------------------------------------------------------------------------

fn require_session(sessions: &SessionStore) -> Result<Session, CheckoutError> {
    sessions
        .current()
        .ok_or(CheckoutError::Api(ApiError::SessionExpired))
}

/// Convert an API failure, clearing the stored session first when the
/// backend rejected the credential. Uniform across every call path.
fn on_api_error(sessions: &SessionStore, err: ApiError) -> CheckoutError {
    if matches!(err, ApiError::SessionExpired) {
        if let Err(e) = sessions.clear() {
            warn!(error = %e, "failed to clear session after auth rejection");
        }
    }
    CheckoutError::Api(err)
}

// ---------------------------------------------------------------------------
// Order loading
// ---------------------------------------------------------------------------

/// Fetch the active order for this terminal. `None` means there is no open
/// cart: either no order has been started, or the order reached a terminal
/// state out-of-band (wallet settlement, cancellation elsewhere) and the
/// local reference is dropped.
pub async fn load_active_order(
    client: &ApiClient,
    sessions: &SessionStore,
) -> Result<Option<Order>, CheckoutError> {
    let order_id = match sessions.active_order_id() {
        Some(id) => id,
        None => return Ok(None),
    };
    let session = require_session(sessions)?;

    let order = client
        .fetch_order(&session, &order_id)
        .await
        .map_err(|e| on_api_error(sessions, e))?;

    if order.status.is_terminal() {
        info!(order_id = %order.id, status = order.status.as_str(), "order settled out-of-band, dropping local reference");
        sessions
            .set_active_order_id(None)
            .map_err(CheckoutError::Store)?;
        return Ok(None);
    }

    let local_total = pricing::order_total(&order.items);
    if order.total != 0 && order.total != local_total {
        warn!(
            order_id = %order.id,
            backend_total = order.total,
            local_total,
            "backend and local order totals disagree"
        );
    }

    Ok(Some(order))
}

// ---------------------------------------------------------------------------
// Cart mutations
// ---------------------------------------------------------------------------

/// Remove one line item from the order.
pub async fn remove_item(
    client: &ApiClient,
    sessions: &SessionStore,
    order_id: &str,
    item_id: &str,
) -> Result<(), CheckoutError> {
    let session = require_session(sessions)?;
    client
        .delete_order_item(&session, order_id, item_id)
        .await
        .map_err(|e| on_api_error(sessions, e))
}

/// Change a line item's size and/or quantity.
pub async fn update_item(
    client: &ApiClient,
    sessions: &SessionStore,
    order_id: &str,
    item_id: &str,
    update: &ItemUpdate,
) -> Result<(), CheckoutError> {
    let session = require_session(sessions)?;
    client
        .update_order_item(&session, order_id, item_id, update)
        .await
        .map_err(|e| on_api_error(sessions, e))
}

/// Cancel the order and drop the local reference to it.
pub async fn cancel_order(
    client: &ApiClient,
    sessions: &SessionStore,
    order_id: &str,
) -> Result<(), CheckoutError> {
    let session = require_session(sessions)?;
    client
        .set_order_status(&session, order_id, OrderStatus::Cancelled)
        .await
        .map_err(|e| on_api_error(sessions, e))?;
    sessions
        .set_active_order_id(None)
        .map_err(CheckoutError::Store)?;
    info!(order_id, "order cancelled");
    Ok(())
}

// ---------------------------------------------------------------------------
// Payment dispatch
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum DispatchOutcome {
    /// Cash recorded and confirmed by the backend; the cart is closed.
    CashSettled { change: i64, notice: Notice },
    /// Wallet session created; the operator opens `pay_url` and the cart
    /// stays open until the return redirect confirms settlement.
    WalletRedirect { pay_url: String, notice: Notice },
}

/// Dispatch a finalized payment intent for an order.
///
/// Cash: re-validates the tender against the aggregated total and the
/// drawer balance (advisory only), records the payment idempotently, then
/// clears the local order state. Wallet: creates a payment session,
/// retrying exactly once through the re-create endpoint on conflict, and
/// returns the redirect URL without touching local order state.
pub async fn dispatch_payment(
    client: &ApiClient,
    sessions: &SessionStore,
    state: &CheckoutState,
    order_id: &str,
    items: &[LineItem],
    intent: &PaymentIntent,
) -> Result<DispatchOutcome, CheckoutError> {
    let _guard = state.begin_dispatch(order_id)?;
    let session = require_session(sessions)?;

    match intent.method {
        PaymentMethod::Cash => {
            let total = pricing::order_total(items);

            // Advisory read: a missing or failing drawer endpoint means
            // "unknown", which skips the shortfall warning silently.
            let drawer = match client.drawer_balance(&session).await {
                Ok(balance) => balance,
                Err(ApiError::SessionExpired) => {
                    return Err(on_api_error(sessions, ApiError::SessionExpired));
                }
                Err(e) => {
                    warn!(error = %e, "drawer balance unavailable, skipping advisory");
                    None
                }
            };

            let status = reconcile::reconcile(intent.tendered, total, drawer);
            if status.blocks_confirmation() {
                let message = status
                    .notice()
                    .map(|n| n.message)
                    .unwrap_or_else(|| notice::MSG_AMOUNT_REQUIRED.to_string());
                return Err(CheckoutError::InvalidTender(message));
            }
            let change = status.change().unwrap_or(0);
            if matches!(
                status,
                TenderStatus::Accepted {
                    drawer_short: true,
                    ..
                }
            ) {
                warn!(order_id, change, "drawer cannot cover change, operator chose to proceed");
            }

            let tendered = intent.tendered.unwrap_or(total);
            let note = intent.note.clone().unwrap_or_else(|| {
                format!(
                    "Khách đưa {}, thối lại {}",
                    pricing::format_vnd(tendered),
                    pricing::format_vnd(change)
                )
            });

            let request = CashPaymentRequest {
                order_id: order_id.to_string(),
                method: PaymentMethod::Cash,
                note,
                idempotency_key: intent.idempotency_key.clone(),
            };
            client
                .record_cash_payment(&session, &request)
                .await
                .map_err(|e| on_api_error(sessions, e))?;

            sessions
                .set_active_order_id(None)
                .map_err(CheckoutError::Store)?;

            Ok(DispatchOutcome::CashSettled {
                change,
                notice: Notice::info(notice::MSG_CASH_RECORDED),
            })
        }
        PaymentMethod::Momo => {
            let pay_url = match client.create_wallet_payment(&session, order_id).await {
                Ok(url) => url,
                Err(ApiError::Conflict) => {
                    info!(order_id, "wallet payment session already exists, re-creating once");
                    client
                        .recreate_wallet_payment(&session, order_id)
                        .await
                        .map_err(|e| on_api_error(sessions, e))?
                }
                Err(e) => return Err(on_api_error(sessions, e)),
            };

            // Settlement is asynchronous; the order stays active until the
            // return redirect is observed by load_active_order.
            Ok(DispatchOutcome::WalletRedirect {
                pay_url,
                notice: Notice::info(notice::MSG_WALLET_OPENED),
            })
        }
    }
}

/// Open the wallet payment page in the system browser.
pub fn open_payment_page(pay_url: &str) -> Result<(), CheckoutError> {
    let parsed = reqwest::Url::parse(pay_url)
        .map_err(|e| CheckoutError::Browser(format!("invalid payment URL {pay_url}: {e}")))?;
    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(CheckoutError::Browser(format!(
            "refusing to open non-http payment URL {pay_url}"
        )));
    }
    webbrowser::open(parsed.as_str())
        .map_err(|e| CheckoutError::Browser(e.to_string()))?;
    info!(host = parsed.host_str().unwrap_or("unknown"), "opened wallet payment page");
    Ok(())
}

// ---------------------------------------------------------------------------
// Wallet return detection
// ---------------------------------------------------------------------------

/// Whether a wallet return redirect URL carries the success indicator.
pub fn wallet_return_success(url: &str) -> bool {
    let parsed = match reqwest::Url::parse(url) {
        Ok(u) => u,
        Err(_) => return false,
    };
    parsed.query_pairs().any(|(key, value)| {
        (key == "resultCode" && value == "0") || (key == "status" && value == "success")
    })
}

/// Handle a wallet return redirect: on success, drop the local order
/// reference so the next load sees an empty cart. Returns whether the
/// redirect reported a settled payment.
pub fn handle_wallet_return(sessions: &SessionStore, url: &str) -> Result<bool, CheckoutError> {
    if !wallet_return_success(url) {
        return Ok(false);
    }
    info!("wallet return redirect reports success");
    sessions
        .set_active_order_id(None)
        .map_err(CheckoutError::Store)?;
    Ok(true)
}

// ===========================================================================
// Tests
// ===========================================================================
