//! Operator session storage.
//!
//! The bearer credential, the operator's role, and the active order id are
//! kept in the OS credential store (DPAPI on Windows, Keychain on macOS,
//! Secret Service on Linux, via the `keyring` crate). All reads go through
//! one accessor (`SessionStore::current`) and all teardown through one
//! mutator (`SessionStore::clear`), so a session-expired signal from the
//! backend wipes everything in a single place.

use std::collections::HashMap;
use std::sync::Mutex;

use keyring::Entry;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::models::StaffRole;

const SERVICE_NAME: &str = "milktea-pos";

// Credential keys
const KEY_ACCESS_TOKEN: &str = "access_token";
const KEY_STAFF_ROLE: &str = "staff_role";
const KEY_STAFF_NAME: &str = "staff_name";
const KEY_ACTIVE_ORDER_ID: &str = "active_order_id";

/// All credential keys managed by this module.
const ALL_KEYS: &[&str] = &[
    KEY_ACCESS_TOKEN,
    KEY_STAFF_ROLE,
    KEY_STAFF_NAME,
    KEY_ACTIVE_ORDER_ID,
];

// ---------------------------------------------------------------------------
// Credential store backends
// ---------------------------------------------------------------------------

/// Key-value backend for session credentials. The production backend is the
/// OS keyring; `MemoryStore` serves tests and headless deployments.
pub trait CredentialStore: Send + Sync {
    /// Returns `None` when the entry does not exist.
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), String>;
    /// Silently succeeds if the entry does not exist.
    fn delete(&self, key: &str) -> Result<(), String>;
}

/// OS keyring backend.
pub struct KeyringStore;

impl CredentialStore for KeyringStore {
    fn get(&self, key: &str) -> Option<String> {
        let entry = match Entry::new(SERVICE_NAME, key) {
            Ok(e) => e,
            Err(e) => {
                warn!(key, error = %e, "keyring: failed to create entry");
                return None;
            }
        };
        match entry.get_password() {
            Ok(pw) => Some(pw),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(key, error = %e, "keyring: failed to read credential");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
        entry.set_password(value).map_err(|e| e.to_string())?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), String> {
        let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// In-memory backend for tests and headless environments without a
/// credential service.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        let mut entries = self.entries.lock().map_err(|e| e.to_string())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), String> {
        let mut entries = self.entries.lock().map_err(|e| e.to_string())?;
        entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session context
// ---------------------------------------------------------------------------

/// The current operator session. The token is wiped from memory on drop.
pub struct Session {
    pub token: Zeroizing<String>,
    pub role: StaffRole,
    pub staff_name: Option<String>,
}

/// Authoritative accessor for the operator session. Components receive a
/// `&SessionStore` explicitly instead of reading ambient global state.
pub struct SessionStore {
    backend: Box<dyn CredentialStore>,
}

impl SessionStore {
    /// Store backed by the OS keyring (production).
    pub fn keyring() -> Self {
        Self {
            backend: Box::new(KeyringStore),
        }
    }

    pub fn with_backend(backend: Box<dyn CredentialStore>) -> Self {
        Self { backend }
    }

    /// The current session, or `None` when no credential is stored.
    pub fn current(&self) -> Option<Session> {
        let token = self.backend.get(KEY_ACCESS_TOKEN)?;
        let role = self
            .backend
            .get(KEY_STAFF_ROLE)
            .map(|r| StaffRole::parse(&r))
            .unwrap_or(StaffRole::Staff);
        Some(Session {
            token: Zeroizing::new(token),
            role,
            staff_name: self.backend.get(KEY_STAFF_NAME),
        })
    }

    /// Persist a fresh login issued by the backend.
    pub fn sign_in(
        &self,
        token: &str,
        role: StaffRole,
        staff_name: Option<&str>,
    ) -> Result<(), String> {
        self.backend.set(KEY_ACCESS_TOKEN, token)?;
        self.backend.set(KEY_STAFF_ROLE, role.as_str())?;
        if let Some(name) = staff_name {
            self.backend.set(KEY_STAFF_NAME, name)?;
        }
        info!(role = role.as_str(), "operator signed in");
        Ok(())
    }

    /// The order currently being built on this terminal, if any.
    pub fn active_order_id(&self) -> Option<String> {
        self.backend
            .get(KEY_ACTIVE_ORDER_ID)
            .filter(|id| !id.trim().is_empty())
    }

    pub fn set_active_order_id(&self, order_id: Option<&str>) -> Result<(), String> {
        match order_id {
            Some(id) => self.backend.set(KEY_ACTIVE_ORDER_ID, id),
            None => self.backend.delete(KEY_ACTIVE_ORDER_ID),
        }
    }

    /// Delete every stored session identifier. Called on logout and on any
    /// session-expired signal from the backend.
    pub fn clear(&self) -> Result<(), String> {
        info!("clearing operator session");
        for key in ALL_KEYS {
            self.backend.delete(key)?;
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
