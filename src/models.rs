//! Wire types shared with the back-office REST API.
//!
//! Everything here is a read-through view of the backend's copy, decoded
//! at the API boundary and valid only for the duration of a single screen
//! visit. Amounts are VND, which has no fractional unit, so money is `i64`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Orders and line items
// ---------------------------------------------------------------------------

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// A terminal order has settled or been cancelled and carries no
    /// further cart state on this terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }
}

/// One product entry within an order. `children` holds topping entries with
/// the same shape, recursively; a topping's price counts toward the parent
/// item's displayed total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: String,
    pub product_name: String,
    pub quantity: u32,
    /// Unit price in VND, before toppings.
    pub unit_price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub is_combo: bool,
    #[serde(default)]
    pub children: Vec<LineItem>,
}

/// An order as returned by `GET /api/orders/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    /// Backend-computed total. Display uses the local aggregator; this field
    /// exists only so a mismatch can be logged.
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

/// Partial update for a line item (size and/or quantity).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

/// Payment completion path chosen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash settled at the drawer and recorded immediately.
    Cash,
    /// MoMo wallet redirect flow, settled asynchronously.
    Momo,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Momo => "momo",
        }
    }
}

/// Ephemeral, UI-local payment state. Created when the operator opens the
/// payment selector; discarded on cancel or successful dispatch. The
/// idempotency key is minted once per intent so a retried dispatch reuses
/// the same key and the backend deduplicates.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub method: PaymentMethod,
    /// Cash tendered by the customer. `None` means not yet entered.
    pub tendered: Option<i64>,
    /// Operator-supplied note; when absent, the cash path auto-generates one
    /// from the tendered/change amounts.
    pub note: Option<String>,
    pub idempotency_key: String,
}

impl PaymentIntent {
    pub fn cash(tendered: Option<i64>) -> Self {
        Self {
            method: PaymentMethod::Cash,
            tendered,
            note: None,
            idempotency_key: Uuid::new_v4().to_string(),
        }
    }

    pub fn momo() -> Self {
        Self {
            method: PaymentMethod::Momo,
            tendered: None,
            note: None,
            idempotency_key: Uuid::new_v4().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Staff roles
// ---------------------------------------------------------------------------

/// Role of the logged-in operator, as issued by the backend at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffRole {
    Staff,
    Manager,
    Admin,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Staff => "staff",
            StaffRole::Manager => "manager",
            StaffRole::Admin => "admin",
        }
    }

    /// Parse a role tag; unknown tags fall back to the least-privileged role.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => StaffRole::Admin,
            "manager" => StaffRole::Manager,
            _ => StaffRole::Staff,
        }
    }
}
