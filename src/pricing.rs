//! Pure price aggregation over order line items.
//!
//! This is the single definition of "what does this order cost" on the
//! terminal: both the cart summary and the payment validation call into the
//! same functions, so the two can never disagree. No I/O, no state.

use crate::models::LineItem;

/// Total contribution of one line item: `unit_price × quantity` plus the
/// recursive sum of every descendant topping's own total.
pub fn line_total(item: &LineItem) -> i64 {
    let own = item.unit_price * i64::from(item.quantity);
    own + item.children.iter().map(line_total).sum::<i64>()
}

/// Order-level total: the sum of top-level line item totals.
pub fn order_total(items: &[LineItem]) -> i64 {
    items.iter().map(line_total).sum()
}

/// Format a VND amount the way receipts print it: dot-separated thousands
/// and the đồng sign, e.g. `65.000 ₫`.
pub fn format_vnd(amount: i64) -> String {
    let negative = amount < 0;
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, c) in digits.chars().enumerate() {
        if i != 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    if negative {
        format!("-{grouped} ₫")
    } else {
        format!("{grouped} ₫")
    }
}

// ===========================================================================
// Tests
// ===========================================================================
