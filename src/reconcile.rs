//! Cash tender reconciliation.
//!
//! Given the amount the customer handed over, the order total, and the
//! current drawer balance, decide whether the cash payment may be confirmed
//! and how much change to return. The drawer-shortfall check is advisory
//! only: the operator may still confirm and settle change by other means,
//! so it warns but never blocks.

use crate::notice::{self, Notice};

/// Outcome of validating a proposed cash tender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenderStatus {
    /// No amount entered yet. Blocks confirmation.
    AmountRequired,
    /// Tendered amount is below the order total. Blocks confirmation.
    Insufficient { shortfall: i64 },
    /// Tender covers the total. `drawer_short` flags that the known drawer
    /// balance cannot cover the change; confirmation stays enabled.
    Accepted { change: i64, drawer_short: bool },
}

impl TenderStatus {
    /// Whether the confirm action must stay disabled.
    pub fn blocks_confirmation(&self) -> bool {
        !matches!(self, TenderStatus::Accepted { .. })
    }

    /// Change to return, once accepted.
    pub fn change(&self) -> Option<i64> {
        match self {
            TenderStatus::Accepted { change, .. } => Some(*change),
            _ => None,
        }
    }

    /// The notice to show for this state, if any. Blocking states produce
    /// an error notice; a drawer shortfall produces a warning.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            TenderStatus::AmountRequired => Some(Notice::error(notice::MSG_AMOUNT_REQUIRED)),
            TenderStatus::Insufficient { .. } => {
                Some(Notice::error(notice::MSG_INSUFFICIENT_AMOUNT))
            }
            TenderStatus::Accepted { drawer_short: true, .. } => {
                Some(Notice::warning(notice::MSG_DRAWER_SHORT))
            }
            TenderStatus::Accepted { drawer_short: false, .. } => None,
        }
    }
}

/// Validate a cash tender against the order total and the drawer balance.
///
/// `drawer_balance` is `None` when the drawer float is unknown or the
/// balance endpoint is unavailable; the advisory is then skipped silently.
pub fn reconcile(tendered: Option<i64>, total: i64, drawer_balance: Option<i64>) -> TenderStatus {
    let tendered = match tendered {
        Some(t) => t,
        None => return TenderStatus::AmountRequired,
    };

    if tendered < total {
        return TenderStatus::Insufficient {
            shortfall: total - tendered,
        };
    }

    let change = tendered - total;
    let drawer_short = match drawer_balance {
        Some(balance) => change > 0 && change > balance,
        None => false,
    };

    TenderStatus::Accepted {
        change,
        drawer_short,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::NoticeLevel;

    #[test]
    fn missing_tender_blocks_with_amount_required() {
        let status = reconcile(None, 65000, Some(500000));
        assert_eq!(status, TenderStatus::AmountRequired);
        assert!(status.blocks_confirmation());
        let notice = status.notice().expect("blocking notice");
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, crate::notice::MSG_AMOUNT_REQUIRED);
    }

    #[test]
    fn tender_one_under_total_blocks_as_insufficient() {
        let status = reconcile(Some(64999), 65000, None);
        assert_eq!(status, TenderStatus::Insufficient { shortfall: 1 });
        assert!(status.blocks_confirmation());
        assert_eq!(
            status.notice().unwrap().message,
            crate::notice::MSG_INSUFFICIENT_AMOUNT
        );
    }

    #[test]
    fn exact_tender_is_accepted_with_zero_change() {
        let status = reconcile(Some(65000), 65000, Some(0));
        assert_eq!(
            status,
            TenderStatus::Accepted {
                change: 0,
                drawer_short: false
            }
        );
        assert!(!status.blocks_confirmation());
        assert_eq!(status.change(), Some(0));
        assert!(status.notice().is_none());
    }

    #[test]
    fn overpayment_yields_change() {
        let status = reconcile(Some(100000), 65000, Some(500000));
        assert_eq!(
            status,
            TenderStatus::Accepted {
                change: 35000,
                drawer_short: false
            }
        );
    }

    #[test]
    fn drawer_shortfall_warns_but_does_not_block() {
        // total 100_000, tendered 150_000 => change 50_000 > drawer 30_000
        let status = reconcile(Some(150_000), 100_000, Some(30_000));
        assert_eq!(
            status,
            TenderStatus::Accepted {
                change: 50_000,
                drawer_short: true
            }
        );
        assert!(!status.blocks_confirmation(), "advisory must not block");
        let notice = status.notice().expect("advisory notice");
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert_eq!(notice.message, crate::notice::MSG_DRAWER_SHORT);
    }

    #[test]
    fn unknown_drawer_balance_skips_the_advisory() {
        let status = reconcile(Some(150_000), 100_000, None);
        assert_eq!(
            status,
            TenderStatus::Accepted {
                change: 50_000,
                drawer_short: false
            }
        );
        assert!(status.notice().is_none());
    }

    #[test]
    fn zero_change_never_flags_drawer_shortfall() {
        // Exact tender with an empty drawer: nothing to return, no warning.
        let status = reconcile(Some(65000), 65000, Some(0));
        assert_eq!(
            status,
            TenderStatus::Accepted {
                change: 0,
                drawer_short: false
            }
        );
    }
}
