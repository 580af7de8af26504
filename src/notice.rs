//! Non-modal user notifications and the Vietnamese message catalogue.
//!
//! Every user-visible condition in the checkout flow maps to a `Notice`
//! that the UI shell renders as a toast. Notices never crash the caller
//! and never force a reload.

use serde::Serialize;

// Message catalogue. User-facing copy is Vietnamese; log lines stay English.
pub const MSG_SESSION_EXPIRED: &str = "Phiên đăng nhập đã hết hạn, vui lòng đăng nhập lại";
pub const MSG_RETRY_LATER: &str = "Không thể kết nối máy chủ, vui lòng thử lại sau";
pub const MSG_AMOUNT_REQUIRED: &str = "Vui lòng nhập số tiền khách đưa";
pub const MSG_INSUFFICIENT_AMOUNT: &str = "Số tiền khách đưa không đủ";
pub const MSG_DRAWER_SHORT: &str = "Két tiền không đủ để thối lại cho khách";
pub const MSG_CASH_RECORDED: &str = "Thanh toán tiền mặt thành công";
pub const MSG_WALLET_OPENED: &str = "Đã mở trang thanh toán MoMo, chờ khách xác nhận";
pub const MSG_PAYMENT_FAILED: &str = "Thanh toán thất bại, vui lòng thử lại";
pub const MSG_DISPATCH_IN_FLIGHT: &str = "Đơn hàng đang được thanh toán, vui lòng chờ";

/// Severity of a notice. `Warning` is advisory and never blocks an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A localized, non-modal notification for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}
