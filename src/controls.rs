//! The control-id contract of the automated trading terminal.
//!
//! These identifiers are fixed by the vendor's dialog resources and belong to
//! the external application, not to this crate; they change only when the
//! vendor ships a new terminal build. Version: terminal 5.0.

use crate::types::ControlId;

/// Numeric dialog-control ids.
pub mod ids {
    /// Table pane holding the currently displayed query results.
    pub const CONTENT_PANE: u32 = 1047;
    /// Captcha image rendered in the verification dialog.
    pub const CAPTCHA_IMAGE: u32 = 2405;
    /// Captcha answer input box.
    pub const CAPTCHA_INPUT: u32 = 2404;
    /// Rejection indicator probed after the confirm click: still present
    /// means the terminal refused the submitted answer. A distinct control
    /// from the answer box, per the vendor's dialog resources.
    pub const CAPTCHA_VERIFY: u32 = 2406;
    /// Confirm button of the verification dialog.
    pub const CAPTCHA_CONFIRM: u32 = 1;
    /// Cancel button of the verification dialog.
    pub const CAPTCHA_CANCEL: u32 = 2;
    /// Root of the left-hand navigation tree.
    pub const NAV_TREE: u32 = 200;
    /// "Cancel every open order" button in the order-cancel panel.
    pub const CANCEL_ALL: u32 = 30001;
    /// "Cancel buy orders" button.
    pub const CANCEL_BUY: u32 = 30002;
    /// "Cancel sell orders" button.
    pub const CANCEL_SELL: u32 = 30003;
}

/// Balance figures readable directly from labeled controls on the funds
/// view, keyed by the label the terminal displays.
pub const BALANCE_FIELDS: &[(&str, u32)] = &[
    ("资金余额", 1012),
    ("冻结金额", 1013),
    ("可用金额", 1016),
    ("可取金额", 1017),
    ("股票市值", 1014),
    ("总资产", 1015),
    ("持仓盈亏", 1027),
    ("当日盈亏", 1026),
    ("当日盈亏比", 1029),
];

/// Navigation-tree path to the fills-of-the-day view.
pub const TODAY_TRADES_PATH: &[&str] = &["查询[F4]", "当日成交"];

/// Which open orders a cancel command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelScope {
    All,
    Buy,
    Sell,
}

impl CancelScope {
    /// Map the caller-supplied category parameter. Anything unrecognized
    /// falls back to cancel-all.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("X") => CancelScope::Buy,
            Some("C") => CancelScope::Sell,
            _ => CancelScope::All,
        }
    }

    pub fn control_id(&self) -> ControlId {
        let id = match self {
            CancelScope::All => ids::CANCEL_ALL,
            CancelScope::Buy => ids::CANCEL_BUY,
            CancelScope::Sell => ids::CANCEL_SELL,
        };
        ControlId::Num(id)
    }
}
