use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::Subscription;

/// Which dialog the UI currently shows. At most one dialog is open; opening a
/// new one replaces the previous, and `None` is the explicit closed state.
///
/// Dialogs that act on an existing subscription carry a value-copy of the
/// record they target.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Dialog {
    #[default]
    None,
    AddSubscription,
    RenewSubscription {
        subscription: Subscription,
    },
    ViewHistory {
        subscription: Subscription,
    },
    DeleteConfirm {
        subscription: Subscription,
    },
    MarkSessionCustom {
        subscription: Subscription,
    },
    MarkSessionConfirm {
        subscription: Subscription,
    },
    DeleteHistoryConfirm {
        subscription: Subscription,
        history_date: NaiveDate,
    },
}
