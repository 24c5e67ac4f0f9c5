pub mod dialog;
pub mod subscription;

pub use dialog::Dialog;
pub use subscription::{Subscription, SubscriptionDraft, SubscriptionPatch};
