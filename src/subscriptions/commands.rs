use chrono::{Local, NaiveDate};
use tauri::State;

use crate::{
    models::{subscription::add_days, Subscription, SubscriptionDraft, SubscriptionPatch},
    AppState,
};

#[tauri::command]
pub async fn list_subscriptions(state: State<'_, AppState>) -> Result<Vec<Subscription>, String> {
    Ok(state.store.list())
}

#[tauri::command]
pub async fn add_subscription(
    state: State<'_, AppState>,
    draft: SubscriptionDraft,
) -> Result<Subscription, String> {
    let record = Subscription::from_draft(draft, Local::now().date_naive());
    state.store.add(record).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn update_subscription(
    state: State<'_, AppState>,
    subscription_id: String,
    patch: SubscriptionPatch,
) -> Result<Subscription, String> {
    state
        .store
        .update(&subscription_id, patch)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn renew_subscription(
    state: State<'_, AppState>,
    subscription_id: String,
    sessions: i32,
    duration_days: Option<i64>,
) -> Result<Subscription, String> {
    let today = Local::now().date_naive();
    state
        .store
        .update_with(&subscription_id, move |record| {
            renewal_patch(record, sessions, duration_days, today)
        })
        .await
        .map_err(|e| e.to_string())
}

/// Mark a session as attended. Defaults to today; the custom-date dialog
/// passes an explicit date.
#[tauri::command]
pub async fn mark_session(
    state: State<'_, AppState>,
    subscription_id: String,
    date: Option<NaiveDate>,
) -> Result<Subscription, String> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    state
        .store
        .mark_session(&subscription_id, date)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn unmark_session(
    state: State<'_, AppState>,
    subscription_id: String,
    date: NaiveDate,
) -> Result<Subscription, String> {
    state
        .store
        .unmark_session(&subscription_id, date)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn delete_subscription(
    state: State<'_, AppState>,
    subscription_id: String,
) -> Result<(), String> {
    state
        .store
        .remove(&subscription_id)
        .await
        .map_err(|e| e.to_string())
}

/// Renewal adds the purchased sessions on top of whatever is left, restarts
/// the validity window from today (or clears it for an unlimited package),
/// and snapshots the parameters for the next prefill.
fn renewal_patch(
    record: &Subscription,
    sessions: i32,
    duration_days: Option<i64>,
    today: NaiveDate,
) -> SubscriptionPatch {
    SubscriptionPatch {
        sessions_left: Some(record.sessions_left.saturating_add(sessions)),
        end_date: Some(duration_days.map(|days| add_days(today, days))),
        last_renew_sessions: Some(sessions),
        last_renew_duration: Some(duration_days),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn record(sessions_left: i32) -> Subscription {
        Subscription {
            id: "a".into(),
            name: "Boxing".into(),
            sessions_left,
            start_date: date("2024-01-01"),
            end_date: Some(date("2024-01-31")),
            history: vec![date("2024-01-10")],
            last_renew_sessions: 12,
            last_renew_duration: Some(30),
        }
    }

    #[test]
    fn renewal_adds_sessions_and_restarts_window() {
        let mut renewed = record(3);
        let patch = renewal_patch(&record(3), 8, Some(30), date("2024-02-15"));
        patch.apply(&mut renewed);

        assert_eq!(renewed.sessions_left, 11);
        assert_eq!(renewed.end_date, Some(date("2024-03-16")));
        assert_eq!(renewed.last_renew_sessions, 8);
        assert_eq!(renewed.last_renew_duration, Some(30));
        // History and identity are untouched by a renewal.
        assert_eq!(renewed.id, "a");
        assert_eq!(renewed.history, vec![date("2024-01-10")]);
    }

    #[test]
    fn renewal_saturates_instead_of_overflowing() {
        let mut renewed = record(i32::MAX - 1);
        let patch = renewal_patch(&record(i32::MAX - 1), 5, Some(30), date("2024-02-15"));
        patch.apply(&mut renewed);

        assert_eq!(renewed.sessions_left, i32::MAX);
    }

    #[test]
    fn renewal_without_duration_clears_the_end_date() {
        let mut renewed = record(-2);
        let patch = renewal_patch(&record(-2), 10, None, date("2024-02-15"));
        patch.apply(&mut renewed);

        // Over-attended packages renew from their negative balance.
        assert_eq!(renewed.sessions_left, 8);
        assert_eq!(renewed.end_date, None);
        assert_eq!(renewed.last_renew_duration, None);
    }
}
