use chrono::{Days, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// One purchased package of sessions with a validity window.
///
/// `history` holds the attended dates in mark order; `sessions_left` may go
/// negative when a package is over-attended. `last_renew_*` snapshot the
/// parameters of the most recent purchase/renewal so the renew form can be
/// prefilled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub name: String,
    pub sessions_left: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub history: Vec<NaiveDate>,
    pub last_renew_sessions: i32,
    pub last_renew_duration: Option<i64>,
}

/// Input of the "add subscription" form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDraft {
    pub name: String,
    pub sessions: i32,
    /// Validity in days from today; `None` means unlimited duration.
    pub duration_days: Option<i64>,
}

/// Partial update for a subscription. Absent fields are left alone; the
/// nullable fields use a nested `Option` so a patch can also clear them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionPatch {
    pub name: Option<String>,
    pub sessions_left: Option<i32>,
    pub start_date: Option<NaiveDate>,
    #[serde(deserialize_with = "double_option")]
    pub end_date: Option<Option<NaiveDate>>,
    pub last_renew_sessions: Option<i32>,
    #[serde(deserialize_with = "double_option")]
    pub last_renew_duration: Option<Option<i64>>,
}

/// Maps an explicit JSON `null` to `Some(None)` so patches can clear a
/// nullable field; an absent field stays `None` via the struct default.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::deserialize(deserializer).map(Some)
}

impl Subscription {
    pub fn from_draft(draft: SubscriptionDraft, today: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            sessions_left: draft.sessions,
            start_date: today,
            end_date: draft.duration_days.map(|days| add_days(today, days)),
            history: Vec::new(),
            last_renew_sessions: draft.sessions,
            last_renew_duration: draft.duration_days,
        }
    }
}

impl SubscriptionPatch {
    pub fn apply(self, record: &mut Subscription) {
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(sessions_left) = self.sessions_left {
            record.sessions_left = sessions_left;
        }
        if let Some(start_date) = self.start_date {
            record.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            record.end_date = end_date;
        }
        if let Some(last_renew_sessions) = self.last_renew_sessions {
            record.last_renew_sessions = last_renew_sessions;
        }
        if let Some(last_renew_duration) = self.last_renew_duration {
            record.last_renew_duration = last_renew_duration;
        }
    }
}

pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    if days >= 0 {
        date.checked_add_days(Days::new(days as u64))
            .unwrap_or(NaiveDate::MAX)
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
            .unwrap_or(NaiveDate::MIN)
    }
}

const SEED_NAMES: [&str; 5] = ["Boxing", "Swimming", "Vocals", "Guitar", "Drums"];
const SEED_SESSIONS: i32 = 12;
const SEED_DURATION_DAYS: i64 = 30;

/// Starter collection written on first run so the app is usable without an
/// onboarding flow.
pub fn seed_subscriptions(today: NaiveDate) -> Vec<Subscription> {
    SEED_NAMES
        .iter()
        .map(|name| Subscription {
            id: Uuid::new_v4().to_string(),
            name: (*name).to_string(),
            sessions_left: SEED_SESSIONS,
            start_date: today,
            end_date: Some(add_days(today, SEED_DURATION_DAYS)),
            history: Vec::new(),
            last_renew_sessions: SEED_SESSIONS,
            last_renew_duration: Some(SEED_DURATION_DAYS),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn serializes_with_stable_wire_field_names() {
        let record = Subscription {
            id: "b".into(),
            name: "Yoga".into(),
            sessions_left: 8,
            start_date: date("2024-01-01"),
            end_date: Some(date("2024-01-31")),
            history: vec![date("2024-01-10")],
            last_renew_sessions: 8,
            last_renew_duration: Some(30),
        };

        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();
        for field in [
            "id",
            "name",
            "sessionsLeft",
            "startDate",
            "endDate",
            "history",
            "lastRenewSessions",
            "lastRenewDuration",
        ] {
            assert!(object.contains_key(field), "missing field {field}");
        }
        assert_eq!(object["startDate"], "2024-01-01");
        assert_eq!(object["history"][0], "2024-01-10");
    }

    #[test]
    fn from_draft_fills_window_and_snapshot() {
        let today = date("2024-03-01");
        let record = Subscription::from_draft(
            SubscriptionDraft {
                name: "Pilates".into(),
                sessions: 10,
                duration_days: Some(30),
            },
            today,
        );

        assert_eq!(record.start_date, today);
        assert_eq!(record.end_date, Some(date("2024-03-31")));
        assert!(record.history.is_empty());
        assert_eq!(record.last_renew_sessions, 10);
        assert_eq!(record.last_renew_duration, Some(30));
    }

    #[test]
    fn from_draft_without_duration_is_unlimited() {
        let record = Subscription::from_draft(
            SubscriptionDraft {
                name: "Open gym".into(),
                sessions: 4,
                duration_days: None,
            },
            date("2024-03-01"),
        );

        assert_eq!(record.end_date, None);
        assert_eq!(record.last_renew_duration, None);
    }

    #[test]
    fn patch_can_clear_nullable_fields() {
        let mut record = Subscription::from_draft(
            SubscriptionDraft {
                name: "Pilates".into(),
                sessions: 10,
                duration_days: Some(30),
            },
            date("2024-03-01"),
        );

        let patch: SubscriptionPatch =
            serde_json::from_str(r#"{"name":"Mat pilates","endDate":null}"#).unwrap();
        patch.apply(&mut record);

        assert_eq!(record.name, "Mat pilates");
        assert_eq!(record.end_date, None);
        // Untouched fields survive.
        assert_eq!(record.sessions_left, 10);
    }

    #[test]
    fn seed_records_share_window_and_have_unique_ids() {
        let today = date("2024-03-01");
        let seeded = seed_subscriptions(today);

        assert_eq!(seeded.len(), 5);
        for record in &seeded {
            assert_eq!(record.sessions_left, 12);
            assert_eq!(record.start_date, today);
            assert_eq!(record.end_date, Some(date("2024-03-31")));
            assert!(record.history.is_empty());
        }
        let mut ids: Vec<_> = seeded.iter().map(|r| r.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }
}
