use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, RwLock,
};

use chrono::{Local, NaiveDate};
use log::warn;
use thiserror::Error;

use crate::db::Database;
use crate::models::{subscription::seed_subscriptions, Subscription, SubscriptionPatch};

/// Key of the kv slot holding the serialized collection.
pub const STORAGE_KEY: &str = "subscriptions";

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("subscription {0} already exists")]
    DuplicateId(String),
    #[error("subscription {0} not found")]
    SubscriptionNotFound(String),
    #[error("no attended session on {date} for subscription {id}")]
    SessionNotFound { id: String, date: NaiveDate },
    #[error("session on {date} already marked for subscription {id}")]
    SessionAlreadyMarked { id: String, date: NaiveDate },
}

pub type StoreResult<T> = Result<T, StoreError>;

type Listener = Box<dyn Fn(&[Subscription]) + Send + Sync>;

/// Token returned by [`SubscriptionStore::subscribe`]; pass it back to
/// [`SubscriptionStore::unsubscribe`] to deregister the listener.
pub struct ListenerHandle(u64);

/// Single source of truth for the subscription collection.
///
/// Every successful mutation runs the same pipeline: validate, apply to the
/// in-memory sequence, persist the whole collection as one JSON blob, then
/// notify listeners in registration order with the new sequence. Persistence
/// is best-effort; a failed write keeps the in-memory state authoritative for
/// the session and is only logged.
///
/// Commands dispatch on a multi-threaded runtime; `write_gate` serializes the
/// whole pipeline, so commits reach the db worker and the listeners in the
/// order the mutations were applied.
pub struct SubscriptionStore {
    db: Database,
    data: RwLock<Vec<Subscription>>,
    write_gate: tokio::sync::Mutex<()>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
}

impl SubscriptionStore {
    /// Load the collection from the kv slot. A missing slot gets the starter
    /// collection; an unparsable blob degrades to an empty collection rather
    /// than failing startup.
    pub async fn load(db: Database) -> anyhow::Result<Self> {
        let initial = match db.get_value(STORAGE_KEY).await? {
            Some(raw) => match serde_json::from_str::<Vec<Subscription>>(&raw) {
                Ok(records) => records,
                Err(err) => {
                    warn!("Stored subscription data is corrupt, starting empty: {err}");
                    Vec::new()
                }
            },
            None => {
                let seeded = seed_subscriptions(Local::now().date_naive());
                persist(&db, &seeded).await;
                seeded
            }
        };

        Ok(Self {
            db,
            data: RwLock::new(initial),
            write_gate: tokio::sync::Mutex::new(()),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
        })
    }

    /// Snapshot of the full collection in display order.
    pub fn list(&self) -> Vec<Subscription> {
        self.data.read().unwrap().clone()
    }

    pub async fn add(&self, record: Subscription) -> StoreResult<Subscription> {
        let _gate = self.write_gate.lock().await;
        let snapshot = {
            let mut data = self.data.write().unwrap();
            if data.iter().any(|existing| existing.id == record.id) {
                return Err(StoreError::DuplicateId(record.id));
            }
            data.push(record.clone());
            data.clone()
        };

        self.commit(snapshot).await;
        Ok(record)
    }

    pub async fn update(&self, id: &str, patch: SubscriptionPatch) -> StoreResult<Subscription> {
        self.update_with(id, move |_| patch).await
    }

    /// Like [`update`](Self::update), but the patch is computed from the
    /// record's current state inside the mutation pipeline, so read-modify-
    /// write callers (renewal) cannot lose a concurrent change.
    pub async fn update_with<F>(&self, id: &str, make_patch: F) -> StoreResult<Subscription>
    where
        F: FnOnce(&Subscription) -> SubscriptionPatch,
    {
        let _gate = self.write_gate.lock().await;
        let (snapshot, updated) = {
            let mut data = self.data.write().unwrap();
            let pos = position_of(&data, id)?;
            let patch = make_patch(&data[pos]);
            patch.apply(&mut data[pos]);
            (data.clone(), data[pos].clone())
        };

        self.commit(snapshot).await;
        Ok(updated)
    }

    /// Record an attended session. Each date can be marked at most once per
    /// subscription; `sessions_left` has no lower bound, so marking past zero
    /// is valid over-attendance.
    pub async fn mark_session(&self, id: &str, date: NaiveDate) -> StoreResult<Subscription> {
        let _gate = self.write_gate.lock().await;
        let (snapshot, updated) = {
            let mut data = self.data.write().unwrap();
            let pos = position_of(&data, id)?;
            if data[pos].history.contains(&date) {
                return Err(StoreError::SessionAlreadyMarked {
                    id: id.to_string(),
                    date,
                });
            }
            data[pos].history.push(date);
            data[pos].sessions_left -= 1;
            (data.clone(), data[pos].clone())
        };

        self.commit(snapshot).await;
        Ok(updated)
    }

    /// Inverse of [`mark_session`](Self::mark_session): drops the date from
    /// the history and gives the session back.
    pub async fn unmark_session(&self, id: &str, date: NaiveDate) -> StoreResult<Subscription> {
        let _gate = self.write_gate.lock().await;
        let (snapshot, updated) = {
            let mut data = self.data.write().unwrap();
            let pos = position_of(&data, id)?;
            let entry = data[pos]
                .history
                .iter()
                .position(|attended| *attended == date)
                .ok_or_else(|| StoreError::SessionNotFound {
                    id: id.to_string(),
                    date,
                })?;
            data[pos].history.remove(entry);
            data[pos].sessions_left += 1;
            (data.clone(), data[pos].clone())
        };

        self.commit(snapshot).await;
        Ok(updated)
    }

    pub async fn remove(&self, id: &str) -> StoreResult<()> {
        let _gate = self.write_gate.lock().await;
        let snapshot = {
            let mut data = self.data.write().unwrap();
            let pos = position_of(&data, id)?;
            data.remove(pos);
            data.clone()
        };

        self.commit(snapshot).await;
        Ok(())
    }

    /// Register a listener called synchronously with the new full sequence
    /// after every successful mutation, until unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&[Subscription]) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap()
            .push((id, Box::new(listener)));
        ListenerHandle(id)
    }

    #[allow(dead_code)]
    pub fn unsubscribe(&self, handle: ListenerHandle) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|(id, _)| *id != handle.0);
    }

    async fn commit(&self, snapshot: Vec<Subscription>) {
        persist(&self.db, &snapshot).await;

        let listeners = self.listeners.lock().unwrap();
        for (_, listener) in listeners.iter() {
            listener(&snapshot);
        }
    }
}

fn position_of(data: &[Subscription], id: &str) -> StoreResult<usize> {
    data.iter()
        .position(|record| record.id == id)
        .ok_or_else(|| StoreError::SubscriptionNotFound(id.to_string()))
}

async fn persist(db: &Database, records: &[Subscription]) {
    let blob = match serde_json::to_string(records) {
        Ok(blob) => blob,
        Err(err) => {
            warn!("Failed to serialize subscriptions; keeping in-memory state: {err}");
            return;
        }
    };

    if let Err(err) = db.set_value(STORAGE_KEY, blob).await {
        warn!("Failed to persist subscriptions; keeping in-memory state: {err}");
    }
}
