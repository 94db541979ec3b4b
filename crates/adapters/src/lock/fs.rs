// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem-backed presence store.
//!
//! Each executor's presence lives in `<dir>/<executor_id>.json`. Writers
//! serialize through an exclusive lock on `<dir>/.lock`, so every node
//! sharing the directory agrees on who holds a record. A record whose
//! expiry has passed is stale and may be reclaimed by a new owner.

use super::{LeaseHandle, LockCoordinator, LockError, StatusStream};
use async_trait::async_trait;
use fs2::FileExt;
use rep_core::{ExecutorId, HeartbeatInterval, PresenceRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const LOCK_FILE: &str = ".lock";

/// Presence record as persisted in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPresence {
    pub executor_id: ExecutorId,
    pub stack: String,
    /// Token of the lease that owns this record
    pub owner: String,
    /// Unix time in milliseconds after which the record is stale
    pub expires_at_ms: u64,
}

impl StoredPresence {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    pub fn record(&self) -> PresenceRecord {
        PresenceRecord::new(self.executor_id.clone(), self.stack.clone())
    }
}

/// Outcome of claiming a record for an owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Claim {
    /// No record existed
    Granted,
    /// Owner already held the record; expiry extended
    Renewed,
    /// Another owner's record had expired and was taken over
    Reclaimed { previous: String },
    /// Another owner holds an unexpired record
    Denied { holder: String },
    /// The lease was released while the claim was pending
    Released,
}

impl Claim {
    fn is_held(&self) -> bool {
        matches!(
            self,
            Claim::Granted | Claim::Renewed | Claim::Reclaimed { .. }
        )
    }
}

/// Decide how a claim by `owner` resolves against the current record
pub(crate) fn decide_claim(existing: Option<&StoredPresence>, owner: &str, now_ms: u64) -> Claim {
    match existing {
        None => Claim::Granted,
        Some(current) if current.owner == owner => Claim::Renewed,
        Some(current) if current.is_expired(now_ms) => Claim::Reclaimed {
            previous: current.owner.clone(),
        },
        Some(current) => Claim::Denied {
            holder: current.owner.clone(),
        },
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug)]
struct Store {
    dir: PathBuf,
    ttl: Duration,
}

impl Store {
    fn record_path(&self, id: &ExecutorId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Run `f` while holding the store-wide lock
    fn locked<T>(&self, f: impl FnOnce() -> Result<T, LockError>) -> Result<T, LockError> {
        std::fs::create_dir_all(&self.dir)?;
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(LOCK_FILE))?;
        lock.lock_exclusive()?;
        // Released when `lock` is dropped
        f()
    }

    fn read(&self, id: &ExecutorId) -> Result<Option<StoredPresence>, LockError> {
        match std::fs::read(self.record_path(id)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, stored: &StoredPresence) -> Result<(), LockError> {
        let path = self.record_path(&stored.executor_id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(stored)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Claim or renew the record for `owner` unless its lease was released
    fn claim(
        &self,
        record: &PresenceRecord,
        owner: &str,
        released: &AtomicBool,
    ) -> Result<Claim, LockError> {
        self.locked(|| {
            if released.load(Ordering::SeqCst) {
                return Ok(Claim::Released);
            }
            let now = now_ms();
            let existing = self.read(record.executor_id())?;
            let claim = decide_claim(existing.as_ref(), owner, now);
            if claim.is_held() {
                self.write(&StoredPresence {
                    executor_id: record.executor_id().clone(),
                    stack: record.stack().to_string(),
                    owner: owner.to_string(),
                    expires_at_ms: now + self.ttl.as_millis() as u64,
                })?;
            }
            Ok(claim)
        })
    }

    /// Remove the record if `owner` still holds it; returns whether it did
    fn remove(&self, id: &ExecutorId, owner: &str) -> Result<bool, LockError> {
        self.locked(|| match self.read(id)? {
            Some(current) if current.owner == owner => {
                match std::fs::remove_file(self.record_path(id)) {
                    Ok(()) => Ok(true),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                    Err(e) => Err(e.into()),
                }
            }
            _ => Ok(false),
        })
    }

    fn live(&self) -> Result<Vec<StoredPresence>, LockError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let now = now_ms();
        let mut live = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let parsed = std::fs::read(&path)
                .map_err(LockError::from)
                .and_then(|bytes| Ok(serde_json::from_slice::<StoredPresence>(&bytes)?));
            match parsed {
                Ok(stored) if !stored.is_expired(now) => live.push(stored),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable presence record")
                }
            }
        }
        live.sort_by(|a, b| a.executor_id.cmp(&b.executor_id));
        Ok(live)
    }
}

async fn blocking<T, F>(f: F) -> Result<T, LockError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, LockError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LockError::Store(format!("store task failed: {}", e)))?
}

fn validate_id(id: &ExecutorId) -> Result<(), LockError> {
    let s = id.as_str();
    if s.is_empty() || s.starts_with('.') || s.contains(['/', '\\']) {
        return Err(LockError::Store(format!("invalid executor id: {:?}", s)));
    }
    Ok(())
}

struct Renewal {
    task: JoinHandle<()>,
    released: Arc<AtomicBool>,
}

/// Running renewal tasks keyed by owner token
type Renewals = Arc<Mutex<HashMap<String, Renewal>>>;

/// Lock coordinator backed by a directory shared between nodes
#[derive(Clone)]
pub struct FsLockCoordinator {
    store: Arc<Store>,
    renewals: Renewals,
}

impl FsLockCoordinator {
    /// Records written by this coordinator stay valid for `ttl` after each renewal
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            store: Arc::new(Store {
                dir: dir.into(),
                ttl,
            }),
            renewals: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.store.dir
    }

    /// Unexpired presence records in the store, ordered by executor id
    /// Number of leases whose renewal task is still registered
    pub fn active_renewals(&self) -> usize {
        self.renewals
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub async fn live_records(&self) -> Result<Vec<StoredPresence>, LockError> {
        let store = Arc::clone(&self.store);
        blocking(move || store.live()).await
    }
}

#[async_trait]
impl LockCoordinator for FsLockCoordinator {
    async fn maintain(
        &self,
        interval: HeartbeatInterval,
        record: &PresenceRecord,
    ) -> Result<(LeaseHandle, StatusStream), LockError> {
        validate_id(record.executor_id())?;

        let owner = uuid::Uuid::new_v4().to_string();
        let released = Arc::new(AtomicBool::new(false));

        let claim = {
            let store = Arc::clone(&self.store);
            let record = record.clone();
            let owner = owner.clone();
            let released = Arc::clone(&released);
            blocking(move || store.claim(&record, &owner, &released)).await?
        };
        if !claim.is_held() {
            return Err(LockError::Held(record.executor_id().clone()));
        }
        tracing::debug!(executor_id = %record.executor_id(), ?claim, "presence claimed");

        let (tx, rx) = mpsc::channel(1);
        // Held across the spawn so the task cannot deregister before it is inserted
        let mut renewals = self.renewals.lock().unwrap_or_else(|e| e.into_inner());
        let task = tokio::spawn(renew(
            Arc::clone(&self.store),
            Arc::clone(&self.renewals),
            record.clone(),
            owner.clone(),
            Arc::clone(&released),
            interval,
            tx,
        ));
        renewals.insert(owner.clone(), Renewal { task, released });
        drop(renewals);

        Ok((
            LeaseHandle::new(record.executor_id().clone(), owner),
            StatusStream::new(rx),
        ))
    }

    async fn release(&self, handle: LeaseHandle) -> Result<(), LockError> {
        let renewal = self
            .renewals
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(handle.token());
        if let Some(renewal) = renewal {
            // Flag first: a renewal already blocked on the store lock must not
            // rewrite the record after it is removed
            renewal.released.store(true, Ordering::SeqCst);
            renewal.task.abort();
        }

        let store = Arc::clone(&self.store);
        let id = handle.executor_id().clone();
        let owner = handle.token().to_string();
        let removed = blocking(move || store.remove(&id, &owner)).await?;
        if !removed {
            tracing::debug!(executor_id = %handle.executor_id(), "presence already gone");
        }
        Ok(())
    }
}

/// Renewal loop for one lease: one claim per interval until released or
/// abandoned. Claims never wait on the consumer; a status that finds the
/// stream full is dropped.
async fn renew(
    store: Arc<Store>,
    renewals: Renewals,
    record: PresenceRecord,
    owner: String,
    released: Arc<AtomicBool>,
    interval: HeartbeatInterval,
    tx: mpsc::Sender<bool>,
) {
    let mut ticker = tokio::time::interval(interval.as_duration());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick is immediate; the initial claim already covered it
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let result = {
            let store = Arc::clone(&store);
            let record = record.clone();
            let owner = owner.clone();
            let released = Arc::clone(&released);
            blocking(move || store.claim(&record, &owner, &released)).await
        };
        let renewed = match result {
            Ok(Claim::Released) => break,
            Ok(claim) => {
                if !claim.is_held() {
                    tracing::debug!(executor_id = %record.executor_id(), ?claim, "renewal denied");
                }
                claim.is_held()
            }
            Err(e) => {
                tracing::debug!(executor_id = %record.executor_id(), error = %e, "renewal failed");
                false
            }
        };

        match tx.try_send(renewed) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!(
                    executor_id = %record.executor_id(),
                    renewed,
                    "status dropped, stream full"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(executor_id = %record.executor_id(), "status stream abandoned");
                break;
            }
        }
    }

    renewals
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&owner);
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
