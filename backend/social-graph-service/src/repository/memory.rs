use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;

use super::{
    Change, ChangeSet, Record, RecordFilter, RecordKey, SocialStore, StoreError, StoreResult,
    Versioned,
};

/// Values that at most one record may hold
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum UniqueKey {
    Username(String),
    Email(String),
    Tag(String),
}

fn unique_keys(record: &Record) -> Vec<UniqueKey> {
    match record {
        Record::User(u) => vec![
            UniqueKey::Username(u.username_normalized.clone()),
            UniqueKey::Email(u.email.clone()),
        ],
        Record::Hashtag(h) => vec![UniqueKey::Tag(h.tag.clone())],
        _ => Vec::new(),
    }
}

#[derive(Default)]
struct State {
    records: HashMap<RecordKey, Versioned<Record>>,
    unique: HashMap<UniqueKey, RecordKey>,
}

impl State {
    fn insert(&mut self, versioned: Versioned<Record>) {
        let key = versioned.value.key();
        self.remove(&key);
        for unique in unique_keys(&versioned.value) {
            self.unique.insert(unique, key);
        }
        self.records.insert(key, versioned);
    }

    fn remove(&mut self, key: &RecordKey) {
        if let Some(old) = self.records.remove(key) {
            for unique in unique_keys(&old.value) {
                if self.unique.get(&unique) == Some(key) {
                    self.unique.remove(&unique);
                }
            }
        }
    }
}

/// In-process store with the same conditional-commit semantics a real
/// backing store would give.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    forced_conflicts: AtomicU32,
    latency: RwLock<Option<Duration>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` commits with a conflict (fault injection)
    pub fn inject_conflicts(&self, count: u32) {
        self.forced_conflicts.store(count, Ordering::SeqCst);
    }

    /// Delay every call by `latency` (fault injection)
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn take_forced_conflict(&self) -> bool {
        self.forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn check_versions(state: &State, changes: &ChangeSet) -> StoreResult<()> {
        for change in &changes.changes {
            let (key, expected) = match change {
                Change::Insert(record) => (record.key(), None),
                Change::Update {
                    record,
                    expected_version,
                } => (record.key(), Some(*expected_version)),
                Change::Delete {
                    key,
                    expected_version,
                } => (*key, Some(*expected_version)),
                Change::Check {
                    key,
                    expected_version,
                } => (*key, *expected_version),
            };

            let current = state.records.get(&key).map(|r| r.version);
            if current != expected {
                return Err(StoreError::Conflict(format!(
                    "{} expected {:?}, found {:?}",
                    key, expected, current
                )));
            }
        }
        Ok(())
    }

    /// Unique username, email and tag. A value is free when its current
    /// holder is rewritten or deleted by the same change set, unless the
    /// rewrite keeps it.
    fn check_unique(state: &State, changes: &ChangeSet) -> StoreResult<()> {
        let touched: HashSet<RecordKey> = changes
            .changes
            .iter()
            .filter_map(|c| match c {
                Change::Insert(record) | Change::Update { record, .. } => Some(record.key()),
                Change::Delete { key, .. } => Some(*key),
                Change::Check { .. } => None,
            })
            .collect();

        let mut claimed: HashMap<UniqueKey, RecordKey> = HashMap::new();
        for change in &changes.changes {
            let record = match change {
                Change::Insert(record) | Change::Update { record, .. } => record,
                _ => continue,
            };
            let key = record.key();
            for unique in unique_keys(record) {
                let held_elsewhere = state
                    .unique
                    .get(&unique)
                    .is_some_and(|owner| *owner != key && !touched.contains(owner));
                let claimed_twice = claimed
                    .insert(unique, key)
                    .is_some_and(|other| other != key);
                if held_elsewhere || claimed_twice {
                    return Err(StoreError::Conflict(format!("unique constraint on {}", key)));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SocialStore for InMemoryStore {
    async fn fetch(&self, key: RecordKey) -> StoreResult<Option<Versioned<Record>>> {
        self.simulate_latency().await;
        Ok(self.state.read().records.get(&key).cloned())
    }

    async fn scan(&self, filter: &RecordFilter) -> StoreResult<Vec<Versioned<Record>>> {
        self.simulate_latency().await;
        let kind = filter.kind();
        let mut found: Vec<Versioned<Record>> = self
            .state
            .read()
            .records
            .iter()
            .filter(|(key, v)| key.kind == kind && filter.matches(&v.value))
            .map(|(_, v)| v.clone())
            .collect();
        found.sort_by_key(|v| v.value.key());
        Ok(found)
    }

    async fn commit(&self, changes: ChangeSet) -> StoreResult<()> {
        self.simulate_latency().await;

        if self.take_forced_conflict() {
            return Err(StoreError::Conflict("injected conflict".to_string()));
        }

        let mut state = self.state.write();
        Self::check_versions(&state, &changes)?;
        Self::check_unique(&state, &changes)?;

        let writes = changes.writes();
        for change in changes.changes {
            match change {
                Change::Insert(record) => state.insert(Versioned {
                    version: 1,
                    value: record,
                }),
                Change::Update {
                    record,
                    expected_version,
                } => state.insert(Versioned {
                    version: expected_version + 1,
                    value: record,
                }),
                Change::Delete { key, .. } => state.remove(&key),
                Change::Check { .. } => {}
            }
        }

        debug!(writes, "Committed change set");
        Ok(())
    }
}
