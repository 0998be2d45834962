//! Unit of work over a [`SocialStore`].
//!
//! A mutation reads records through the unit, edits them in memory and
//! stages the result. Nothing reaches the store until [`UnitOfWork::commit`],
//! which sends one [`ChangeSet`] carrying the staged writes plus a version
//! check for every record that was only read. A concurrent writer touching
//! any of those records makes the commit fail with a conflict, and the caller
//! retries from scratch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use resilience::with_timeout_result;

use super::{Change, ChangeSet, Entity, Record, RecordFilter, RecordKey, SocialStore, Versioned};
use crate::error::{ServiceError, ServiceResult};
use crate::push::PushRequest;

/// What the store held when the unit first looked at a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Base {
    /// Never read; only created by this unit
    Unread,
    Absent,
    Version(u64),
}

#[derive(Debug)]
struct Slot {
    base: Base,
    current: Option<Record>,
    dirty: bool,
}

pub struct UnitOfWork {
    store: Arc<dyn SocialStore>,
    timeout: Duration,
    slots: HashMap<RecordKey, Slot>,
    order: Vec<RecordKey>,
    outbox: Vec<PushRequest>,
}

impl UnitOfWork {
    pub fn new(store: Arc<dyn SocialStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            slots: HashMap::new(),
            order: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn new_id(&self) -> Uuid {
        self.store.generate_id()
    }

    fn track(&mut self, key: RecordKey, slot: Slot) {
        if self.slots.insert(key, slot).is_none() {
            self.order.push(key);
        }
    }

    fn observe(&mut self, key: RecordKey, found: Option<Versioned<Record>>) {
        if self.slots.contains_key(&key) {
            return;
        }
        let slot = match found {
            Some(v) => Slot {
                base: Base::Version(v.version),
                current: Some(v.value),
                dirty: false,
            },
            None => Slot {
                base: Base::Absent,
                current: None,
                dirty: false,
            },
        };
        self.track(key, slot);
    }

    fn current<E: Entity>(&self, key: &RecordKey) -> ServiceResult<Option<E>> {
        match self.slots.get(key).and_then(|slot| slot.current.clone()) {
            Some(record) => E::from_record(record)
                .map(Some)
                .ok_or_else(|| ServiceError::Store(super::StoreError::Corrupted(*key))),
            None => Ok(None),
        }
    }

    /// Load a record, preferring what this unit already holds
    pub async fn get<E: Entity>(&mut self, id: Uuid) -> ServiceResult<Option<E>> {
        let key = E::key_of(id);
        if !self.slots.contains_key(&key) {
            let found =
                with_timeout_result(self.timeout, async { Ok::<_, ServiceError>(self.store.fetch(key).await?) })
                    .await?;
            self.observe(key, found);
        }
        self.current(&key)
    }

    /// Load a record or fail with `NotFound(what)`
    pub async fn require<E: Entity>(&mut self, id: Uuid, what: &str) -> ServiceResult<E> {
        self.get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("{} not found", what)))
    }

    /// Load several records, skipping missing ones and keeping input order
    pub async fn get_many<E: Entity>(&mut self, ids: &[Uuid]) -> ServiceResult<Vec<E>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = self.get::<E>(*id).await? {
                found.push(entity);
            }
        }
        Ok(found)
    }

    /// Load a record without recording its version for the commit check.
    ///
    /// Only for fields that never change after creation (post timestamps,
    /// authors) or display data that may be slightly stale. A record this
    /// unit already holds is returned as held.
    pub async fn peek<E: Entity>(&self, id: Uuid) -> ServiceResult<Option<E>> {
        let key = E::key_of(id);
        if self.slots.contains_key(&key) {
            return self.current(&key);
        }
        let found =
            with_timeout_result(self.timeout, async { Ok::<_, ServiceError>(self.store.fetch(key).await?) })
                .await?;
        match found {
            Some(versioned) => E::from_record(versioned.value)
                .map(Some)
                .ok_or(ServiceError::Store(super::StoreError::Corrupted(key))),
            None => Ok(None),
        }
    }

    /// [`UnitOfWork::peek`] for several ids, skipping missing ones
    pub async fn peek_many<E: Entity>(&self, ids: &[Uuid]) -> ServiceResult<Vec<E>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = self.peek::<E>(*id).await? {
                found.push(entity);
            }
        }
        Ok(found)
    }

    /// Find-by-filter without version tracking; see [`UnitOfWork::peek`].
    /// Records this unit holds replace their scanned copies.
    pub async fn find_untracked<E: Entity>(&self, filter: RecordFilter) -> ServiceResult<Vec<E>> {
        let scanned = with_timeout_result(self.timeout, async {
            Ok::<_, ServiceError>(self.store.scan(&filter).await?)
        })
        .await?;

        let mut found = Vec::with_capacity(scanned.len());
        for versioned in scanned {
            let key = versioned.value.key();
            let record = match self.slots.get(&key) {
                Some(slot) => match &slot.current {
                    Some(record) if filter.matches(record) => record.clone(),
                    _ => continue,
                },
                None => versioned.value,
            };
            let entity =
                E::from_record(record).ok_or(ServiceError::Store(super::StoreError::Corrupted(key)))?;
            found.push(entity);
        }
        Ok(found)
    }

    /// Find-by-filter, overlaid with this unit's own staged writes
    pub async fn find<E: Entity>(&mut self, filter: RecordFilter) -> ServiceResult<Vec<E>> {
        let scanned = with_timeout_result(self.timeout, async {
            Ok::<_, ServiceError>(self.store.scan(&filter).await?)
        })
        .await?;

        let mut keys = Vec::new();
        for versioned in scanned {
            let key = versioned.value.key();
            self.observe(key, Some(versioned));
            keys.push(key);
        }
        for key in &self.order {
            let staged_match = self.slots.get(key).is_some_and(|slot| {
                slot.dirty
                    && slot
                        .current
                        .as_ref()
                        .is_some_and(|record| filter.matches(record))
            });
            if staged_match && !keys.contains(key) {
                keys.push(*key);
            }
        }

        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            let still_matches = self
                .slots
                .get(&key)
                .and_then(|slot| slot.current.as_ref())
                .is_some_and(|record| filter.matches(record));
            if still_matches {
                if let Some(entity) = self.current::<E>(&key)? {
                    found.push(entity);
                }
            }
        }
        Ok(found)
    }

    /// Stage an insert or update
    pub fn put<E: Entity>(&mut self, entity: E) {
        let key = E::key_of(entity.id());
        let record = entity.into_record();
        match self.slots.get_mut(&key) {
            Some(slot) => {
                slot.current = Some(record);
                slot.dirty = true;
            }
            None => self.track(
                key,
                Slot {
                    base: Base::Unread,
                    current: Some(record),
                    dirty: true,
                },
            ),
        }
    }

    /// Stage a delete; deleting something already gone is a no-op
    pub fn delete<E: Entity>(&mut self, id: Uuid) {
        let key = E::key_of(id);
        match self.slots.get_mut(&key) {
            Some(slot) => {
                slot.current = None;
                slot.dirty = true;
            }
            None => self.track(
                key,
                Slot {
                    base: Base::Unread,
                    current: None,
                    dirty: true,
                },
            ),
        }
    }

    /// Queue a push to be sent once (and only if) the unit commits
    pub fn enqueue_push(&mut self, request: PushRequest) {
        self.outbox.push(request);
    }

    fn change_set(&self) -> ChangeSet {
        let mut changes = Vec::with_capacity(self.order.len());
        for key in &self.order {
            let Some(slot) = self.slots.get(key) else {
                continue;
            };
            let change = match (slot.dirty, slot.base, &slot.current) {
                (false, Base::Version(v), _) => Some(Change::Check {
                    key: *key,
                    expected_version: Some(v),
                }),
                (false, Base::Absent, _) => Some(Change::Check {
                    key: *key,
                    expected_version: None,
                }),
                (false, Base::Unread, _) => None,
                (true, Base::Version(v), Some(record)) => Some(Change::Update {
                    record: record.clone(),
                    expected_version: v,
                }),
                (true, Base::Version(v), None) => Some(Change::Delete {
                    key: *key,
                    expected_version: v,
                }),
                (true, Base::Absent | Base::Unread, Some(record)) => {
                    Some(Change::Insert(record.clone()))
                }
                (true, Base::Absent, None) => Some(Change::Check {
                    key: *key,
                    expected_version: None,
                }),
                (true, Base::Unread, None) => None,
            };
            changes.extend(change);
        }
        ChangeSet { changes }
    }

    /// Apply every staged write atomically. Returns the pushes to deliver.
    pub async fn commit(self) -> ServiceResult<Vec<PushRequest>> {
        let changes = self.change_set();
        if changes.writes() == 0 {
            return Ok(self.outbox);
        }

        debug!(writes = changes.writes(), "Committing unit of work");
        let store = self.store.clone();
        with_timeout_result(self.timeout, async move {
            Ok::<_, ServiceError>(store.commit(changes).await?)
        })
        .await?;
        Ok(self.outbox)
    }
}
