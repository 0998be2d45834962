//! Store abstraction for the social graph.
//!
//! The backing store only knows about versioned records, filtered scans and
//! an all-or-nothing conditional commit. Everything that keeps the
//! denormalized lists consistent lives above it, in [`UnitOfWork`].

pub mod memory;
pub mod unit_of_work;

pub use memory::InMemoryStore;
pub use unit_of_work::UnitOfWork;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::{Comment, Hashtag, Notification, NotificationKind, Post, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKind {
    User,
    Post,
    Comment,
    Hashtag,
    Notification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub kind: RecordKind,
    pub id: Uuid,
}

impl RecordKey {
    pub fn new(kind: RecordKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}/{}", self.kind, self.id)
    }
}

/// Any record the store can hold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Record {
    User(User),
    Post(Post),
    Comment(Comment),
    Hashtag(Hashtag),
    Notification(Notification),
}

impl Record {
    pub fn key(&self) -> RecordKey {
        match self {
            Record::User(r) => RecordKey::new(RecordKind::User, r.id),
            Record::Post(r) => RecordKey::new(RecordKind::Post, r.id),
            Record::Comment(r) => RecordKey::new(RecordKind::Comment, r.id),
            Record::Hashtag(r) => RecordKey::new(RecordKind::Hashtag, r.id),
            Record::Notification(r) => RecordKey::new(RecordKind::Notification, r.id),
        }
    }
}

/// Record plus the version it was stored under
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Typed access to [`Record`] variants
pub trait Entity: Clone + Send + Sync + Sized + 'static {
    const KIND: RecordKind;

    fn id(&self) -> Uuid;
    fn into_record(self) -> Record;
    fn from_record(record: Record) -> Option<Self>;

    fn key_of(id: Uuid) -> RecordKey {
        RecordKey::new(Self::KIND, id)
    }
}

macro_rules! impl_entity {
    ($ty:ident) => {
        impl Entity for $ty {
            const KIND: RecordKind = RecordKind::$ty;

            fn id(&self) -> Uuid {
                self.id
            }

            fn into_record(self) -> Record {
                Record::$ty(self)
            }

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$ty(value) => Some(value),
                    _ => None,
                }
            }
        }
    };
}

impl_entity!(User);
impl_entity!(Post);
impl_entity!(Comment);
impl_entity!(Hashtag);
impl_entity!(Notification);

/// Find-by-filter queries the engine needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    /// Exact match on the normalized username
    UserByUsername(String),
    /// Exact match on the normalized email
    UserByEmail(String),
    /// Normalized username contains the fragment
    UsersMatching(String),
    /// Exact match on the normalized tag
    HashtagByTag(String),
    /// Tag contains the fragment
    HashtagsMatching(String),
    PostsNotAuthoredBy(Uuid),
    /// Interaction and mention notifications that reference the post
    NotificationsForPost(Uuid),
    FollowNotification { recipient_id: Uuid, actor_id: Uuid },
}

impl RecordFilter {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordFilter::UserByUsername(_)
            | RecordFilter::UserByEmail(_)
            | RecordFilter::UsersMatching(_) => RecordKind::User,
            RecordFilter::HashtagByTag(_) | RecordFilter::HashtagsMatching(_) => {
                RecordKind::Hashtag
            }
            RecordFilter::PostsNotAuthoredBy(_) => RecordKind::Post,
            RecordFilter::NotificationsForPost(_) | RecordFilter::FollowNotification { .. } => {
                RecordKind::Notification
            }
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match (self, record) {
            (RecordFilter::UserByUsername(name), Record::User(u)) => {
                u.username_normalized == *name
            }
            (RecordFilter::UserByEmail(email), Record::User(u)) => u.email == *email,
            (RecordFilter::UsersMatching(fragment), Record::User(u)) => {
                u.username_normalized.contains(fragment.as_str())
            }
            (RecordFilter::HashtagByTag(tag), Record::Hashtag(h)) => h.tag == *tag,
            (RecordFilter::HashtagsMatching(fragment), Record::Hashtag(h)) => {
                h.tag.contains(fragment.as_str())
            }
            (RecordFilter::PostsNotAuthoredBy(author), Record::Post(p)) => p.author_id != *author,
            (RecordFilter::NotificationsForPost(post_id), Record::Notification(n)) => {
                n.kind.post_id() == Some(*post_id)
            }
            (
                RecordFilter::FollowNotification {
                    recipient_id,
                    actor_id,
                },
                Record::Notification(n),
            ) => {
                n.kind == NotificationKind::Follow
                    && n.recipient_id == *recipient_id
                    && n.actor_id == *actor_id
            }
            _ => false,
        }
    }
}

/// One conditional write inside a [`ChangeSet`]
#[derive(Debug, Clone)]
pub enum Change {
    /// Insert a record that must not exist yet
    Insert(Record),
    /// Replace a record that must still be at `expected_version`
    Update { record: Record, expected_version: u64 },
    /// Remove a record that must still be at `expected_version`
    Delete { key: RecordKey, expected_version: u64 },
    /// Read-set validation: the record must still be at this version
    /// (`None` = must still be absent)
    Check {
        key: RecordKey,
        expected_version: Option<u64>,
    },
}

/// Writes of one logical mutation, applied atomically or not at all
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub changes: Vec<Change>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn writes(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| !matches!(c, Change::Check { .. }))
            .count()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Version conflict: {0}")]
    Conflict(String),

    #[error("Corrupted record: {0}")]
    Corrupted(RecordKey),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Id-generating persistent store with fetch / find-by-filter / atomic commit
#[async_trait]
pub trait SocialStore: Send + Sync {
    fn generate_id(&self) -> Uuid {
        Uuid::new_v4()
    }

    async fn fetch(&self, key: RecordKey) -> StoreResult<Option<Versioned<Record>>>;

    async fn scan(&self, filter: &RecordFilter) -> StoreResult<Vec<Versioned<Record>>>;

    /// Apply every change or none. Any version mismatch or unique-constraint
    /// violation fails the whole set with [`StoreError::Conflict`].
    async fn commit(&self, changes: ChangeSet) -> StoreResult<()>;
}
