//! Binary image storage collaborator.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::MediaRef;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Media not found: {0}")]
    NotFound(MediaRef),

    #[error("Media store unavailable: {0}")]
    Unavailable(String),
}

/// Blob store: bytes in, stable reference out. Clients fetch images by URL,
/// so the engine itself never reads a blob back.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>) -> Result<MediaRef, MediaError>;
    async fn delete(&self, media: MediaRef) -> Result<(), MediaError>;
}

#[derive(Default)]
pub struct InMemoryMediaStore {
    blobs: RwLock<HashMap<MediaRef, Vec<u8>>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, media: MediaRef) -> bool {
        self.blobs.read().contains_key(&media)
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<MediaRef, MediaError> {
        let media = MediaRef(Uuid::new_v4());
        self.blobs.write().insert(media, bytes);
        Ok(media)
    }

    async fn delete(&self, media: MediaRef) -> Result<(), MediaError> {
        self.blobs
            .write()
            .remove(&media)
            .map(|_| ())
            .ok_or(MediaError::NotFound(media))
    }
}
