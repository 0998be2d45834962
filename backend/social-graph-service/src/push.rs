/// Push Notification Delivery
///
/// Mutations never talk to a push provider directly. They queue
/// [`PushRequest`]s on their unit of work, and once the unit commits the
/// requests are handed to an injected [`PushSender`] on spawned tasks.
/// Delivery failures are logged and dropped.
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Push notification request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    pub notification_id: Uuid,
    pub device_token: String,
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum PushError {
    #[error("Push provider rejected the request: {0}")]
    Rejected(String),

    #[error("Push provider unavailable: {0}")]
    Unavailable(String),
}

/// Device push transport (FCM, APNs, ...)
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, request: PushRequest) -> Result<(), PushError>;
}

/// Sender that only logs; the default when no provider is configured
#[derive(Debug, Default, Clone)]
pub struct LoggingPushSender;

#[async_trait]
impl PushSender for LoggingPushSender {
    async fn send(&self, request: PushRequest) -> Result<(), PushError> {
        info!(
            notification_id = %request.notification_id,
            "Push notification: {} - {}",
            request.title,
            request.body
        );
        Ok(())
    }
}

/// Sender that keeps every request in memory, for inspection
#[derive(Debug, Default)]
pub struct RecordingPushSender {
    sent: Mutex<Vec<PushRequest>>,
    fail: bool,
}

impl RecordingPushSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every request but report each one as failed
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<PushRequest> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl PushSender for RecordingPushSender {
    async fn send(&self, request: PushRequest) -> Result<(), PushError> {
        self.sent.lock().push(request);
        if self.fail {
            return Err(PushError::Unavailable("recording sender set to fail".into()));
        }
        Ok(())
    }
}

/// Fire-and-forget delivery of the requests a committed unit of work queued
pub fn dispatch(
    sender: Arc<dyn PushSender>,
    requests: Vec<PushRequest>,
    deadline: Duration,
) -> Vec<tokio::task::JoinHandle<()>> {
    if !requests.is_empty() {
        debug!("Dispatching {} push notifications", requests.len());
    }

    requests
        .into_iter()
        .map(|request| {
            let sender = sender.clone();
            tokio::spawn(async move {
                let notification_id = request.notification_id;
                match resilience::with_timeout(deadline, sender.send(request)).await {
                    Ok(Ok(())) => debug!(%notification_id, "Push delivered"),
                    Ok(Err(e)) => warn!(%notification_id, "Push delivery failed: {}", e),
                    Err(e) => warn!(%notification_id, "Push delivery timed out: {}", e),
                }
            })
        })
        .collect()
}
