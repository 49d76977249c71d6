//! Event system for inter-component communication
//!
//! A simple event bus on tokio broadcast channels; the import pipeline
//! publishes here and WebSocket/notification layers subscribe.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ImportError, Result};
use crate::models::MediaKind;

/// Maximum number of events to buffer in the channel
const EVENT_BUFFER_SIZE: usize = 1000;

/// Event envelope carrying identity and timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event: SystemEvent,
}

impl EventEnvelope {
    pub fn new(event: SystemEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            event,
        }
    }
}

/// System events published by the import core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SystemEvent {
    /// An import finished and the library row exists
    ImportCompleted {
        source: String,
        destination: String,
        media_type: MediaKind,
        is_upgrade: bool,
    },
    /// An import gave up (permanent failure or retries exhausted)
    ImportFailed { source: String, error: String },
    /// A download finished and is ready for import consideration
    DownloadCompleted {
        client_id: i64,
        download_id: String,
        download_path: String,
        media_type: MediaKind,
        movie_id: Option<i64>,
        series_id: Option<i64>,
        episode_id: Option<i64>,
        is_season_pack: bool,
    },
    /// Refresh ping after a movie's files changed
    MovieUpdated { movie_id: i64 },
    /// Refresh ping after a series' files changed
    SeriesUpdated { series_id: i64 },
}

impl SystemEvent {
    /// Topic string used by outer transport layers
    pub fn topic(&self) -> &'static str {
        match self {
            SystemEvent::ImportCompleted { .. } => "import:completed",
            SystemEvent::ImportFailed { .. } => "import:failed",
            SystemEvent::DownloadCompleted { .. } => "download:completed",
            SystemEvent::MovieUpdated { .. } => "movie:updated",
            SystemEvent::SeriesUpdated { .. } => "series:updated",
        }
    }

    /// Short description for logging
    pub fn description(&self) -> String {
        match self {
            SystemEvent::ImportCompleted {
                source,
                destination,
                ..
            } => format!("Import completed: {} -> {}", source, destination),
            SystemEvent::ImportFailed { source, error } => {
                format!("Import failed: {} ({})", source, error)
            }
            SystemEvent::DownloadCompleted { download_path, .. } => {
                format!("Download completed: {}", download_path)
            }
            SystemEvent::MovieUpdated { movie_id } => format!("Movie updated: {}", movie_id),
            SystemEvent::SeriesUpdated { series_id } => format!("Series updated: {}", series_id),
        }
    }
}

/// Event bus for publishing and subscribing to system events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { sender }
    }

    /// Publish an event to all subscribers. Publishing with no receivers is
    /// not an error.
    pub fn publish(&self, event: SystemEvent) {
        let envelope = EventEnvelope::new(event);
        debug!("Publishing event: {}", envelope.event.description());
        if self.sender.send(envelope).is_err() {
            debug!("Event published but no receivers");
        }
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the bus
pub struct EventSubscriber {
    receiver: broadcast::Receiver<EventEnvelope>,
}

impl EventSubscriber {
    /// Receive the next event envelope; lagged subscribers skip ahead
    pub async fn recv(&mut self) -> Result<EventEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Ok(envelope),
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(ImportError::ExternalServiceError {
                        service: "event_bus".to_string(),
                        error: "event bus channel closed".to_string(),
                    })
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                }
            }
        }
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Result<Option<EventEnvelope>> {
        match self.receiver.try_recv() {
            Ok(envelope) => Ok(Some(envelope)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(ImportError::ExternalServiceError {
                service: "event_bus".to_string(),
                error: "event bus channel closed".to_string(),
            }),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!("Event subscriber lagged, skipped {} events", skipped);
                Ok(None)
            }
        }
    }
}
