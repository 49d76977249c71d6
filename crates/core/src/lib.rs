//! Core domain models and contracts for the mediarr import pipeline
//!
//! This crate contains the error taxonomy, domain models, collaborator
//! service traits, settings, retry classification, and the event bus that
//! the import crate builds on.

pub mod error;
pub mod events;
pub mod models;
pub mod retry;
pub mod services;
pub mod settings;

// Re-export core types
pub use error::{ImportError, Result};
pub use events::{EventBus, EventEnvelope, EventSubscriber, SystemEvent};
pub use models::*;
pub use retry::{classify, retry_import, RetryClass, RetryConfig};
pub use settings::{
    CaseTransform, ColonReplacement, ConflictPolicy, ImportSettings, MultiEpisodeStyle,
    UnknownMediaPolicy, ValidationLevel, DEFAULT_VIDEO_EXTENSIONS,
};
