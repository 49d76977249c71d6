//! Domain models for the import core

pub mod decision;
pub mod download;
pub mod files;
pub mod matching;
pub mod media;
pub mod quality;
pub mod slots;

pub use decision::{DecisionCode, ImportDecision};
pub use download::{DownloadItem, DownloadKind, DownloadMapping, FileStatus, QueueMedia};
pub use files::{LibraryFile, MediaInfo};
pub use matching::{LibraryMatch, MatchSource, ParsedRelease};
pub use media::{Episode, MediaKind, Movie, RootFolder, Series, SeriesType};
pub use quality::{QualityModel, QualityProfile, QualityProfileItem};
pub use slots::{SlotAssignment, SlotEvaluation};
