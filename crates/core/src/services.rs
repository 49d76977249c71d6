//! Collaborator service traits
//!
//! The import core consumes the rest of the application exclusively through
//! these contracts. Tests provide in-memory implementations.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{
    DownloadItem, DownloadMapping, Episode, FileStatus, ImportDecision, LibraryFile, MediaInfo,
    MediaKind, Movie, ParsedRelease, QualityModel, QualityProfile, QueueMedia, RootFolder, Series,
    SlotEvaluation,
};
use crate::settings::ImportSettings;

/// Movie library read/write surface
#[async_trait]
pub trait MovieLibrary: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Movie>>;

    /// List movies, optionally filtered by a broad title substring. The
    /// filter is a coarse pre-selection; callers rank the result locally.
    async fn list(&self, title_filter: Option<&str>) -> Result<Vec<Movie>>;

    async fn get_primary_file(&self, movie_id: i64) -> Result<Option<LibraryFile>>;

    async fn get_files(&self, movie_id: i64) -> Result<Vec<LibraryFile>>;

    async fn get_file_by_id(&self, file_id: i64) -> Result<Option<LibraryFile>>;

    /// Insert a file row, returning it with its assigned id
    async fn add_file(&self, file: &LibraryFile) -> Result<LibraryFile>;

    async fn remove_file(&self, file_id: i64) -> Result<()>;

    async fn update_file_media_info(&self, file_id: i64, info: &MediaInfo) -> Result<()>;

    async fn update_file_path(&self, file_id: i64, path: &str) -> Result<()>;
}

/// Series/episode library read/write surface
#[async_trait]
pub trait TvLibrary: Send + Sync {
    async fn get_series(&self, id: i64) -> Result<Option<Series>>;

    async fn list_series(&self, title_filter: Option<&str>) -> Result<Vec<Series>>;

    async fn get_episode(&self, id: i64) -> Result<Option<Episode>>;

    async fn list_episodes(&self, series_id: i64, season_number: i32) -> Result<Vec<Episode>>;

    async fn list_seasons(&self, series_id: i64) -> Result<Vec<i32>>;

    async fn get_episode_by_number(
        &self,
        series_id: i64,
        season_number: i32,
        episode_number: i32,
    ) -> Result<Option<Episode>>;

    async fn add_episode_file(&self, file: &LibraryFile) -> Result<LibraryFile>;

    async fn remove_episode_file(&self, file_id: i64) -> Result<()>;

    /// Current file for an episode, if any
    async fn get_episode_file(&self, episode_id: i64) -> Result<Option<LibraryFile>>;

    async fn get_episode_file_by_id(&self, file_id: i64) -> Result<Option<LibraryFile>>;

    async fn update_episode_file_media_info(&self, file_id: i64, info: &MediaInfo) -> Result<()>;

    async fn update_episode_file_path(&self, file_id: i64, path: &str) -> Result<()>;
}

/// Root folder registry
#[async_trait]
pub trait RootFolders: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<RootFolder>>;
}

/// Quality profile service
#[async_trait]
pub trait QualityProfiles: Send + Sync {
    async fn get(&self, profile_id: i64) -> Result<Option<QualityProfile>>;

    /// Resolve filename-parsed quality/source strings against a profile's
    /// quality ladder.
    fn match_quality(
        &self,
        quality: &str,
        source: &str,
        profile: &QualityProfile,
    ) -> Option<QualityModel>;
}

/// Multi-version slot store
#[async_trait]
pub trait SlotService: Send + Sync {
    async fn is_multi_version_enabled(&self) -> Result<bool>;

    async fn get_root_folder_for_slot(&self, slot_id: i64) -> Result<Option<RootFolder>>;

    async fn evaluate_release(
        &self,
        parsed: &ParsedRelease,
        media_kind: MediaKind,
        media_id: i64,
    ) -> Result<SlotEvaluation>;

    /// File currently bound to a slot of the media item
    async fn get_slot_file_id(
        &self,
        media_kind: MediaKind,
        media_id: i64,
        slot_id: i64,
    ) -> Result<Option<i64>>;

    async fn assign_file_to_slot(
        &self,
        media_kind: MediaKind,
        media_id: i64,
        slot_id: i64,
        file_id: i64,
    ) -> Result<()>;
}

/// One configured download client
#[async_trait]
pub trait DownloadClient: Send + Sync {
    async fn list(&self) -> Result<Vec<DownloadItem>>;

    async fn get_download_dir(&self) -> Result<String>;

    async fn remove(&self, download_id: &str) -> Result<()>;
}

/// Download-client registry plus mapping persistence
#[async_trait]
pub trait DownloadService: Send + Sync {
    async fn list_clients(&self) -> Result<Vec<i64>>;

    async fn get_client(&self, client_id: i64) -> Result<Arc<dyn DownloadClient>>;

    async fn list_mappings(&self) -> Result<Vec<DownloadMapping>>;

    async fn delete_download_mapping(&self, mapping_id: i64) -> Result<()>;
}

/// Background media probe (ffprobe or equivalent)
#[async_trait]
pub trait MediaProber: Send + Sync {
    fn is_available(&self) -> bool;

    async fn probe(&self, path: &str, cancel: &CancellationToken) -> Result<MediaInfo>;
}

/// A history ledger entry
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HistoryEntry {
    pub event_type: String,
    pub media_kind: MediaKind,
    pub media_id: i64,
    pub source_path: String,
    pub destination_path: String,
    pub data: serde_json::Value,
}

/// History sink; failures here never fail an import
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, entry: &HistoryEntry) -> Result<()>;
}

/// Health warning registry keyed by source path
#[async_trait]
pub trait HealthSink: Send + Sync {
    async fn warn(&self, source_path: &str, message: &str) -> Result<()>;

    async fn clear(&self, source_path: &str) -> Result<()>;
}

/// Loads the import_settings singleton
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<ImportSettings>;
}

/// Memoised rejection store (import_decision table)
#[async_trait]
pub trait DecisionStore: Send + Sync {
    async fn get(&self, source_path: &str) -> Result<Option<ImportDecision>>;

    async fn upsert(&self, decision: &ImportDecision) -> Result<()>;

    async fn delete(&self, source_path: &str) -> Result<()>;

    /// Drop every memo produced under a profile; called when the profile
    /// changes so previously rejected paths are reconsidered.
    async fn invalidate_for_profile(&self, quality_profile_id: i64) -> Result<()>;
}

/// Per-file queue rows (queue_media table)
#[async_trait]
pub trait QueueMediaStore: Send + Sync {
    async fn create(&self, media: &QueueMedia) -> Result<QueueMedia>;

    async fn get_by_path(&self, file_path: &str) -> Result<Option<QueueMedia>>;

    async fn list_for_mapping(&self, mapping_id: i64) -> Result<Vec<QueueMedia>>;

    async fn update_status(
        &self,
        id: i64,
        status: FileStatus,
        error_message: Option<&str>,
    ) -> Result<()>;

    async fn increment_attempts(&self, id: i64) -> Result<()>;
}
