//! Download-side entities: queue mappings and per-file queue media rows

use serde::{Deserialize, Serialize};

use crate::models::media::MediaKind;

/// What a dispatched download was expected to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadKind {
    Movie,
    Episode,
    Season,
    Series,
}

impl DownloadKind {
    pub fn media_kind(&self) -> MediaKind {
        match self {
            DownloadKind::Movie => MediaKind::Movie,
            _ => MediaKind::Episode,
        }
    }
}

/// Link between a download-client item and the library entity it was
/// grabbed for. Created at dispatch time, soft-deleted once imported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadMapping {
    pub id: i64,
    pub client_id: i64,
    pub download_id: String,
    pub kind: DownloadKind,
    pub movie_id: Option<i64>,
    pub series_id: Option<i64>,
    pub season_number: Option<i32>,
    pub episode_id: Option<i64>,
    pub target_slot_id: Option<i64>,
    pub is_season_pack: bool,
    pub is_complete_series: bool,
}

/// Per-file lifecycle within a download (season packs get one row per file)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Downloading,
    Ready,
    Importing,
    Imported,
    Failed,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileStatus::Pending => "pending",
            FileStatus::Downloading => "downloading",
            FileStatus::Ready => "ready",
            FileStatus::Importing => "importing",
            FileStatus::Imported => "imported",
            FileStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// One file of a download, tracked independently so season packs can be
/// imported file-by-file as episodes finish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMedia {
    pub id: i64,
    pub mapping_id: i64,
    pub movie_id: Option<i64>,
    pub episode_id: Option<i64>,
    pub file_path: String,
    pub file_status: FileStatus,
    pub error_message: Option<String>,
    pub import_attempts: i32,
}

/// An item reported by a download client's `list()` surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadItem {
    pub download_id: String,
    pub name: String,
    pub path: String,
    pub is_complete: bool,
}
