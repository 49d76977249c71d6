//! Library file rows and probed media information

use serde::{Deserialize, Serialize};

/// Technical metadata extracted by the media probe (or parsed from the
/// filename before the probe completes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub video_codec: Option<String>,
    pub video_resolution: Option<String>,
    pub video_bit_depth: Option<i32>,
    pub video_dynamic_range: Option<String>,
    pub video_dynamic_range_type: Option<String>,
    pub audio_codec: Option<String>,
    pub audio_channels: Option<f64>,
    pub audio_languages: Vec<String>,
    pub subtitle_languages: Vec<String>,
    pub duration_seconds: Option<f64>,
    pub container_format: Option<String>,
}

impl MediaInfo {
    pub fn is_empty(&self) -> bool {
        *self == MediaInfo::default()
    }
}

/// A movie_file / episode_file row. Both tables share the same shape; the
/// owning media is identified by `media_id` plus the table the row lives in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryFile {
    pub id: i64,
    pub media_id: i64,
    pub path: String,
    pub size: i64,
    /// Human-readable quality label parsed at import time, e.g. "WEBDL-1080p"
    pub quality: String,
    pub quality_id: Option<i64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub audio_channels: Option<f64>,
    pub dynamic_range: Option<String>,
    pub resolution: Option<String>,
    /// Path the file was imported from; scanner dedupe key
    pub original_path: Option<String>,
    pub original_filename: Option<String>,
}

impl LibraryFile {
    /// New unsaved row; id is assigned by the store.
    pub fn new(media_id: i64, path: impl Into<String>, size: i64) -> Self {
        Self {
            id: 0,
            media_id,
            path: path.into(),
            size,
            quality: String::new(),
            quality_id: None,
            video_codec: None,
            audio_codec: None,
            audio_channels: None,
            dynamic_range: None,
            resolution: None,
            original_path: None,
            original_filename: None,
        }
    }

    pub fn apply_media_info(&mut self, info: &MediaInfo) {
        self.video_codec = info.video_codec.clone();
        self.audio_codec = info.audio_codec.clone();
        self.audio_channels = info.audio_channels;
        self.dynamic_range = info.video_dynamic_range.clone();
        self.resolution = info.video_resolution.clone();
    }
}
