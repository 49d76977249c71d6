//! Match evidence and the reconciled library match

use serde::{Deserialize, Serialize};

use crate::models::media::MediaKind;

/// Where a match came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Queue,
    Parse,
    Manual,
}

/// Resolution of an input file to a library entity.
///
/// Exactly one of `movie_id` or `series_id` + `season_number` is populated,
/// per `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryMatch {
    pub kind: MediaKind,
    pub movie_id: Option<i64>,
    pub series_id: Option<i64>,
    pub season_number: Option<i32>,
    pub episode_id: Option<i64>,
    /// Populated for multi-episode files; includes `episode_id`
    pub episode_ids: Vec<i64>,
    pub confidence: f32,
    pub source: MatchSource,
    pub root_folder: Option<String>,
    pub is_upgrade: bool,
    pub existing_file_path: Option<String>,
    pub existing_file_id: Option<i64>,
    pub candidate_quality_id: Option<i64>,
    pub existing_quality_id: Option<i64>,
    pub quality_profile_id: Option<i64>,
}

impl LibraryMatch {
    pub fn movie(movie_id: i64, source: MatchSource, confidence: f32) -> Self {
        Self {
            kind: MediaKind::Movie,
            movie_id: Some(movie_id),
            series_id: None,
            season_number: None,
            episode_id: None,
            episode_ids: Vec::new(),
            confidence,
            source,
            root_folder: None,
            is_upgrade: false,
            existing_file_path: None,
            existing_file_id: None,
            candidate_quality_id: None,
            existing_quality_id: None,
            quality_profile_id: None,
        }
    }

    pub fn episode(series_id: i64, source: MatchSource, confidence: f32) -> Self {
        Self {
            kind: MediaKind::Episode,
            movie_id: None,
            series_id: Some(series_id),
            season_number: None,
            episode_id: None,
            episode_ids: Vec::new(),
            confidence,
            source,
            root_folder: None,
            is_upgrade: false,
            existing_file_path: None,
            existing_file_id: None,
            candidate_quality_id: None,
            existing_quality_id: None,
            quality_profile_id: None,
        }
    }

    /// The id of the matched media, movie or episode's series
    pub fn media_id(&self) -> Option<i64> {
        match self.kind {
            MediaKind::Movie => self.movie_id,
            MediaKind::Episode => self.series_id,
        }
    }
}

/// Evidence decoded from a release filename.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedRelease {
    pub original_filename: String,
    pub title: String,
    pub year: Option<i32>,
    pub season_number: Option<i32>,
    /// All episode numbers decoded from the filename, sorted ascending
    pub episode_numbers: Vec<i32>,
    pub absolute_number: Option<i32>,
    /// Resolution label, e.g. "1080p"
    pub resolution: Option<String>,
    /// Source label, e.g. "WEBDL"
    pub source: Option<String>,
    pub codec: Option<String>,
    pub release_group: Option<String>,
    pub edition: Option<String>,
    /// Scene revision: PROPER/REPACK releases
    pub proper: bool,
    /// Release version, vN in the filename; 1 when absent
    pub version: i32,
}

impl ParsedRelease {
    pub fn is_tv(&self) -> bool {
        !self.episode_numbers.is_empty()
    }

    pub fn is_multi_episode(&self) -> bool {
        self.episode_numbers.len() > 1
    }

    /// "Source-Resolution" label used for file rows and history payloads,
    /// e.g. "WEBDL-1080p". Pieces are skipped when missing.
    pub fn quality_label(&self) -> String {
        match (self.source.as_deref(), self.resolution.as_deref()) {
            (Some(src), Some(res)) => format!("{}-{}", src, res),
            (Some(src), None) => src.to_string(),
            (None, Some(res)) => res.to_string(),
            (None, None) => "Unknown".to_string(),
        }
    }

    /// Revision label for naming tokens: "Proper" wins over versions
    pub fn revision_label(&self) -> String {
        if self.proper {
            "Proper".to_string()
        } else if self.version > 1 {
            format!("v{}", self.version)
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_label() {
        let parsed = ParsedRelease {
            source: Some("WEBDL".to_string()),
            resolution: Some("1080p".to_string()),
            ..Default::default()
        };
        assert_eq!(parsed.quality_label(), "WEBDL-1080p");

        let parsed = ParsedRelease {
            resolution: Some("720p".to_string()),
            ..Default::default()
        };
        assert_eq!(parsed.quality_label(), "720p");

        assert_eq!(ParsedRelease::default().quality_label(), "Unknown");
    }

    #[test]
    fn test_revision_label() {
        let mut parsed = ParsedRelease::default();
        parsed.version = 1;
        assert_eq!(parsed.revision_label(), "");
        parsed.version = 2;
        assert_eq!(parsed.revision_label(), "v2");
        parsed.proper = true;
        assert_eq!(parsed.revision_label(), "Proper");
    }
}
