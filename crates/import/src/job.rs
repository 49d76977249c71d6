//! Import job and result types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mediarr_core::{
    DownloadMapping, LibraryMatch, MediaInfo, QueueMedia, SlotEvaluation,
};

use crate::placement::LinkMode;

/// One unit of work for the pipeline: a single source path plus whatever
/// queue context exists for it. Exactly one job per source path is ever in
/// flight; the coordinator's processing set enforces that.
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub id: Uuid,
    pub source_path: PathBuf,
    pub mapping: Option<DownloadMapping>,
    pub queue_media: Option<QueueMedia>,
    /// Manual imports override the upgrade gate and may carry a confirmed
    /// match and target slot chosen by the user
    pub manual: bool,
    pub confirmed_match: Option<LibraryMatch>,
    pub target_slot_id: Option<i64>,
}

impl ImportJob {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_path: source_path.into(),
            mapping: None,
            queue_media: None,
            manual: false,
            confirmed_match: None,
            target_slot_id: None,
        }
    }

    pub fn manual(source_path: impl Into<PathBuf>) -> Self {
        Self {
            manual: true,
            ..Self::new(source_path)
        }
    }

    pub fn with_mapping(mut self, mapping: DownloadMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn with_queue_media(mut self, media: QueueMedia) -> Self {
        self.queue_media = Some(media);
        self
    }

    pub fn with_confirmed_match(mut self, library_match: LibraryMatch) -> Self {
        self.confirmed_match = Some(library_match);
        self
    }

    pub fn with_target_slot(mut self, slot_id: i64) -> Self {
        self.target_slot_id = Some(slot_id);
        self
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    pub source_path: PathBuf,
    pub destination_path: Option<PathBuf>,
    pub library_match: Option<LibraryMatch>,
    pub media_info: Option<MediaInfo>,
    pub link_mode: Option<LinkMode>,
    pub error: Option<String>,
    pub is_upgrade: bool,
    pub previous_file: Option<PathBuf>,
    /// Slot evaluation outputs (multi-version mode)
    pub slot_evaluation: Option<SlotEvaluation>,
    pub requires_slot_selection: bool,
    pub assigned_slot_id: Option<i64>,
    /// Library file row created for the import
    pub file_id: Option<i64>,
}

impl ImportResult {
    pub fn for_source(source_path: PathBuf) -> Self {
        Self {
            source_path,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_builders() {
        let job = ImportJob::new("/dl/a.mkv");
        assert!(!job.manual);
        assert!(job.mapping.is_none());

        let manual = ImportJob::manual("/dl/a.mkv").with_target_slot(3);
        assert!(manual.manual);
        assert_eq!(manual.target_slot_id, Some(3));
    }
}
