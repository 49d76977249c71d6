//! Memoised import rejections

use serde::{Deserialize, Serialize};

use crate::models::media::MediaKind;

/// Why a path was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionCode {
    NotUpgrade,
    NotAcceptable,
}

/// One row per rejected source path; lets the scanner skip paths it has
/// already turned down. Rows are invalidated when the quality profile that
/// produced them changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDecision {
    pub source_path: String,
    pub decision: DecisionCode,
    pub media_kind: MediaKind,
    pub media_id: i64,
    pub candidate_quality_id: Option<i64>,
    pub existing_quality_id: Option<i64>,
    pub existing_file_id: Option<i64>,
    pub quality_profile_id: Option<i64>,
}
