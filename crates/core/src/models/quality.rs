//! Quality definitions and upgrade decisions

use serde::{Deserialize, Serialize};

/// A single quality definition, e.g. WEBDL-1080p
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityModel {
    pub id: i64,
    pub name: String,
    /// Source component matched against filename evidence, e.g. "WEBDL"
    pub source: String,
    /// Vertical resolution, e.g. 1080
    pub resolution: i32,
}

/// One slot in a profile's ordered quality ladder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityProfileItem {
    pub quality: QualityModel,
    pub allowed: bool,
}

/// Quality profile for upgrade decisions. Items are ordered worst to best;
/// the item index is the quality's rank within the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityProfile {
    pub id: i64,
    pub name: String,
    pub upgrades_enabled: bool,
    pub cutoff_quality_id: i64,
    pub items: Vec<QualityProfileItem>,
}

impl QualityProfile {
    fn rank_of(&self, quality_id: i64) -> Option<usize> {
        self.items.iter().position(|i| i.quality.id == quality_id)
    }

    pub fn contains(&self, quality_id: i64) -> bool {
        self.rank_of(quality_id).is_some()
    }

    /// True when `quality_id` sits at or above the profile cutoff, meaning
    /// no further upgrades are pursued.
    pub fn is_at_or_above_cutoff(&self, quality_id: i64) -> bool {
        match (self.rank_of(quality_id), self.rank_of(self.cutoff_quality_id)) {
            (Some(rank), Some(cutoff)) => rank >= cutoff,
            _ => false,
        }
    }

    /// True when replacing `existing` with `candidate` is an upgrade under
    /// this profile's ladder.
    pub fn is_upgrade(&self, existing_quality_id: i64, candidate_quality_id: i64) -> bool {
        match (
            self.rank_of(existing_quality_id),
            self.rank_of(candidate_quality_id),
        ) {
            (Some(existing), Some(candidate)) => candidate > existing,
            // Unknown existing quality: any known candidate is an upgrade
            (None, Some(_)) => true,
            _ => false,
        }
    }
}
