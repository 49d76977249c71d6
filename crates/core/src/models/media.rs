//! Library media entities

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of media an import resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Episode,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Episode => write!(f, "episode"),
        }
    }
}

/// Series classification, drives which naming pattern applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SeriesType {
    #[default]
    Standard,
    Daily,
    Anime,
}

/// Movie library entity (read surface consumed by the import core)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub path: Option<String>,
    pub root_folder_id: Option<i64>,
    pub quality_profile_id: Option<i64>,
    pub monitored: bool,
}

impl Movie {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            year: None,
            path: None,
            root_folder_id: None,
            quality_profile_id: None,
            monitored: true,
        }
    }
}

/// Series library entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub series_type: SeriesType,
    pub path: Option<String>,
    pub root_folder_id: Option<i64>,
    pub quality_profile_id: Option<i64>,
    pub monitored: bool,
}

impl Series {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            year: None,
            series_type: SeriesType::Standard,
            path: None,
            root_folder_id: None,
            quality_profile_id: None,
            monitored: true,
        }
    }
}

/// Episode library entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub series_id: i64,
    pub season_number: i32,
    pub episode_number: i32,
    pub absolute_number: Option<i32>,
    pub title: Option<String>,
    pub air_date: Option<NaiveDate>,
}

/// Registered library root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootFolder {
    pub id: i64,
    pub path: String,
}
