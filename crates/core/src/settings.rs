//! Import settings, the singleton `import_settings` row.
//!
//! Settings are loaded on demand through [`crate::services::SettingsStore`]
//! and treated as an immutable snapshot for the duration of one job.

use serde::{Deserialize, Serialize};

/// How hard the validator looks at an incoming file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    Basic,
    #[default]
    Standard,
    Full,
}

/// Which evidence source wins when queue and parse disagree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    TrustQueue,
    TrustParse,
    Fail,
}

/// What to do when no library match exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownMediaPolicy {
    #[default]
    Ignore,
    AutoAdd,
}

/// Replacement strategy for `:` in resolved names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColonReplacement {
    Delete,
    Dash,
    SpaceDash,
    SpaceDashSpace,
    #[default]
    Smart,
    Custom,
}

/// How multi-episode files render their episode identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MultiEpisodeStyle {
    #[default]
    Extend,
    Duplicate,
    Repeat,
    Scene,
    Range,
    PrefixedRange,
}

/// Case transformation applied to resolved filenames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaseTransform {
    #[default]
    Default,
    Upper,
    Lower,
    Title,
}

/// Default video extension allow-list, used when the settings row carries none
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &[
    ".mkv", ".mp4", ".avi", ".mov", ".wmv", ".flv", ".webm", ".m4v", ".mpg", ".mpeg", ".ts",
];

/// The import_settings singleton
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSettings {
    pub validation_level: ValidationLevel,
    pub min_size_mb: u64,
    /// Extensions including the leading dot, lower case
    pub video_extensions: Vec<String>,
    pub conflict_policy: ConflictPolicy,
    pub unknown_media_policy: UnknownMediaPolicy,

    // Renaming knobs
    pub rename_episodes: bool,
    pub replace_illegal_characters: bool,
    pub colon_replacement: ColonReplacement,
    pub custom_colon_replacement: String,
    pub case_transform: CaseTransform,
    pub multi_episode_style: MultiEpisodeStyle,

    // Episode patterns, selected by series type
    pub standard_episode_format: String,
    pub daily_episode_format: String,
    pub anime_episode_format: String,

    // Folder patterns
    pub series_folder_format: String,
    pub season_folder_format: String,
    pub specials_folder_format: String,

    // Movie patterns
    pub movie_folder_format: String,
    pub standard_movie_format: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            validation_level: ValidationLevel::Standard,
            min_size_mb: 50,
            video_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            conflict_policy: ConflictPolicy::TrustQueue,
            unknown_media_policy: UnknownMediaPolicy::Ignore,
            rename_episodes: true,
            replace_illegal_characters: true,
            colon_replacement: ColonReplacement::Smart,
            custom_colon_replacement: String::new(),
            case_transform: CaseTransform::Default,
            multi_episode_style: MultiEpisodeStyle::Extend,
            standard_episode_format:
                "{Series Title} - S{season:00}E{episode:00} - {Episode Title} - {Quality Full}"
                    .to_string(),
            daily_episode_format:
                "{Series Title} - {Air-Date} - {Episode Title} - {Quality Full}".to_string(),
            anime_episode_format:
                "{Series Title} - S{season:00}E{episode:00} - {absolute:000} - {Episode Title} - {Quality Full}"
                    .to_string(),
            series_folder_format: "{Series Title}".to_string(),
            season_folder_format: "Season {season:00}".to_string(),
            specials_folder_format: "Specials".to_string(),
            movie_folder_format: "{Movie Title} ({Year})".to_string(),
            standard_movie_format: "{Movie Title} ({Year}) - {Quality Full}".to_string(),
        }
    }
}

impl ImportSettings {
    /// Minimum size in bytes
    pub fn min_size_bytes(&self) -> u64 {
        self.min_size_mb * 1024 * 1024
    }

    /// True when `ext` (with or without leading dot, any case) is allowed
    pub fn is_video_extension(&self, ext: &str) -> bool {
        let normalized = if ext.starts_with('.') {
            ext.to_lowercase()
        } else {
            format!(".{}", ext.to_lowercase())
        };
        self.video_extensions.contains(&normalized)
    }

    /// Parse the persisted csv column into the extension list. Entries are
    /// lower-cased and prefixed with a dot when missing one.
    pub fn set_extensions_from_csv(&mut self, csv: &str) {
        let parsed: Vec<String> = csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                let lower = s.to_lowercase();
                if lower.starts_with('.') {
                    lower
                } else {
                    format!(".{}", lower)
                }
            })
            .collect();
        if !parsed.is_empty() {
            self.video_extensions = parsed;
        }
    }

    /// Render the extension list back to the csv column
    pub fn extensions_csv(&self) -> String {
        self.video_extensions.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_matching() {
        let settings = ImportSettings::default();
        assert!(settings.is_video_extension("mkv"));
        assert!(settings.is_video_extension(".mkv"));
        assert!(settings.is_video_extension("MKV"));
        assert!(!settings.is_video_extension("nfo"));
    }

    #[test]
    fn test_csv_round_trip() {
        let mut settings = ImportSettings::default();
        settings.set_extensions_from_csv("mkv, .MP4 ,avi");
        assert_eq!(settings.video_extensions, vec![".mkv", ".mp4", ".avi"]);
        assert_eq!(settings.extensions_csv(), ".mkv,.mp4,.avi");
    }

    #[test]
    fn test_empty_csv_keeps_defaults() {
        let mut settings = ImportSettings::default();
        let before = settings.video_extensions.clone();
        settings.set_extensions_from_csv("  ");
        assert_eq!(settings.video_extensions, before);
    }

    #[test]
    fn test_min_size_bytes() {
        let settings = ImportSettings {
            min_size_mb: 2,
            ..Default::default()
        };
        assert_eq!(settings.min_size_bytes(), 2 * 1024 * 1024);
    }
}
