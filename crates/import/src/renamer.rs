//! Rename resolver
//!
//! Deterministically computes destination folder and file names from a
//! [`TokenContext`] and the renaming settings. All outputs are sanitised
//! path components; `resolve_full_path` enforces the Windows-compatible
//! 260-character cap.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use mediarr_core::{ImportError, ImportSettings, Result, SeriesType};

use crate::multi_episode::format_multi_episode;
use crate::pattern::{resolve_pattern, validate_pattern};
use crate::sanitize::{sanitize_filename, SanitizeOptions};
use crate::tokens::{apply_case, TokenContext};

/// Longest full path the resolver will produce
pub const MAX_PATH_LENGTH: usize = 260;

static EPISODE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)S(\d{1,2})E(\d{1,3})").unwrap());

/// Pattern-driven name resolver. Holds a settings snapshot; the pipeline
/// pushes a fresh snapshot per job.
#[derive(Debug, Clone)]
pub struct Renamer {
    settings: ImportSettings,
}

impl Renamer {
    pub fn new(settings: ImportSettings) -> Self {
        Self { settings }
    }

    pub fn update_settings(&mut self, settings: ImportSettings) {
        self.settings = settings;
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    fn sanitize_options(&self) -> SanitizeOptions {
        SanitizeOptions {
            replace: self.settings.replace_illegal_characters,
            colon: self.settings.colon_replacement,
            custom_colon: self.settings.custom_colon_replacement.clone(),
        }
    }

    /// Validate every configured pattern; used when settings are saved.
    pub fn validate_settings(&self) -> Result<()> {
        for pattern in [
            &self.settings.standard_episode_format,
            &self.settings.daily_episode_format,
            &self.settings.anime_episode_format,
            &self.settings.series_folder_format,
            &self.settings.season_folder_format,
            &self.settings.specials_folder_format,
            &self.settings.movie_folder_format,
            &self.settings.standard_movie_format,
        ] {
            validate_pattern(pattern)?;
        }
        Ok(())
    }

    /// Resolve an episode filename: pattern by series type, multi-episode
    /// substitution, sanitation, case transform, extension.
    pub fn resolve_episode_filename(&self, ctx: &TokenContext, extension: &str) -> Result<String> {
        let pattern = match ctx.series_type {
            SeriesType::Standard => &self.settings.standard_episode_format,
            SeriesType::Daily => &self.settings.daily_episode_format,
            SeriesType::Anime => &self.settings.anime_episode_format,
        };

        let mut resolved = resolve_pattern(pattern, ctx)?;
        if ctx.episode_numbers.len() > 1 {
            resolved = self.substitute_multi_episode(&resolved, ctx);
        }

        Ok(self.finish(&resolved, Some(extension)))
    }

    pub fn resolve_movie_filename(&self, ctx: &TokenContext, extension: &str) -> Result<String> {
        let resolved = resolve_pattern(&self.settings.standard_movie_format, ctx)?;
        Ok(self.finish(&resolved, Some(extension)))
    }

    pub fn resolve_series_folder(&self, ctx: &TokenContext) -> Result<String> {
        let resolved = resolve_pattern(&self.settings.series_folder_format, ctx)?;
        Ok(self.finish(&resolved, None))
    }

    /// Season folder; season 0 uses the Specials pattern.
    pub fn resolve_season_folder(&self, ctx: &TokenContext, season_number: i32) -> Result<String> {
        let pattern = if season_number == 0 {
            &self.settings.specials_folder_format
        } else {
            &self.settings.season_folder_format
        };
        let mut season_ctx = ctx.clone();
        season_ctx.season_number = Some(season_number);

        let resolved = resolve_pattern(pattern, &season_ctx)?;
        Ok(self.finish(&resolved, None))
    }

    pub fn resolve_movie_folder(&self, ctx: &TokenContext) -> Result<String> {
        let resolved = resolve_pattern(&self.settings.movie_folder_format, ctx)?;
        Ok(self.finish(&resolved, None))
    }

    /// Replace the first `S##E##` identifier with the configured
    /// multi-episode rendering, keeping the identifier's digit padding.
    fn substitute_multi_episode(&self, resolved: &str, ctx: &TokenContext) -> String {
        let Some(caps) = EPISODE_IDENTIFIER.captures(resolved) else {
            return resolved.to_string();
        };
        let season_pad = caps[1].len();
        let episode_pad = caps[2].len();
        let season = ctx.season_number.unwrap_or_default();

        let replacement = format_multi_episode(
            season,
            &ctx.episode_numbers,
            self.settings.multi_episode_style,
            season_pad,
            episode_pad,
        );

        let full = caps.get(0).unwrap();
        let mut out = String::with_capacity(resolved.len() + replacement.len());
        out.push_str(&resolved[..full.start()]);
        out.push_str(&replacement);
        out.push_str(&resolved[full.end()..]);
        out
    }

    fn finish(&self, resolved: &str, extension: Option<&str>) -> String {
        let sanitized = sanitize_filename(resolved, &self.sanitize_options());
        let cased = apply_case(&sanitized, self.settings.case_transform);
        match extension {
            Some(ext) => {
                let ext = ext.trim_start_matches('.');
                format!("{}.{}", cased, ext)
            }
            None => cased,
        }
    }

    /// Join root, relative folder, and filename; errors when the resulting
    /// path exceeds [`MAX_PATH_LENGTH`].
    pub fn resolve_full_path(
        &self,
        root: &Path,
        relative: &Path,
        filename: &str,
    ) -> Result<PathBuf> {
        let full = root.join(relative).join(filename);
        let length = full.as_os_str().len();
        if length > MAX_PATH_LENGTH {
            return Err(ImportError::PathTooLong {
                path: full.to_string_lossy().into_owned(),
                length,
                max: MAX_PATH_LENGTH,
            });
        }
        Ok(full)
    }
}

impl Default for Renamer {
    fn default() -> Self {
        Self::new(ImportSettings::default())
    }
}
