//! Incoming file validation
//!
//! Three escalating levels: basic existence/size, standard extension and
//! sample filtering, and full media probing.

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use mediarr_core::services::MediaProber;
use mediarr_core::{ImportError, ImportSettings, Result, ValidationLevel};

static SAMPLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)[-._]sample[-._]").unwrap(),
        Regex::new(r"(?i)^sample[-._]").unwrap(),
        Regex::new(r"(?i)[-._]sample$").unwrap(),
        Regex::new(r"(?i)/samples?/").unwrap(),
    ]
});

/// True when a path looks like a sample release
pub fn is_sample_path(path: &Path) -> bool {
    let full = path.to_string_lossy();
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    SAMPLE_PATTERNS
        .iter()
        .any(|re| re.is_match(&filename) || re.is_match(&full))
}

/// Validates candidate files before the pipeline commits to them
pub struct Validator {
    prober: Option<Arc<dyn MediaProber>>,
}

impl Validator {
    pub fn new(prober: Option<Arc<dyn MediaProber>>) -> Self {
        Self { prober }
    }

    /// Validate `path` at the level the settings ask for.
    pub async fn validate(
        &self,
        path: &Path,
        settings: &ImportSettings,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() => m,
            _ => {
                return Err(ImportError::FileNotFound {
                    path: path.display().to_string(),
                })
            }
        };

        if metadata.len() == 0 {
            return Err(ImportError::FileTooSmall {
                path: path.display().to_string(),
                size: 0,
                min: 1,
            });
        }

        if settings.validation_level == ValidationLevel::Basic {
            return Ok(());
        }

        // Standard checks
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !settings.is_video_extension(extension) {
            return Err(ImportError::InvalidExtension {
                path: path.display().to_string(),
            });
        }

        if metadata.len() < settings.min_size_bytes() {
            return Err(ImportError::FileTooSmall {
                path: path.display().to_string(),
                size: metadata.len(),
                min: settings.min_size_bytes(),
            });
        }

        if is_sample_path(path) {
            return Err(ImportError::SampleFile {
                path: path.display().to_string(),
            });
        }

        if settings.validation_level == ValidationLevel::Standard {
            return Ok(());
        }

        // Full: probe for a real video stream
        self.probe_check(path, cancel).await
    }

    async fn probe_check(&self, path: &Path, cancel: &CancellationToken) -> Result<()> {
        let Some(prober) = self.prober.as_ref().filter(|p| p.is_available()) else {
            warn!(
                "Full validation requested but no probe tool available, passing {}",
                path.display()
            );
            return Ok(());
        };

        let info = prober.probe(&path.display().to_string(), cancel).await?;

        if info.video_codec.is_none() {
            return Err(ImportError::ValidationError {
                field: "video_stream".to_string(),
                message: format!("{} has no video stream", path.display()),
            });
        }
        if info.duration_seconds.unwrap_or_default() <= 0.0 {
            return Err(ImportError::ValidationError {
                field: "duration".to_string(),
                message: format!("{} has no playable duration", path.display()),
            });
        }

        debug!("Probe validation passed for {}", path.display());
        Ok(())
    }
}
