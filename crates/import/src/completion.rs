//! Download completion detection
//!
//! Decides when a file or folder is finished downloading and safe to
//! import: size and age checks, archive analysis for packed releases, and
//! polling waits with distinguishable timeout/cancel outcomes.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use mediarr_core::{ImportError, ImportSettings, Result};

/// Readiness verdict for a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileReadiness {
    Ready,
    /// Another process appears to hold the file open
    StillOpen,
    /// Modified too recently; may still be growing
    Recent,
    NotFound,
    TooSmall,
    NotVideo,
}

impl FileReadiness {
    /// Pending verdicts may clear on their own; the folder stays incomplete
    /// while any file is pending.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            FileReadiness::StillOpen | FileReadiness::Recent | FileReadiness::TooSmall
        )
    }
}

/// Per-file readiness inside a folder check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCompletion {
    pub path: PathBuf,
    pub readiness: FileReadiness,
}

/// Folder-level completion summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadCompletionResult {
    pub total: usize,
    pub ready: usize,
    pub pending: usize,
    pub files: Vec<FileCompletion>,
}

impl DownloadCompletionResult {
    /// A folder is complete once something is ready and nothing is pending
    pub fn is_complete(&self) -> bool {
        self.ready > 0 && self.pending == 0
    }
}

/// Outcome of an archive scan over a download folder
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveScan {
    pub has_archives: bool,
    pub has_videos: bool,
}

impl ArchiveScan {
    pub fn extraction_needed(&self) -> bool {
        self.has_archives && !self.has_videos
    }

    pub fn extraction_done(&self) -> bool {
        self.has_archives && self.has_videos
    }
}

/// Terminal states of [`CompletionDetector::wait_for_extraction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    Done,
    NoArchives,
}

const ARCHIVE_EXTENSIONS: &[&str] = &["rar", "zip", "7z", "tar", "gz", "bz2", "xz"];

// Multi-part RAR volumes: .r00, .r01, ...
static RAR_PART_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^r\d{2}$").unwrap());

/// Tunables for completion checks
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub min_size_bytes: u64,
    /// Extensions with leading dot, lower case
    pub video_extensions: Vec<String>,
    /// A file must be untouched this long before it counts as ready
    pub min_age: Duration,
    pub completion_poll_interval: Duration,
    pub extraction_poll_interval: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        let settings = ImportSettings::default();
        Self {
            min_size_bytes: settings.min_size_bytes(),
            video_extensions: settings.video_extensions,
            min_age: Duration::from_secs(60),
            completion_poll_interval: Duration::from_secs(5),
            extraction_poll_interval: Duration::from_secs(10),
        }
    }
}

impl CompletionConfig {
    pub fn from_settings(settings: &ImportSettings) -> Self {
        Self {
            min_size_bytes: settings.min_size_bytes(),
            video_extensions: settings.video_extensions.clone(),
            ..Default::default()
        }
    }
}

/// Detects when downloads are finished and importable
pub struct CompletionDetector {
    config: CompletionConfig,
}

impl CompletionDetector {
    pub fn new(config: CompletionConfig) -> Self {
        Self { config }
    }

    /// Readiness of one file
    pub async fn check_file(&self, path: &Path) -> FileReadiness {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() => m,
            _ => return FileReadiness::NotFound,
        };

        if !self.is_video(path) {
            return FileReadiness::NotVideo;
        }

        if metadata.len() < self.config.min_size_bytes {
            return FileReadiness::TooSmall;
        }

        if let Ok(modified) = metadata.modified() {
            let age = SystemTime::now()
                .duration_since(modified)
                .unwrap_or_default();
            if age < self.config.min_age {
                return FileReadiness::Recent;
            }
        }

        if is_file_still_open(path) {
            return FileReadiness::StillOpen;
        }

        FileReadiness::Ready
    }

    /// Readiness of every video candidate under a folder
    pub async fn check_folder(&self, folder: &Path) -> Result<DownloadCompletionResult> {
        let mut result = DownloadCompletionResult::default();

        for path in walk_files(folder).await? {
            let readiness = self.check_file(&path).await;
            if readiness == FileReadiness::NotVideo {
                continue;
            }
            result.total += 1;
            if readiness == FileReadiness::Ready {
                result.ready += 1;
            } else if readiness.is_pending() {
                result.pending += 1;
            }
            result.files.push(FileCompletion { path, readiness });
        }

        Ok(result)
    }

    /// Classify a folder's files into archives and videos
    pub async fn analyze_archives(&self, folder: &Path) -> Result<ArchiveScan> {
        let mut scan = ArchiveScan::default();

        for path in walk_files(folder).await? {
            if let Some(ext) = extension_of(&path) {
                if ARCHIVE_EXTENSIONS.contains(&ext.as_str())
                    || RAR_PART_EXTENSION.is_match(&ext)
                {
                    scan.has_archives = true;
                } else if self.config.video_extensions.contains(&format!(".{}", ext)) {
                    scan.has_videos = true;
                }
            }
        }

        Ok(scan)
    }

    /// Poll until the path (file or folder) is complete, the deadline
    /// passes, or the token is cancelled.
    pub async fn wait_for_completion(
        &self,
        path: &Path,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<DownloadCompletionResult> {
        let started = tokio::time::Instant::now();

        loop {
            let result = if path.is_dir() {
                self.check_folder(path).await?
            } else {
                let readiness = self.check_file(path).await;
                let mut single = DownloadCompletionResult {
                    total: 1,
                    ready: 0,
                    pending: 0,
                    files: vec![FileCompletion {
                        path: path.to_path_buf(),
                        readiness,
                    }],
                };
                if readiness == FileReadiness::Ready {
                    single.ready = 1;
                } else if readiness.is_pending() {
                    single.pending = 1;
                }
                single
            };

            if result.is_complete() {
                return Ok(result);
            }

            if started.elapsed() >= deadline {
                warn!("Timed out waiting for completion of {}", path.display());
                return Err(ImportError::Timeout {
                    operation: format!("completion of {}", path.display()),
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.completion_poll_interval) => {}
                _ = cancel.cancelled() => {
                    return Err(ImportError::Cancelled {
                        operation: format!("completion of {}", path.display()),
                    });
                }
            }
        }
    }

    /// Poll until an archive-bearing folder has been extracted (or turns
    /// out to hold no archives at all).
    pub async fn wait_for_extraction(
        &self,
        folder: &Path,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<ExtractionStatus> {
        let started = tokio::time::Instant::now();

        loop {
            let scan = self.analyze_archives(folder).await?;
            if !scan.has_archives {
                return Ok(ExtractionStatus::NoArchives);
            }
            if scan.extraction_done() {
                return Ok(ExtractionStatus::Done);
            }

            debug!("Waiting for extraction in {}", folder.display());

            if started.elapsed() >= deadline {
                return Err(ImportError::Timeout {
                    operation: format!("extraction of {}", folder.display()),
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.extraction_poll_interval) => {}
                _ = cancel.cancelled() => {
                    return Err(ImportError::Cancelled {
                        operation: format!("extraction of {}", folder.display()),
                    });
                }
            }
        }
    }

    fn is_video(&self, path: &Path) -> bool {
        extension_of(path)
            .map(|ext| self.config.video_extensions.contains(&format!(".{}", ext)))
            .unwrap_or(false)
    }
}

impl Default for CompletionDetector {
    fn default() -> Self {
        Self::new(CompletionConfig::default())
    }
}

/// Best-effort probe for files another process still has open. Platform
/// support is spotty; the conservative answer is "not open" so a slow
/// writer is caught by the age check instead.
pub fn is_file_still_open(_path: &Path) -> bool {
    false
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Collect all files under `root`, recursively
async fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read directory {}: {}", dir.display(), e);
                continue;
            }
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ImportError::io(dir.display().to_string(), e))?
        {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }

    Ok(files)
}
