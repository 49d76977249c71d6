//! Placement engine
//!
//! Materialises a file at its library destination without disturbing the
//! source: hardlink first, symlink on cross-device failure, copy as the
//! last resort.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mediarr_core::{ImportError, Result};

/// How the destination ended up on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    Hardlink,
    Symlink,
    Copy,
}

impl std::fmt::Display for LinkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkMode::Hardlink => write!(f, "hardlink"),
            LinkMode::Symlink => write!(f, "symlink"),
            LinkMode::Copy => write!(f, "copy"),
        }
    }
}

/// Mode for destination directories
const DIR_MODE: u32 = 0o750;

/// Places files into the library; all operations leave the source intact
#[derive(Debug, Clone, Default)]
pub struct PlacementEngine;

impl PlacementEngine {
    pub fn new() -> Self {
        Self
    }

    /// Ensure the destination directory chain exists with restricted group
    /// permissions. Creation is idempotent.
    pub async fn ensure_directory(&self, dir: &Path) -> Result<()> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let mut builder = std::fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::DirBuilderExt;
                builder.mode(DIR_MODE);
            }
            builder
                .create(&dir)
                .map_err(|e| ImportError::io(dir.display().to_string(), e))
        })
        .await
        .map_err(|e| ImportError::ExternalServiceError {
            service: "filesystem".to_string(),
            error: format!("directory task join error: {}", e),
        })?
    }

    /// Place `source` at `destination`, returning the effective link mode.
    pub async fn import_file(&self, source: &Path, destination: &Path) -> Result<LinkMode> {
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(ImportError::FileNotFound {
                path: source.display().to_string(),
            });
        }

        if let Some(parent) = destination.parent() {
            self.ensure_directory(parent).await?;
        }

        debug!(
            "Placing {} -> {}",
            source.display(),
            destination.display()
        );

        match tokio::fs::hard_link(source, destination).await {
            Ok(()) => {
                info!("Hardlinked {}", destination.display());
                return Ok(LinkMode::Hardlink);
            }
            Err(e) => {
                debug!(
                    "Hardlink failed for {} ({}), trying symlink",
                    destination.display(),
                    e
                );
            }
        }

        match symlink(source, destination).await {
            Ok(()) => {
                info!("Symlinked {}", destination.display());
                return Ok(LinkMode::Symlink);
            }
            Err(e) => {
                debug!(
                    "Symlink failed for {} ({}), falling back to copy",
                    destination.display(),
                    e
                );
            }
        }

        tokio::fs::copy(source, destination)
            .await
            .map_err(|e| ImportError::io(destination.display().to_string(), e))?;
        info!("Copied {}", destination.display());
        Ok(LinkMode::Copy)
    }

    /// Delete the physical file an upgrade replaced. Refuses when the
    /// previous path and the new destination are the same file.
    pub async fn delete_upgraded_file(&self, previous: &Path, new: &Path) -> Result<()> {
        if same_file(previous, new).await {
            warn!(
                "Refusing to delete {}: same file as the new destination",
                previous.display()
            );
            return Ok(());
        }
        if !tokio::fs::try_exists(previous).await.unwrap_or(false) {
            return Ok(());
        }
        tokio::fs::remove_file(previous)
            .await
            .map_err(|e| ImportError::io(previous.display().to_string(), e))?;
        info!("Removed upgraded file {}", previous.display());
        Ok(())
    }
}

#[cfg(unix)]
async fn symlink(source: &Path, destination: &Path) -> std::io::Result<()> {
    tokio::fs::symlink(source, destination).await
}

#[cfg(not(unix))]
async fn symlink(_source: &Path, _destination: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlinks unsupported on this platform",
    ))
}

/// Device + inode equality; two directory entries for one underlying file
/// compare equal even when their paths differ.
pub async fn same_file(a: &Path, b: &Path) -> bool {
    let (meta_a, meta_b) = match (
        tokio::fs::metadata(a).await,
        tokio::fs::metadata(b).await,
    ) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return false,
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        meta_a.dev() == meta_b.dev() && meta_a.ino() == meta_b.ino()
    }
    #[cfg(not(unix))]
    {
        let _ = (meta_a, meta_b);
        match (a.canonicalize(), b.canonicalize()) {
            (Ok(ca), Ok(cb)) => ca == cb,
            _ => false,
        }
    }
}

/// Unix stat identity used for the scanner's hardlink snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub device: u64,
    pub inode: u64,
}

/// Stat a path into its identity; `None` when it cannot be stat'ed or the
/// platform exposes no stable identity.
pub async fn file_identity(path: &Path) -> Option<FileIdentity> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        Some(FileIdentity {
            device: metadata.dev(),
            inode: metadata.ino(),
        })
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        None
    }
}
