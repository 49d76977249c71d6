//! Download directory scanner
//!
//! Periodically walks every download client's directory for video files
//! worth importing, deduplicating against in-flight work, memoised
//! rejections, already-imported paths, and hardlinks into the library.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use mediarr_core::services::{
    DecisionStore, DownloadService, MovieLibrary, SettingsStore, TvLibrary,
};
use mediarr_core::{
    DownloadMapping, EventBus, ImportSettings, Result, SystemEvent,
};

use crate::coordinator::ProcessingSet;
use crate::job::ImportJob;
use crate::placement::{file_identity, FileIdentity};
use crate::season_pack;

/// Subdirectories visited under each client's download dir; everything else
/// belongs to foreign tooling and is left alone.
pub const DEFAULT_SUBDIRECTORIES: &[&str] = &["Movies", "Series", "."];

/// Directory names that only ever hold sample clips
const SKIPPED_DIRECTORIES: &[&str] = &["sample", "samples"];

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub subdirectories: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            subdirectories: DEFAULT_SUBDIRECTORIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// One scan cycle's view of the library, stat'ed exactly once to bound
/// syscalls regardless of how many candidates the downloads hold.
#[derive(Debug, Default)]
struct LibrarySnapshot {
    paths: HashSet<String>,
    original_paths: HashSet<String>,
    identities: HashSet<FileIdentity>,
}

impl LibrarySnapshot {
    fn insert(&mut self, path: String, original_path: Option<String>, identity: Option<FileIdentity>) {
        self.paths.insert(path);
        if let Some(original) = original_path {
            self.original_paths.insert(original);
        }
        if let Some(identity) = identity {
            self.identities.insert(identity);
        }
    }
}

/// Feeds the coordinator with import jobs discovered on disk
pub struct DownloadScanner {
    downloads: Arc<dyn DownloadService>,
    movies: Arc<dyn MovieLibrary>,
    tv: Arc<dyn TvLibrary>,
    decisions: Arc<dyn DecisionStore>,
    settings: Arc<dyn SettingsStore>,
    events: EventBus,
    config: ScannerConfig,
}

impl DownloadScanner {
    pub fn new(
        downloads: Arc<dyn DownloadService>,
        movies: Arc<dyn MovieLibrary>,
        tv: Arc<dyn TvLibrary>,
        decisions: Arc<dyn DecisionStore>,
        settings: Arc<dyn SettingsStore>,
        events: EventBus,
        config: ScannerConfig,
    ) -> Self {
        Self {
            downloads,
            movies,
            tv,
            decisions,
            settings,
            events,
            config,
        }
    }

    /// Run one scan cycle over every client, returning jobs for new files.
    pub async fn scan(&self, processing: &ProcessingSet) -> Result<Vec<ImportJob>> {
        let settings = self.settings.load().await?;
        let snapshot = self.snapshot_library().await;
        let mappings = self.downloads.list_mappings().await.unwrap_or_else(|e| {
            warn!("Could not load download mappings: {}", e);
            Vec::new()
        });

        let mut jobs = Vec::new();
        let client_ids = self.downloads.list_clients().await?;

        for client_id in client_ids {
            let client = match self.downloads.get_client(client_id).await {
                Ok(client) => client,
                Err(e) => {
                    warn!("Download client {} unavailable: {}", client_id, e);
                    continue;
                }
            };
            let base = match client.get_download_dir().await {
                Ok(dir) => PathBuf::from(dir),
                Err(e) => {
                    warn!("No download dir for client {}: {}", client_id, e);
                    continue;
                }
            };

            // Map each completed download item to its mapping so jobs carry
            // queue evidence.
            let item_mappings = self.completed_items(client_id, &client, &mappings).await;

            let mut seen = HashSet::new();
            for sub in &self.config.subdirectories {
                // "." covers loose files at the top of the download dir;
                // recursing there would steal from foreign tooling.
                let (dir, recursive) = if sub == "." {
                    (base.clone(), false)
                } else {
                    (base.join(sub), true)
                };
                if !dir.is_dir() {
                    continue;
                }

                for path in walk_videos(&dir, &settings, recursive).await {
                    if !seen.insert(path.clone()) {
                        continue;
                    }
                    if let Some(job) = self
                        .consider(path, processing, &snapshot, &item_mappings)
                        .await
                    {
                        jobs.push(job);
                    }
                }
            }
        }

        if !jobs.is_empty() {
            info!("Scan cycle produced {} import jobs", jobs.len());
        }
        Ok(jobs)
    }

    /// Filter one candidate path through the dedupe ladder.
    async fn consider(
        &self,
        path: PathBuf,
        processing: &ProcessingSet,
        snapshot: &LibrarySnapshot,
        item_mappings: &[(PathBuf, DownloadMapping)],
    ) -> Option<ImportJob> {
        let key = path.display().to_string();

        if processing.contains(&path) {
            return None;
        }

        match self.decisions.get(&key).await {
            Ok(Some(_)) => {
                debug!("Skipping {} (memoized rejection)", key);
                return None;
            }
            Ok(None) => {}
            Err(e) => warn!("Decision lookup failed for {}: {}", key, e),
        }

        if snapshot.original_paths.contains(&key) || snapshot.paths.contains(&key) {
            debug!("Skipping {} (already imported)", key);
            return None;
        }

        if let Some(identity) = file_identity(&path).await {
            if snapshot.identities.contains(&identity) {
                debug!("Skipping {} (hardlink into library)", key);
                return None;
            }
        }

        let mut job = ImportJob::new(path.clone());
        if let Some((_, mapping)) = item_mappings
            .iter()
            .filter(|(item_path, _)| path.starts_with(item_path))
            .max_by_key(|(item_path, _)| item_path.as_os_str().len())
        {
            job = job.with_mapping(mapping.clone());
        }
        Some(job)
    }

    /// Pair a client's completed items with their download mappings and
    /// announce each completed download once.
    async fn completed_items(
        &self,
        client_id: i64,
        client: &Arc<dyn mediarr_core::services::DownloadClient>,
        mappings: &[DownloadMapping],
    ) -> Vec<(PathBuf, DownloadMapping)> {
        let items = match client.list().await {
            Ok(items) => items,
            Err(e) => {
                warn!("Listing client {} failed: {}", client_id, e);
                return Vec::new();
            }
        };

        let by_download_id: HashMap<&str, &DownloadMapping> = mappings
            .iter()
            .filter(|m| m.client_id == client_id)
            .map(|m| (m.download_id.as_str(), m))
            .collect();

        let mut pairs = Vec::new();
        for item in items {
            if !item.is_complete {
                continue;
            }
            let Some(mapping) = by_download_id.get(item.download_id.as_str()) else {
                continue;
            };

            self.events.publish(SystemEvent::DownloadCompleted {
                client_id,
                download_id: item.download_id.clone(),
                download_path: item.path.clone(),
                media_type: mapping.kind.media_kind(),
                movie_id: mapping.movie_id,
                series_id: mapping.series_id,
                episode_id: mapping.episode_id,
                is_season_pack: mapping.is_season_pack
                    || season_pack::is_season_pack(&[], Some(*mapping)),
            });

            pairs.push((PathBuf::from(item.path), (*mapping).clone()));
        }
        pairs
    }

    /// Load every known library file exactly once per cycle.
    async fn snapshot_library(&self) -> LibrarySnapshot {
        let mut snapshot = LibrarySnapshot::default();

        match self.movies.list(None).await {
            Ok(movies) => {
                for movie in movies {
                    match self.movies.get_files(movie.id).await {
                        Ok(files) => {
                            for file in files {
                                let identity = file_identity(Path::new(&file.path)).await;
                                snapshot.insert(file.path, file.original_path, identity);
                            }
                        }
                        Err(e) => warn!("Could not list files for movie {}: {}", movie.id, e),
                    }
                }
            }
            Err(e) => warn!("Could not list movies for snapshot: {}", e),
        }

        match self.tv.list_series(None).await {
            Ok(series_list) => {
                for series in series_list {
                    let seasons = self.tv.list_seasons(series.id).await.unwrap_or_default();
                    for season in seasons {
                        let episodes = self
                            .tv
                            .list_episodes(series.id, season)
                            .await
                            .unwrap_or_default();
                        for episode in episodes {
                            if let Ok(Some(file)) = self.tv.get_episode_file(episode.id).await {
                                let identity = file_identity(Path::new(&file.path)).await;
                                snapshot.insert(file.path, file.original_path, identity);
                            }
                        }
                    }
                }
            }
            Err(e) => warn!("Could not list series for snapshot: {}", e),
        }

        snapshot
    }
}

/// Collect allowed video files under `root`, skipping sample directories.
async fn walk_videos(root: &Path, settings: &ImportSettings, recursive: bool) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read {}: {}", dir.display(), e);
                continue;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_dir() {
                if !recursive {
                    continue;
                }
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_lowercase();
                if SKIPPED_DIRECTORIES.contains(&name.as_str()) {
                    continue;
                }
                stack.push(path);
            } else if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if settings.is_video_extension(ext) {
                    found.push(path);
                }
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_walk_videos_filters_and_skips_samples() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("show.mkv"), b"x").unwrap();
        fs::write(temp.path().join("notes.nfo"), b"x").unwrap();
        fs::create_dir(temp.path().join("Sample")).unwrap();
        fs::write(temp.path().join("Sample/clip.mkv"), b"x").unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("nested/other.mp4"), b"x").unwrap();

        let settings = ImportSettings::default();
        let mut found = walk_videos(temp.path(), &settings, true).await;
        found.sort();

        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|p| p.ends_with("show.mkv")));
        assert!(found.iter().any(|p| p.ends_with("nested/other.mp4")));
    }

    #[tokio::test]
    async fn test_walk_videos_non_recursive() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("loose.mkv"), b"x").unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("nested/other.mkv"), b"x").unwrap();

        let settings = ImportSettings::default();
        let found = walk_videos(temp.path(), &settings, false).await;
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("loose.mkv"));
    }

    #[test]
    fn test_default_subdirectories() {
        let config = ScannerConfig::default();
        assert_eq!(config.subdirectories, vec!["Movies", "Series", "."]);
    }
}
