//! Season-pack decomposition
//!
//! Splits a multi-episode download folder into per-file units that can be
//! matched, queued, and imported independently, so one slow episode never
//! holds the rest of the pack hostage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use mediarr_core::services::{QueueMediaStore, TvLibrary};
use mediarr_core::{DownloadMapping, FileStatus, ParsedRelease, QueueMedia, Result};

use crate::completion::{CompletionDetector, FileReadiness};
use crate::parse::parse_release;

/// One video file inside a suspected season pack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonPackFile {
    pub path: PathBuf,
    pub size: i64,
    pub parsed: ParsedRelease,
    pub episode_id: Option<i64>,
    pub series_id: Option<i64>,
    pub season: i32,
    pub episode: i32,
    /// Last episode number for multi-episode files
    pub end_episode: i32,
    pub is_ready: bool,
    pub is_matched: bool,
}

/// Folder-level decomposition summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeasonPackAnalysis {
    pub total: usize,
    pub ready: usize,
    pub matched: usize,
    pub season: i32,
    pub files: Vec<SeasonPackFile>,
}

/// Decomposes download folders into per-episode import units
pub struct SeasonPackDecomposer {
    tv: Arc<dyn TvLibrary>,
    detector: CompletionDetector,
}

impl SeasonPackDecomposer {
    pub fn new(tv: Arc<dyn TvLibrary>, detector: CompletionDetector) -> Self {
        Self { tv, detector }
    }

    /// Walk a folder's video files: parse each, run the completion check,
    /// and resolve episodes when a series id is known.
    pub async fn analyze(
        &self,
        folder: &Path,
        series_id: Option<i64>,
    ) -> Result<SeasonPackAnalysis> {
        let mut analysis = SeasonPackAnalysis::default();

        let completion = self.detector.check_folder(folder).await?;
        for file in completion.files {
            let filename = file
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let Some(parsed) = parse_release(filename).filter(|p| p.is_tv()) else {
                debug!("Skipping undecodable pack file {}", file.path.display());
                continue;
            };

            let season = parsed.season_number.unwrap_or(1);
            let episode = parsed.episode_numbers.first().copied().unwrap_or_default();
            let end_episode = parsed.episode_numbers.last().copied().unwrap_or(episode);

            let episode_id = match series_id {
                Some(series) => self
                    .tv
                    .get_episode_by_number(series, season, episode)
                    .await?
                    .map(|e| e.id),
                None => None,
            };

            let size = tokio::fs::metadata(&file.path)
                .await
                .map(|m| m.len() as i64)
                .unwrap_or_default();

            let is_ready = file.readiness == FileReadiness::Ready;
            let is_matched = episode_id.is_some();

            analysis.total += 1;
            if is_ready {
                analysis.ready += 1;
            }
            if is_matched {
                analysis.matched += 1;
            }
            if analysis.season == 0 {
                analysis.season = season;
            }

            analysis.files.push(SeasonPackFile {
                path: file.path,
                size,
                parsed,
                episode_id,
                series_id,
                season,
                episode,
                end_episode,
                is_ready,
                is_matched,
            });
        }

        Ok(analysis)
    }

    /// Create per-file queue rows so each episode imports on its own
    /// schedule: ready files start `ready`, the rest `pending`.
    pub async fn write_queue_media(
        &self,
        store: &Arc<dyn QueueMediaStore>,
        mapping: &DownloadMapping,
        files: &[SeasonPackFile],
    ) -> Result<Vec<QueueMedia>> {
        let mut rows = Vec::with_capacity(files.len());
        for file in files {
            let row = QueueMedia {
                id: 0,
                mapping_id: mapping.id,
                movie_id: None,
                episode_id: file.episode_id,
                file_path: file.path.display().to_string(),
                file_status: if file.is_ready {
                    FileStatus::Ready
                } else {
                    FileStatus::Pending
                },
                error_message: None,
                import_attempts: 0,
            };
            rows.push(store.create(&row).await?);
        }
        Ok(rows)
    }
}

/// Heuristic: a download is a season pack when two or more of its video
/// files decode episode numbers, or its mapping targets a whole season
/// (series + season, no episode).
pub fn is_season_pack(files: &[SeasonPackFile], mapping: Option<&DownloadMapping>) -> bool {
    let decoded = files
        .iter()
        .filter(|f| !f.parsed.episode_numbers.is_empty())
        .count();
    if decoded >= 2 {
        return true;
    }
    mapping
        .map(|m| m.series_id.is_some() && m.season_number.is_some() && m.episode_id.is_none())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionConfig;
    use async_trait::async_trait;
    use mediarr_core::{DownloadKind, Episode, LibraryFile, MediaInfo, Series};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    struct StubTv {
        episodes: Vec<Episode>,
    }

    #[async_trait]
    impl TvLibrary for StubTv {
        async fn get_series(&self, _id: i64) -> Result<Option<Series>> {
            Ok(None)
        }

        async fn list_series(&self, _filter: Option<&str>) -> Result<Vec<Series>> {
            Ok(Vec::new())
        }

        async fn get_episode(&self, id: i64) -> Result<Option<Episode>> {
            Ok(self.episodes.iter().find(|e| e.id == id).cloned())
        }

        async fn list_episodes(&self, series_id: i64, season: i32) -> Result<Vec<Episode>> {
            Ok(self
                .episodes
                .iter()
                .filter(|e| e.series_id == series_id && e.season_number == season)
                .cloned()
                .collect())
        }

        async fn list_seasons(&self, _series_id: i64) -> Result<Vec<i32>> {
            Ok(Vec::new())
        }

        async fn get_episode_by_number(
            &self,
            series_id: i64,
            season: i32,
            number: i32,
        ) -> Result<Option<Episode>> {
            Ok(self
                .episodes
                .iter()
                .find(|e| {
                    e.series_id == series_id
                        && e.season_number == season
                        && e.episode_number == number
                })
                .cloned())
        }

        async fn add_episode_file(&self, file: &LibraryFile) -> Result<LibraryFile> {
            Ok(file.clone())
        }

        async fn remove_episode_file(&self, _file_id: i64) -> Result<()> {
            Ok(())
        }

        async fn get_episode_file(&self, _episode_id: i64) -> Result<Option<LibraryFile>> {
            Ok(None)
        }

        async fn get_episode_file_by_id(&self, _file_id: i64) -> Result<Option<LibraryFile>> {
            Ok(None)
        }

        async fn update_episode_file_media_info(
            &self,
            _file_id: i64,
            _info: &MediaInfo,
        ) -> Result<()> {
            Ok(())
        }

        async fn update_episode_file_path(&self, _file_id: i64, _path: &str) -> Result<()> {
            Ok(())
        }
    }

    fn episode(id: i64, series_id: i64, season: i32, number: i32) -> Episode {
        Episode {
            id,
            series_id,
            season_number: season,
            episode_number: number,
            absolute_number: None,
            title: None,
            air_date: None,
        }
    }

    fn decomposer(min_age: Duration) -> SeasonPackDecomposer {
        SeasonPackDecomposer::new(
            Arc::new(StubTv {
                episodes: vec![episode(1, 42, 2, 1), episode(2, 42, 2, 2)],
            }),
            CompletionDetector::new(CompletionConfig {
                min_size_bytes: 16,
                min_age,
                ..Default::default()
            }),
        )
    }

    #[tokio::test]
    async fn test_analyze_mixed_readiness() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Show.S02E01.mkv"), vec![0u8; 64]).unwrap();
        fs::write(temp.path().join("Show.S02E02.mkv"), vec![0u8; 8]).unwrap();

        // E02 is below the size floor, so it stays pending
        let analysis = decomposer(Duration::ZERO)
            .analyze(temp.path(), Some(42))
            .await
            .unwrap();

        assert_eq!(analysis.total, 2);
        assert_eq!(analysis.ready, 1);
        assert_eq!(analysis.matched, 2);
        assert_eq!(analysis.season, 2);

        let e1 = analysis
            .files
            .iter()
            .find(|f| f.episode == 1)
            .expect("episode 1 present");
        assert!(e1.is_ready && e1.is_matched);
        assert_eq!(e1.episode_id, Some(1));

        let e2 = analysis.files.iter().find(|f| f.episode == 2).unwrap();
        assert!(!e2.is_ready && e2.is_matched);
    }

    #[tokio::test]
    async fn test_analyze_without_series() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Show.S03E07.mkv"), vec![0u8; 64]).unwrap();

        let analysis = decomposer(Duration::ZERO)
            .analyze(temp.path(), None)
            .await
            .unwrap();
        assert_eq!(analysis.total, 1);
        assert_eq!(analysis.matched, 0);
        assert!(!analysis.files[0].is_matched);
    }

    #[tokio::test]
    async fn test_multi_episode_end_number() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Show.S02E01E02.mkv"), vec![0u8; 64]).unwrap();

        let analysis = decomposer(Duration::ZERO)
            .analyze(temp.path(), Some(42))
            .await
            .unwrap();
        assert_eq!(analysis.files[0].episode, 1);
        assert_eq!(analysis.files[0].end_episode, 2);
    }

    #[derive(Default)]
    struct MemQueueMedia {
        rows: std::sync::Mutex<Vec<QueueMedia>>,
    }

    #[async_trait]
    impl QueueMediaStore for MemQueueMedia {
        async fn create(&self, media: &QueueMedia) -> Result<QueueMedia> {
            let mut rows = self.rows.lock().unwrap();
            let mut stored = media.clone();
            stored.id = rows.len() as i64 + 1;
            rows.push(stored.clone());
            Ok(stored)
        }

        async fn get_by_path(&self, file_path: &str) -> Result<Option<QueueMedia>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.file_path == file_path)
                .cloned())
        }

        async fn list_for_mapping(&self, mapping_id: i64) -> Result<Vec<QueueMedia>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.mapping_id == mapping_id)
                .cloned()
                .collect())
        }

        async fn update_status(
            &self,
            id: i64,
            status: FileStatus,
            error_message: Option<&str>,
        ) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
                row.file_status = status;
                row.error_message = error_message.map(str::to_string);
            }
            Ok(())
        }

        async fn increment_attempts(&self, _id: i64) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_write_queue_media_rows() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Show.S02E01.mkv"), vec![0u8; 64]).unwrap();
        fs::write(temp.path().join("Show.S02E02.mkv"), vec![0u8; 8]).unwrap();

        let decomposer = decomposer(Duration::ZERO);
        let analysis = decomposer.analyze(temp.path(), Some(42)).await.unwrap();

        let mapping = DownloadMapping {
            id: 3,
            client_id: 1,
            download_id: "d".to_string(),
            kind: DownloadKind::Season,
            movie_id: None,
            series_id: Some(42),
            season_number: Some(2),
            episode_id: None,
            target_slot_id: None,
            is_season_pack: true,
            is_complete_series: false,
        };
        let store: Arc<dyn QueueMediaStore> = Arc::new(MemQueueMedia::default());
        let rows = decomposer
            .write_queue_media(&store, &mapping, &analysis.files)
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        let ready = rows.iter().find(|r| r.file_path.ends_with("E01.mkv")).unwrap();
        assert_eq!(ready.file_status, FileStatus::Ready);
        let pending = rows.iter().find(|r| r.file_path.ends_with("E02.mkv")).unwrap();
        assert_eq!(pending.file_status, FileStatus::Pending);
        assert!(rows.iter().all(|r| r.mapping_id == 3));
    }

    #[test]
    fn test_pack_heuristic() {
        let file = |numbers: Vec<i32>| SeasonPackFile {
            path: PathBuf::from("/dl/x.mkv"),
            size: 0,
            parsed: ParsedRelease {
                episode_numbers: numbers,
                ..Default::default()
            },
            episode_id: None,
            series_id: None,
            season: 1,
            episode: 1,
            end_episode: 1,
            is_ready: false,
            is_matched: false,
        };

        assert!(is_season_pack(&[file(vec![1]), file(vec![2])], None));
        assert!(!is_season_pack(&[file(vec![1])], None));

        let mapping = DownloadMapping {
            id: 1,
            client_id: 1,
            download_id: "d".to_string(),
            kind: DownloadKind::Season,
            movie_id: None,
            series_id: Some(42),
            season_number: Some(2),
            episode_id: None,
            target_slot_id: None,
            is_season_pack: false,
            is_complete_series: false,
        };
        assert!(is_season_pack(&[file(vec![1])], Some(&mapping)));
    }
}
