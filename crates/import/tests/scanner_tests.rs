//! Scanner dedupe behaviour over an in-memory library

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use mediarr_core::services::*;
use mediarr_core::*;
use mediarr_import::{DownloadScanner, ProcessingSet, ScannerConfig};

struct OneClient {
    dir: PathBuf,
}

#[async_trait]
impl DownloadClient for OneClient {
    async fn list(&self) -> Result<Vec<DownloadItem>> {
        Ok(Vec::new())
    }

    async fn get_download_dir(&self) -> Result<String> {
        Ok(self.dir.display().to_string())
    }

    async fn remove(&self, _download_id: &str) -> Result<()> {
        Ok(())
    }
}

struct OneClientService {
    client: Arc<OneClient>,
}

#[async_trait]
impl DownloadService for OneClientService {
    async fn list_clients(&self) -> Result<Vec<i64>> {
        Ok(vec![1])
    }

    async fn get_client(&self, _client_id: i64) -> Result<Arc<dyn DownloadClient>> {
        Ok(self.client.clone())
    }

    async fn list_mappings(&self) -> Result<Vec<DownloadMapping>> {
        Ok(Vec::new())
    }

    async fn delete_download_mapping(&self, _mapping_id: i64) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct FileOnlyMovies {
    files: Mutex<Vec<LibraryFile>>,
}

#[async_trait]
impl MovieLibrary for FileOnlyMovies {
    async fn get(&self, _id: i64) -> Result<Option<Movie>> {
        Ok(None)
    }

    async fn list(&self, _title_filter: Option<&str>) -> Result<Vec<Movie>> {
        Ok(vec![Movie::new(1, "Placeholder")])
    }

    async fn get_primary_file(&self, _movie_id: i64) -> Result<Option<LibraryFile>> {
        Ok(None)
    }

    async fn get_files(&self, _movie_id: i64) -> Result<Vec<LibraryFile>> {
        Ok(self.files.lock().unwrap().clone())
    }

    async fn get_file_by_id(&self, _file_id: i64) -> Result<Option<LibraryFile>> {
        Ok(None)
    }

    async fn add_file(&self, file: &LibraryFile) -> Result<LibraryFile> {
        self.files.lock().unwrap().push(file.clone());
        Ok(file.clone())
    }

    async fn remove_file(&self, _file_id: i64) -> Result<()> {
        Ok(())
    }

    async fn update_file_media_info(&self, _file_id: i64, _info: &MediaInfo) -> Result<()> {
        Ok(())
    }

    async fn update_file_path(&self, _file_id: i64, _path: &str) -> Result<()> {
        Ok(())
    }
}

struct EmptyTv;

#[async_trait]
impl TvLibrary for EmptyTv {
    async fn get_series(&self, _id: i64) -> Result<Option<Series>> {
        Ok(None)
    }

    async fn list_series(&self, _title_filter: Option<&str>) -> Result<Vec<Series>> {
        Ok(Vec::new())
    }

    async fn get_episode(&self, _id: i64) -> Result<Option<Episode>> {
        Ok(None)
    }

    async fn list_episodes(&self, _series_id: i64, _season: i32) -> Result<Vec<Episode>> {
        Ok(Vec::new())
    }

    async fn list_seasons(&self, _series_id: i64) -> Result<Vec<i32>> {
        Ok(Vec::new())
    }

    async fn get_episode_by_number(
        &self,
        _series_id: i64,
        _season: i32,
        _number: i32,
    ) -> Result<Option<Episode>> {
        Ok(None)
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

    async fn update_episode_file_media_info(&self, _file_id: i64, _info: &MediaInfo) -> Result<()> {
        Ok(())
    }

    async fn update_episode_file_path(&self, _file_id: i64, _path: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct MemDecisions {
    rows: Mutex<HashMap<String, ImportDecision>>,
}

#[async_trait]
impl DecisionStore for MemDecisions {
    async fn get(&self, source_path: &str) -> Result<Option<ImportDecision>> {
        Ok(self.rows.lock().unwrap().get(source_path).cloned())
    }

    async fn upsert(&self, decision: &ImportDecision) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .insert(decision.source_path.clone(), decision.clone());
        Ok(())
    }

    async fn delete(&self, source_path: &str) -> Result<()> {
        self.rows.lock().unwrap().remove(source_path);
        Ok(())
    }

    async fn invalidate_for_profile(&self, _quality_profile_id: i64) -> Result<()> {
        Ok(())
    }
}

struct DefaultSettings;

#[async_trait]
impl SettingsStore for DefaultSettings {
    async fn load(&self) -> Result<ImportSettings> {
        Ok(ImportSettings {
            min_size_mb: 0,
            ..Default::default()
        })
    }
}

struct Fixture {
    temp: TempDir,
    movies: Arc<FileOnlyMovies>,
    decisions: Arc<MemDecisions>,
    scanner: DownloadScanner,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let download_dir = temp.path().join("downloads");
    fs::create_dir_all(download_dir.join("Series")).unwrap();

    let movies = Arc::new(FileOnlyMovies::default());
    let decisions = Arc::new(MemDecisions::default());
    let scanner = DownloadScanner::new(
        Arc::new(OneClientService {
            client: Arc::new(OneClient { dir: download_dir }),
        }),
        movies.clone(),
        Arc::new(EmptyTv),
        decisions.clone(),
        Arc::new(DefaultSettings),
        EventBus::new(),
        ScannerConfig::default(),
    );

    Fixture {
        temp,
        movies,
        decisions,
        scanner,
    }
}

#[tokio::test]
async fn test_scanner_finds_new_video() {
    let fx = fixture();
    let file = fx.temp.path().join("downloads/Series/Show.S01E01.720p.mkv");
    fs::write(&file, vec![0u8; 1024]).unwrap();

    let jobs = fx.scanner.scan(&ProcessingSet::new()).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].source_path, file);
    assert!(!jobs[0].manual);
}

#[tokio::test]
async fn test_scanner_skips_processing_paths() {
    let fx = fixture();
    let file = fx.temp.path().join("downloads/Series/Show.S01E01.720p.mkv");
    fs::write(&file, vec![0u8; 1024]).unwrap();

    let processing = ProcessingSet::new();
    assert!(processing.try_claim(&file));

    let jobs = fx.scanner.scan(&processing).await.unwrap();
    assert!(jobs.is_empty());
}

#[tokio::test]
async fn test_scanner_skips_memoized_rejections() {
    let fx = fixture();
    let file = fx.temp.path().join("downloads/Series/Show.S01E01.720p.mkv");
    fs::write(&file, vec![0u8; 1024]).unwrap();

    fx.decisions
        .upsert(&ImportDecision {
            source_path: file.display().to_string(),
            decision: DecisionCode::NotUpgrade,
            media_kind: MediaKind::Episode,
            media_id: 1,
            candidate_quality_id: None,
            existing_quality_id: None,
            existing_file_id: None,
            quality_profile_id: None,
        })
        .await
        .unwrap();

    let jobs = fx.scanner.scan(&ProcessingSet::new()).await.unwrap();
    assert!(jobs.is_empty());
}

#[tokio::test]
async fn test_scanner_is_idempotent_after_import() {
    let fx = fixture();
    let file = fx.temp.path().join("downloads/Series/Show.S01E01.720p.mkv");
    fs::write(&file, vec![0u8; 1024]).unwrap();

    let processing = ProcessingSet::new();
    let first = fx.scanner.scan(&processing).await.unwrap();
    assert_eq!(first.len(), 1);

    // Simulate the import: a library row now records the original path
    let mut imported = LibraryFile::new(1, "/library/Show/S01E01.mkv", 1024);
    imported.original_path = Some(file.display().to_string());
    fx.movies.add_file(&imported).await.unwrap();

    let second = fx.scanner.scan(&processing).await.unwrap();
    assert!(second.is_empty(), "unchanged library must yield no new jobs");
}

#[tokio::test]
async fn test_scanner_detects_hardlinks_into_library() {
    let fx = fixture();
    let file = fx.temp.path().join("downloads/Series/Show.S01E01.720p.mkv");
    fs::write(&file, vec![0u8; 1024]).unwrap();

    // The library holds a hardlink to the download under a different name
    let library_dir = fx.temp.path().join("library");
    fs::create_dir_all(&library_dir).unwrap();
    let library_copy = library_dir.join("Show - S01E01.mkv");
    fs::hard_link(&file, &library_copy).unwrap();

    let mut row = LibraryFile::new(1, library_copy.display().to_string(), 1024);
    row.original_path = Some("/somewhere/else.mkv".to_string());
    fx.movies.add_file(&row).await.unwrap();

    let jobs = fx.scanner.scan(&ProcessingSet::new()).await.unwrap();
    assert!(jobs.is_empty(), "hardlinked files are already imported");
}
