//! Library matching
//!
//! Resolves an input file to a movie or episode using two independent
//! evidence sources: the download-queue mapping and filename parsing.
//! Disagreements are settled by the configured conflict policy.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use mediarr_core::services::{MovieLibrary, TvLibrary};
use mediarr_core::{
    ConflictPolicy, DownloadKind, DownloadMapping, ImportError, LibraryMatch, MatchSource,
    MediaKind, ParsedRelease, Result,
};

use crate::parse::{normalize_title, parse_release, title_similarity};

/// Candidates scoring at or below this similarity are rejected
const SIMILARITY_THRESHOLD: f32 = 0.7;

/// Bonus applied to movie candidates whose year matches the filename
const YEAR_MATCH_BOOST: f32 = 0.2;

/// Confidence carried by parse-derived matches
const PARSE_CONFIDENCE: f32 = 0.8;

/// Produces [`LibraryMatch`]es from queue and filename evidence
pub struct Matcher {
    movies: Arc<dyn MovieLibrary>,
    tv: Arc<dyn TvLibrary>,
}

impl Matcher {
    pub fn new(movies: Arc<dyn MovieLibrary>, tv: Arc<dyn TvLibrary>) -> Self {
        Self { movies, tv }
    }

    /// Match a file against the library, reconciling both evidence sources
    /// under the given conflict policy.
    pub async fn match_file(
        &self,
        path: &Path,
        mapping: Option<&DownloadMapping>,
        policy: ConflictPolicy,
    ) -> Result<LibraryMatch> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        let queue_match = match mapping {
            Some(mapping) => self.queue_evidence(mapping),
            None => None,
        };
        let parse_match = self.parse_evidence(filename).await?;

        let reconciled = match (queue_match, parse_match) {
            (None, None) => {
                return Err(ImportError::NoMatch {
                    path: path.display().to_string(),
                })
            }
            (Some(queue), None) => queue,
            (None, Some(parse)) => parse,
            (Some(queue), Some(parse)) => self.reconcile(queue, parse, policy)?,
        };

        self.enrich_season_pack(reconciled, filename).await
    }

    /// Evidence from the download mapping: authoritative ids, confidence 1.0
    fn queue_evidence(&self, mapping: &DownloadMapping) -> Option<LibraryMatch> {
        match mapping.kind {
            DownloadKind::Movie => {
                let movie_id = mapping.movie_id?;
                Some(LibraryMatch::movie(movie_id, MatchSource::Queue, 1.0))
            }
            DownloadKind::Episode | DownloadKind::Season | DownloadKind::Series => {
                let series_id = mapping.series_id?;
                let mut m = LibraryMatch::episode(series_id, MatchSource::Queue, 1.0);
                m.season_number = mapping.season_number;
                m.episode_id = mapping.episode_id;
                if let Some(id) = mapping.episode_id {
                    m.episode_ids = vec![id];
                }
                Some(m)
            }
        }
    }

    /// Evidence from the filename: parsed, searched, and ranked locally
    async fn parse_evidence(&self, filename: &str) -> Result<Option<LibraryMatch>> {
        let Some(parsed) = parse_release(filename) else {
            return Ok(None);
        };

        if parsed.is_tv() {
            self.match_series(&parsed).await
        } else {
            self.match_movie(&parsed).await
        }
    }

    async fn match_series(&self, parsed: &ParsedRelease) -> Result<Option<LibraryMatch>> {
        let Some(filter) = first_word(&parsed.title) else {
            return Ok(None);
        };
        let normalized = normalize_title(&parsed.title);

        let candidates = self.tv.list_series(Some(&filter)).await?;
        let best = candidates
            .into_iter()
            .map(|series| {
                let score = title_similarity(&normalized, &normalize_title(&series.title));
                (series, score)
            })
            .filter(|(_, score)| *score > SIMILARITY_THRESHOLD)
            .max_by(|(_, a), (_, b)| a.total_cmp(b));

        let Some((series, score)) = best else {
            return Ok(None);
        };
        debug!(
            "Matched series {} ({:.2}) for {}",
            series.title, score, parsed.original_filename
        );

        let mut library_match = LibraryMatch::episode(series.id, MatchSource::Parse, PARSE_CONFIDENCE);
        library_match.season_number = parsed.season_number;

        let season = parsed.season_number.unwrap_or(1);
        for number in &parsed.episode_numbers {
            match self
                .tv
                .get_episode_by_number(series.id, season, *number)
                .await?
            {
                Some(episode) => library_match.episode_ids.push(episode.id),
                None => warn!(
                    "No episode {}x{:02} registered for series {}",
                    season, number, series.id
                ),
            }
        }
        library_match.episode_id = library_match.episode_ids.first().copied();

        Ok(Some(library_match))
    }

    async fn match_movie(&self, parsed: &ParsedRelease) -> Result<Option<LibraryMatch>> {
        let Some(filter) = first_word(&parsed.title) else {
            return Ok(None);
        };
        let normalized = normalize_title(&parsed.title);

        let candidates = self.movies.list(Some(&filter)).await?;
        let best = candidates
            .into_iter()
            .map(|movie| {
                let mut score = title_similarity(&normalized, &normalize_title(&movie.title));
                if parsed.year.is_some() && parsed.year == movie.year {
                    score += YEAR_MATCH_BOOST;
                }
                (movie, score)
            })
            .filter(|(_, score)| *score > SIMILARITY_THRESHOLD)
            .max_by(|(_, a), (_, b)| a.total_cmp(b));

        let Some((movie, score)) = best else {
            return Ok(None);
        };
        debug!(
            "Matched movie {} ({:.2}) for {}",
            movie.title, score, parsed.original_filename
        );

        Ok(Some(LibraryMatch::movie(
            movie.id,
            MatchSource::Parse,
            PARSE_CONFIDENCE,
        )))
    }

    /// Settle disagreement between queue and parse evidence
    fn reconcile(
        &self,
        queue: LibraryMatch,
        parse: LibraryMatch,
        policy: ConflictPolicy,
    ) -> Result<LibraryMatch> {
        if !compatible(&queue, &parse) {
            warn!(
                "Match conflict: queue {:?}/{:?} vs parse {:?}/{:?}",
                queue.kind,
                queue.media_id(),
                parse.kind,
                parse.media_id()
            );
            return match policy {
                ConflictPolicy::TrustQueue => Ok(queue),
                ConflictPolicy::TrustParse => Ok(parse),
                ConflictPolicy::Fail => Err(ImportError::MatchConflict {
                    message: format!(
                        "queue says {} {:?}, filename says {} {:?}",
                        queue.kind,
                        queue.media_id(),
                        parse.kind,
                        parse.media_id()
                    ),
                }),
            };
        }

        // Compatible: queue wins, but parse may supply the episode detail
        // a season/series mapping lacks.
        let mut merged = queue;
        if merged.kind == MediaKind::Episode && merged.episode_id.is_none() {
            if parse.episode_id.is_some() {
                merged.episode_id = parse.episode_id;
                merged.episode_ids = parse.episode_ids.clone();
                if merged.season_number.is_none() {
                    merged.season_number = parse.season_number;
                }
                merged.is_upgrade = parse.is_upgrade;
                merged.existing_file_path = parse.existing_file_path.clone();
                merged.existing_file_id = parse.existing_file_id;
            }
        }
        Ok(merged)
    }

    /// Season-pack enrichment: a queue match carrying series and season but
    /// no episode gets its episode resolved from the filename.
    async fn enrich_season_pack(
        &self,
        mut library_match: LibraryMatch,
        filename: &str,
    ) -> Result<LibraryMatch> {
        if library_match.kind != MediaKind::Episode
            || library_match.episode_id.is_some()
            || library_match.series_id.is_none()
        {
            return Ok(library_match);
        }

        let Some(parsed) = parse_release(filename).filter(|p| p.is_tv()) else {
            return Ok(library_match);
        };
        let series_id = library_match.series_id.unwrap();
        let season = library_match
            .season_number
            .or(parsed.season_number)
            .unwrap_or(1);

        let episodes = self.tv.list_episodes(series_id, season).await?;
        for number in &parsed.episode_numbers {
            if let Some(episode) = episodes.iter().find(|e| e.episode_number == *number) {
                library_match.episode_ids.push(episode.id);
            }
        }
        library_match.episode_id = library_match.episode_ids.first().copied();
        if library_match.episode_id.is_some() {
            library_match.season_number = Some(season);
        }

        Ok(library_match)
    }
}

fn compatible(queue: &LibraryMatch, parse: &LibraryMatch) -> bool {
    if queue.kind != parse.kind {
        return false;
    }
    match queue.kind {
        MediaKind::Movie => queue.movie_id == parse.movie_id,
        MediaKind::Episode => {
            if queue.series_id != parse.series_id {
                return false;
            }
            match (queue.season_number, parse.season_number) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }
    }
}

fn first_word(title: &str) -> Option<String> {
    title
        .split_whitespace()
        .next()
        .map(|w| w.to_string())
        .filter(|w| !w.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mediarr_core::{Episode, LibraryFile, MediaInfo, Movie, Series};
    use std::path::PathBuf;

    struct StubMovies {
        movies: Vec<Movie>,
    }

    #[async_trait]
    impl MovieLibrary for StubMovies {
        async fn get(&self, id: i64) -> Result<Option<Movie>> {
            Ok(self.movies.iter().find(|m| m.id == id).cloned())
        }

        async fn list(&self, title_filter: Option<&str>) -> Result<Vec<Movie>> {
            let filter = title_filter.map(str::to_lowercase);
            Ok(self
                .movies
                .iter()
                .filter(|m| match filter.as_deref() {
                    Some(f) => m.title.to_lowercase().contains(f),
                    None => true,
                })
                .cloned()
                .collect())
        }

        async fn get_primary_file(&self, _movie_id: i64) -> Result<Option<LibraryFile>> {
            Ok(None)
        }

        async fn get_files(&self, _movie_id: i64) -> Result<Vec<LibraryFile>> {
            Ok(Vec::new())
        }

        async fn get_file_by_id(&self, _file_id: i64) -> Result<Option<LibraryFile>> {
            Ok(None)
        }

        async fn add_file(&self, file: &LibraryFile) -> Result<LibraryFile> {
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

    struct StubTv {
        series: Vec<Series>,
        episodes: Vec<Episode>,
    }

    #[async_trait]
    impl TvLibrary for StubTv {
        async fn get_series(&self, id: i64) -> Result<Option<Series>> {
            Ok(self.series.iter().find(|s| s.id == id).cloned())
        }

        async fn list_series(&self, title_filter: Option<&str>) -> Result<Vec<Series>> {
            let filter = title_filter.map(str::to_lowercase);
            Ok(self
                .series
                .iter()
                .filter(|s| match filter.as_deref() {
                    Some(f) => s.title.to_lowercase().contains(f),
                    None => true,
                })
                .cloned()
                .collect())
        }

        async fn get_episode(&self, id: i64) -> Result<Option<Episode>> {
            Ok(self.episodes.iter().find(|e| e.id == id).cloned())
        }

        async fn list_episodes(&self, series_id: i64, season_number: i32) -> Result<Vec<Episode>> {
            Ok(self
                .episodes
                .iter()
                .filter(|e| e.series_id == series_id && e.season_number == season_number)
                .cloned()
                .collect())
        }

        async fn list_seasons(&self, series_id: i64) -> Result<Vec<i32>> {
            let mut seasons: Vec<i32> = self
                .episodes
                .iter()
                .filter(|e| e.series_id == series_id)
                .map(|e| e.season_number)
                .collect();
            seasons.sort_unstable();
            seasons.dedup();
            Ok(seasons)
        }

        async fn get_episode_by_number(
            &self,
            series_id: i64,
            season_number: i32,
            episode_number: i32,
        ) -> Result<Option<Episode>> {
            Ok(self
                .episodes
                .iter()
                .find(|e| {
                    e.series_id == series_id
                        && e.season_number == season_number
                        && e.episode_number == episode_number
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

    fn matcher() -> Matcher {
        let mut breaking_bad = Series::new(1, "Breaking Bad");
        breaking_bad.year = Some(2008);
        let other = Series::new(7, "Other Show");

        let mut matrix = Movie::new(10, "The Matrix");
        matrix.year = Some(1999);
        let mut matrix_reloaded = Movie::new(11, "The Matrix Reloaded");
        matrix_reloaded.year = Some(2003);

        Matcher::new(
            Arc::new(StubMovies {
                movies: vec![matrix, matrix_reloaded],
            }),
            Arc::new(StubTv {
                series: vec![breaking_bad, other],
                episodes: vec![
                    episode(100, 1, 2, 5),
                    episode(101, 1, 2, 6),
                    episode(200, 7, 1, 1),
                ],
            }),
        )
    }

    fn season_mapping(series_id: i64, season: i32) -> DownloadMapping {
        DownloadMapping {
            id: 1,
            client_id: 1,
            download_id: "dl-1".to_string(),
            kind: DownloadKind::Season,
            movie_id: None,
            series_id: Some(series_id),
            season_number: Some(season),
            episode_id: None,
            target_slot_id: None,
            is_season_pack: true,
            is_complete_series: false,
        }
    }

    #[tokio::test]
    async fn test_parse_only_episode_match() {
        let m = matcher();
        let result = m
            .match_file(
                &PathBuf::from("/dl/Breaking.Bad.S02E05.1080p.WEBDL.x264-GROUP.mkv"),
                None,
                ConflictPolicy::TrustQueue,
            )
            .await
            .unwrap();

        assert_eq!(result.kind, MediaKind::Episode);
        assert_eq!(result.series_id, Some(1));
        assert_eq!(result.season_number, Some(2));
        assert_eq!(result.episode_id, Some(100));
        assert_eq!(result.source, MatchSource::Parse);
        assert!((result.confidence - 0.8).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_parse_only_movie_match_with_year_boost() {
        let m = matcher();
        let result = m
            .match_file(
                &PathBuf::from("/dl/The.Matrix.1999.1080p.BluRay.x264-GROUP.mkv"),
                None,
                ConflictPolicy::TrustQueue,
            )
            .await
            .unwrap();

        assert_eq!(result.kind, MediaKind::Movie);
        assert_eq!(result.movie_id, Some(10));
    }

    #[tokio::test]
    async fn test_no_match() {
        let m = matcher();
        let result = m
            .match_file(
                &PathBuf::from("/dl/Unknown.Show.S01E01.720p.mkv"),
                None,
                ConflictPolicy::TrustQueue,
            )
            .await;
        assert!(matches!(result, Err(ImportError::NoMatch { .. })));
    }

    #[tokio::test]
    async fn test_queue_only_match() {
        let m = matcher();
        let mapping = DownloadMapping {
            kind: DownloadKind::Movie,
            movie_id: Some(10),
            series_id: None,
            season_number: None,
            is_season_pack: false,
            ..season_mapping(0, 0)
        };
        let result = m
            .match_file(
                &PathBuf::from("/dl/randomfile.mkv"),
                Some(&mapping),
                ConflictPolicy::TrustQueue,
            )
            .await
            .unwrap();

        assert_eq!(result.movie_id, Some(10));
        assert_eq!(result.source, MatchSource::Queue);
        assert!((result.confidence - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_conflict_policy_fail() {
        let m = matcher();
        // Queue points at series 7 season 1, filename says Breaking Bad S02
        let result = m
            .match_file(
                &PathBuf::from("/dl/Breaking.Bad.S02E05.1080p.mkv"),
                Some(&season_mapping(7, 1)),
                ConflictPolicy::Fail,
            )
            .await;
        assert!(matches!(result, Err(ImportError::MatchConflict { .. })));
    }

    #[tokio::test]
    async fn test_conflict_policy_trust_queue() {
        let m = matcher();
        let result = m
            .match_file(
                &PathBuf::from("/dl/Breaking.Bad.S02E05.1080p.mkv"),
                Some(&season_mapping(7, 1)),
                ConflictPolicy::TrustQueue,
            )
            .await
            .unwrap();
        assert_eq!(result.series_id, Some(7));
        // Season-pack enrichment resolved the episode from the filename
        // against the queue's series; S02E05 does not exist for series 7,
        // so no episode is attached.
        assert_eq!(result.episode_id, None);
    }

    #[tokio::test]
    async fn test_conflict_policy_trust_parse() {
        let m = matcher();
        let result = m
            .match_file(
                &PathBuf::from("/dl/Breaking.Bad.S02E05.1080p.mkv"),
                Some(&season_mapping(7, 1)),
                ConflictPolicy::TrustParse,
            )
            .await
            .unwrap();
        assert_eq!(result.series_id, Some(1));
        assert_eq!(result.episode_id, Some(100));
    }

    #[tokio::test]
    async fn test_compatible_queue_adopts_parse_episode() {
        let m = matcher();
        let result = m
            .match_file(
                &PathBuf::from("/dl/Breaking.Bad.S02E05.1080p.mkv"),
                Some(&season_mapping(1, 2)),
                ConflictPolicy::Fail,
            )
            .await
            .unwrap();
        // Queue keeps authority but gains the parse-resolved episode
        assert_eq!(result.source, MatchSource::Queue);
        assert_eq!(result.series_id, Some(1));
        assert_eq!(result.episode_id, Some(100));
    }

    #[tokio::test]
    async fn test_season_pack_enrichment_without_parse_match() {
        let m = matcher();
        // Filename parses to an episode but the title matches no series;
        // the queue's season mapping still gets the episode attached.
        let result = m
            .match_file(
                &PathBuf::from("/dl/bb.s02e06.1080p.mkv"),
                Some(&season_mapping(1, 2)),
                ConflictPolicy::Fail,
            )
            .await
            .unwrap();
        assert_eq!(result.series_id, Some(1));
        assert_eq!(result.episode_id, Some(101));
        assert_eq!(result.season_number, Some(2));
    }

    #[tokio::test]
    async fn test_multi_episode_ids() {
        let m = matcher();
        let result = m
            .match_file(
                &PathBuf::from("/dl/Breaking.Bad.S02E05E06.1080p.mkv"),
                None,
                ConflictPolicy::TrustQueue,
            )
            .await
            .unwrap();
        assert_eq!(result.episode_ids, vec![100, 101]);
        assert_eq!(result.episode_id, Some(100));
    }
}
