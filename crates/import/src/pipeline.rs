//! Import pipeline executor
//!
//! Runs one job end to end: validate, match, gate, resolve the
//! destination, place the file, update the library, and log history.
//! Failures after placement are warnings; the import stands once the file
//! is on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use mediarr_core::services::{
    DecisionStore, DownloadService, HealthSink, HistoryEntry, HistorySink, MediaProber,
    MovieLibrary, QualityProfiles, QueueMediaStore, RootFolders, SettingsStore, SlotService,
    TvLibrary,
};
use mediarr_core::{
    DecisionCode, Episode, EventBus, ImportDecision, ImportError, LibraryFile, LibraryMatch,
    MatchSource, MediaInfo, MediaKind, Movie, ParsedRelease, QualityProfile, Result, Series,
    UnknownMediaPolicy,
};

use crate::job::{ImportJob, ImportResult};
use crate::matcher::Matcher;
use crate::parse::parse_release;
use crate::placement::{same_file, PlacementEngine};
use crate::renamer::Renamer;
use crate::tokens::TokenContext;
use crate::validator::Validator;

/// Every collaborator the executor consumes
pub struct PipelineServices {
    pub movies: Arc<dyn MovieLibrary>,
    pub tv: Arc<dyn TvLibrary>,
    pub root_folders: Arc<dyn RootFolders>,
    pub quality: Arc<dyn QualityProfiles>,
    pub slots: Arc<dyn SlotService>,
    pub downloads: Arc<dyn DownloadService>,
    pub prober: Arc<dyn MediaProber>,
    pub history: Arc<dyn HistorySink>,
    pub health: Arc<dyn HealthSink>,
    pub settings: Arc<dyn SettingsStore>,
    pub decisions: Arc<dyn DecisionStore>,
    pub queue_media: Arc<dyn QueueMediaStore>,
    pub events: EventBus,
}

/// Library rows backing a match
struct MediaContext {
    movie: Option<Movie>,
    series: Option<Series>,
    episodes: Vec<Episode>,
    quality_profile_id: Option<i64>,
}

/// One-job import executor
pub struct ImportPipeline {
    services: Arc<PipelineServices>,
    placement: PlacementEngine,
}

impl ImportPipeline {
    pub fn new(services: Arc<PipelineServices>) -> Self {
        Self {
            services,
            placement: PlacementEngine::new(),
        }
    }

    pub fn services(&self) -> &Arc<PipelineServices> {
        &self.services
    }

    /// Run the full phase sequence for one job.
    #[instrument(skip_all, fields(source = %job.source_path.display(), manual = job.manual))]
    pub async fn execute(&self, job: &ImportJob, cancel: &CancellationToken) -> Result<ImportResult> {
        let svcs = &self.services;
        let source_display = job.source_path.display().to_string();

        // Phase 1: settings snapshot
        let settings = svcs.settings.load().await?;
        let renamer = Renamer::new(settings.clone());

        // Phase 2: validation
        let validator = Validator::new(Some(svcs.prober.clone()));
        validator.validate(&job.source_path, &settings, cancel).await?;

        // Phase 3: match resolution
        let mut library_match = match &job.confirmed_match {
            Some(confirmed) => {
                let mut m = confirmed.clone();
                m.source = MatchSource::Manual;
                m.confidence = 1.0;
                m
            }
            None => {
                let matcher = Matcher::new(svcs.movies.clone(), svcs.tv.clone());
                match matcher
                    .match_file(&job.source_path, job.mapping.as_ref(), settings.conflict_policy)
                    .await
                {
                    Ok(m) => m,
                    Err(err @ ImportError::NoMatch { .. }) => {
                        if settings.unknown_media_policy == UnknownMediaPolicy::AutoAdd {
                            // Auto-add needs a metadata provider; until then
                            // the path is logged and skipped like ignore.
                            warn!("No match for {} and auto-add is not wired up", source_display);
                        }
                        return Err(err);
                    }
                    Err(other) => return Err(other),
                }
            }
        };

        let media = self.load_media(&library_match).await?;
        library_match.quality_profile_id = media.quality_profile_id;

        let filename = job
            .source_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let parsed = parse_release(&filename).unwrap_or_else(|| ParsedRelease {
            original_filename: filename.clone(),
            title: filename.trim_end_matches(".mkv").to_string(),
            version: 1,
            ..Default::default()
        });

        let profile = match media.quality_profile_id {
            Some(id) => svcs.quality.get(id).await.unwrap_or_else(|e| {
                warn!("Quality profile {} unavailable: {}", id, e);
                None
            }),
            None => None,
        };
        if let Some(profile) = &profile {
            library_match.candidate_quality_id = svcs
                .quality
                .match_quality(
                    parsed.resolution.as_deref().unwrap_or_default(),
                    parsed.source.as_deref().unwrap_or_default(),
                    profile,
                )
                .map(|q| q.id);
        }

        let multi_version = svcs.slots.is_multi_version_enabled().await?;

        // Phase 4: root folder
        let root = self
            .resolve_root_folder(&library_match, &media, multi_version, job.target_slot_id)
            .await?;
        library_match.root_folder = Some(root.display().to_string());

        // Phase 5: upgrade gate (single-version only; manual overrides)
        let mut previous_file: Option<PathBuf> = None;
        if !multi_version {
            if let Some(existing) = self.existing_primary_file(&library_match).await? {
                library_match.existing_file_id = Some(existing.id);
                library_match.existing_file_path = Some(existing.path.clone());
                library_match.existing_quality_id = existing.quality_id;
                library_match.is_upgrade = true;
                previous_file = Some(PathBuf::from(&existing.path));

                if !job.manual {
                    if let Some(profile) = &profile {
                        self.enforce_upgrade_gate(&library_match, &existing, profile, &source_display)
                            .await?;
                    }
                }
            }
        }

        // Phase 6: naming sees filename-parsed quality only; the real probe
        // runs in the background after placement.
        let placeholder_info = MediaInfo::default();

        // Phase 7: destination
        let ctx = build_token_context(&library_match, &media, &parsed, &filename, &placeholder_info);
        let destination =
            self.compute_destination(&renamer, &ctx, &library_match, &root, &job.source_path)?;

        if !job.manual && same_file(&job.source_path, &destination).await {
            return Err(ImportError::FileAlreadyInLibrary {
                path: source_display,
            });
        }

        let mut result = ImportResult::for_source(job.source_path.clone());

        // Phase 8: slot evaluation (multi-version only)
        let mut target_slot = job.target_slot_id;
        let mut slot_previous_file_id: Option<i64> = None;
        if multi_version {
            let slot_media = slot_media_id(&library_match);
            let evaluation = svcs
                .slots
                .evaluate_release(&parsed, library_match.kind, slot_media)
                .await?;

            if evaluation.requires_selection && job.manual && job.target_slot_id.is_none() {
                debug!("Slot selection required for {}", source_display);
                result.requires_slot_selection = true;
                result.slot_evaluation = Some(evaluation);
                result.library_match = Some(library_match);
                return Ok(result);
            }

            target_slot = job.target_slot_id.or(evaluation.recommended_slot_id);
            if target_slot.is_none() && evaluation.assignments.is_empty() {
                self.memoize_rejection(
                    &library_match,
                    &source_display,
                    DecisionCode::NotAcceptable,
                )
                .await;
                return Err(ImportError::NotAnUpgrade {
                    reason: format!("no slot accepts {}", source_display),
                });
            }

            if let Some(slot) = target_slot {
                if let Some(assignment) = evaluation.assignment_for(slot) {
                    library_match.is_upgrade = assignment.is_upgrade;
                }
                slot_previous_file_id = svcs
                    .slots
                    .get_slot_file_id(library_match.kind, slot_media, slot)
                    .await
                    .unwrap_or_else(|e| {
                        warn!("Slot file lookup failed: {}", e);
                        None
                    });
                if let Some(file_id) = slot_previous_file_id {
                    if let Some(file) = self.file_by_id(library_match.kind, file_id).await {
                        previous_file = Some(PathBuf::from(file.path));
                    }
                }
            }
            result.slot_evaluation = Some(evaluation);
        }

        // Phase 9: placement; the import is considered successful from here
        let link_mode = self
            .placement
            .import_file(&job.source_path, &destination)
            .await?;
        info!(
            "Placed {} -> {} ({})",
            source_display,
            destination.display(),
            link_mode
        );

        // Phase 11: library writer (failures degrade to warnings)
        let new_file_id = self
            .write_library_row(&library_match, &parsed, &job.source_path, &destination, multi_version)
            .await;

        // Phase 10: background probe, detached with its own lifetime
        if let Some(file_id) = new_file_id {
            self.spawn_background_probe(library_match.kind, file_id, destination.clone());
        }

        // Phase 12: slot assignment
        if multi_version {
            if let (Some(slot), Some(file_id)) = (target_slot, new_file_id) {
                let slot_media = slot_media_id(&library_match);
                if let Err(e) = svcs
                    .slots
                    .assign_file_to_slot(library_match.kind, slot_media, slot, file_id)
                    .await
                {
                    warn!("Slot assignment failed for {}: {}", source_display, e);
                } else {
                    result.assigned_slot_id = Some(slot);
                }
            }
        }

        // Phase 13: upgrade cleanup
        if let Some(previous) = &previous_file {
            if let Err(e) = self
                .placement
                .delete_upgraded_file(previous, &destination)
                .await
            {
                warn!("Failed to remove upgraded file {}: {}", previous.display(), e);
            }
            let stale_row = if multi_version {
                slot_previous_file_id
            } else {
                // The writer already dropped the single-version row; nothing
                // further to delete here.
                None
            };
            if let Some(file_id) = stale_row {
                if let Err(e) = self.remove_file_row(library_match.kind, file_id).await {
                    warn!("Failed to remove stale file row {}: {}", file_id, e);
                }
            }
        }

        // Phase 14: history
        self.record_history(
            &library_match,
            &parsed,
            profile.as_ref(),
            &job.source_path,
            &destination,
            link_mode,
            previous_file.as_deref(),
        )
        .await;

        // Phase 15: health
        if let Err(e) = svcs.health.clear(&source_display).await {
            warn!("Failed to clear health warning for {}: {}", source_display, e);
        }

        result.success = true;
        result.destination_path = Some(destination);
        result.link_mode = Some(link_mode);
        result.is_upgrade = library_match.is_upgrade;
        result.previous_file = previous_file;
        result.media_info = Some(placeholder_info);
        result.file_id = new_file_id;
        result.library_match = Some(library_match);
        Ok(result)
    }

    async fn load_media(&self, library_match: &LibraryMatch) -> Result<MediaContext> {
        match library_match.kind {
            MediaKind::Movie => {
                let movie_id = library_match.movie_id.ok_or(ImportError::ValidationError {
                    field: "match".to_string(),
                    message: "movie match without movie id".to_string(),
                })?;
                let movie = self.services.movies.get(movie_id).await?.ok_or_else(|| {
                    ImportError::ValidationError {
                        field: "match".to_string(),
                        message: format!("movie {} not in library", movie_id),
                    }
                })?;
                Ok(MediaContext {
                    quality_profile_id: movie.quality_profile_id,
                    movie: Some(movie),
                    series: None,
                    episodes: Vec::new(),
                })
            }
            MediaKind::Episode => {
                let series_id = library_match.series_id.ok_or(ImportError::ValidationError {
                    field: "match".to_string(),
                    message: "episode match without series id".to_string(),
                })?;
                let series = self.services.tv.get_series(series_id).await?.ok_or_else(|| {
                    ImportError::ValidationError {
                        field: "match".to_string(),
                        message: format!("series {} not in library", series_id),
                    }
                })?;
                let mut episodes = Vec::new();
                for id in &library_match.episode_ids {
                    if let Some(episode) = self.services.tv.get_episode(*id).await? {
                        episodes.push(episode);
                    }
                }
                episodes.sort_by_key(|e| e.episode_number);
                Ok(MediaContext {
                    quality_profile_id: series.quality_profile_id,
                    movie: None,
                    series: Some(series),
                    episodes,
                })
            }
        }
    }

    async fn resolve_root_folder(
        &self,
        library_match: &LibraryMatch,
        media: &MediaContext,
        multi_version: bool,
        target_slot_id: Option<i64>,
    ) -> Result<PathBuf> {
        if multi_version {
            if let Some(slot_id) = target_slot_id {
                if let Some(folder) = self.services.slots.get_root_folder_for_slot(slot_id).await? {
                    return Ok(PathBuf::from(folder.path));
                }
            }
        }

        let root_folder_id = match library_match.kind {
            MediaKind::Movie => media.movie.as_ref().and_then(|m| m.root_folder_id),
            MediaKind::Episode => media.series.as_ref().and_then(|s| s.root_folder_id),
        };
        let Some(id) = root_folder_id else {
            return Err(ImportError::NoRootFolder);
        };
        match self.services.root_folders.get(id).await? {
            Some(folder) => Ok(PathBuf::from(folder.path)),
            None => Err(ImportError::NoRootFolder),
        }
    }

    async fn existing_primary_file(
        &self,
        library_match: &LibraryMatch,
    ) -> Result<Option<LibraryFile>> {
        match library_match.kind {
            MediaKind::Movie => match library_match.movie_id {
                Some(id) => self.services.movies.get_primary_file(id).await,
                None => Ok(None),
            },
            MediaKind::Episode => match library_match.episode_id {
                Some(id) => self.services.tv.get_episode_file(id).await,
                None => Ok(None),
            },
        }
    }

    /// The non-manual upgrade gate; rejections are memoised so the scanner
    /// skips this path until the profile changes.
    async fn enforce_upgrade_gate(
        &self,
        library_match: &LibraryMatch,
        existing: &LibraryFile,
        profile: &QualityProfile,
        source_path: &str,
    ) -> Result<()> {
        if !profile.upgrades_enabled {
            return self
                .reject_not_upgrade(library_match, source_path, "upgrades disabled in profile")
                .await;
        }

        let Some(candidate_id) = library_match.candidate_quality_id else {
            return self
                .reject_not_upgrade(library_match, source_path, "candidate quality unknown")
                .await;
        };

        if let Some(existing_id) = existing.quality_id {
            if profile.is_at_or_above_cutoff(existing_id) {
                return self
                    .reject_not_upgrade(library_match, source_path, "existing quality at cutoff")
                    .await;
            }
            if !profile.is_upgrade(existing_id, candidate_id) {
                return self
                    .reject_not_upgrade(
                        library_match,
                        source_path,
                        "candidate not above existing quality",
                    )
                    .await;
            }
        }

        Ok(())
    }

    async fn reject_not_upgrade(
        &self,
        library_match: &LibraryMatch,
        source_path: &str,
        reason: &str,
    ) -> Result<()> {
        self.memoize_rejection(library_match, source_path, DecisionCode::NotUpgrade)
            .await;
        Err(ImportError::NotAnUpgrade {
            reason: format!("{}: {}", source_path, reason),
        })
    }

    async fn memoize_rejection(
        &self,
        library_match: &LibraryMatch,
        source_path: &str,
        decision: DecisionCode,
    ) {
        let memo = ImportDecision {
            source_path: source_path.to_string(),
            decision,
            media_kind: library_match.kind,
            media_id: library_match.media_id().unwrap_or_default(),
            candidate_quality_id: library_match.candidate_quality_id,
            existing_quality_id: library_match.existing_quality_id,
            existing_file_id: library_match.existing_file_id,
            quality_profile_id: library_match.quality_profile_id,
        };
        if let Err(e) = self.services.decisions.upsert(&memo).await {
            warn!("Failed to memoize rejection for {}: {}", source_path, e);
        }
    }

    fn compute_destination(
        &self,
        renamer: &Renamer,
        ctx: &TokenContext,
        library_match: &LibraryMatch,
        root: &Path,
        source_path: &Path,
    ) -> Result<PathBuf> {
        let extension = source_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mkv");

        match library_match.kind {
            MediaKind::Movie => {
                let folder = renamer.resolve_movie_folder(ctx)?;
                let filename = renamer.resolve_movie_filename(ctx, extension)?;
                renamer.resolve_full_path(root, Path::new(&folder), &filename)
            }
            MediaKind::Episode => {
                let series_folder = renamer.resolve_series_folder(ctx)?;
                let season = ctx.season_number.unwrap_or_default();
                let season_folder = renamer.resolve_season_folder(ctx, season)?;
                let filename = renamer.resolve_episode_filename(ctx, extension)?;
                let relative = Path::new(&series_folder).join(season_folder);
                renamer.resolve_full_path(root, &relative, &filename)
            }
        }
    }

    async fn file_by_id(&self, kind: MediaKind, file_id: i64) -> Option<LibraryFile> {
        let lookup = match kind {
            MediaKind::Movie => self.services.movies.get_file_by_id(file_id).await,
            MediaKind::Episode => self.services.tv.get_episode_file_by_id(file_id).await,
        };
        lookup.unwrap_or_else(|e| {
            warn!("File row {} lookup failed: {}", file_id, e);
            None
        })
    }

    async fn remove_file_row(&self, kind: MediaKind, file_id: i64) -> Result<()> {
        match kind {
            MediaKind::Movie => self.services.movies.remove_file(file_id).await,
            MediaKind::Episode => self.services.tv.remove_episode_file(file_id).await,
        }
    }

    /// Insert the new library row; single-version upgrades drop the stale
    /// row first. Returns the new id, or `None` after a logged warning.
    async fn write_library_row(
        &self,
        library_match: &LibraryMatch,
        parsed: &ParsedRelease,
        source_path: &Path,
        destination: &Path,
        multi_version: bool,
    ) -> Option<i64> {
        let size = match tokio::fs::metadata(destination).await {
            Ok(metadata) => metadata.len() as i64,
            Err(e) => {
                warn!("Could not stat {}: {}", destination.display(), e);
                0
            }
        };

        if !multi_version && library_match.is_upgrade {
            if let Some(stale_id) = library_match.existing_file_id {
                if let Err(e) = self.remove_file_row(library_match.kind, stale_id).await {
                    warn!("Failed to delete replaced file row {}: {}", stale_id, e);
                }
            }
        }

        let media_id = match library_match.kind {
            MediaKind::Movie => library_match.movie_id,
            MediaKind::Episode => library_match.episode_id,
        };
        let Some(media_id) = media_id else {
            warn!(
                "No media id to write a file row for {}",
                destination.display()
            );
            return None;
        };

        let mut file = LibraryFile::new(media_id, destination.display().to_string(), size);
        file.quality = parsed.quality_label();
        file.quality_id = library_match.candidate_quality_id;
        file.resolution = parsed.resolution.clone();
        file.video_codec = parsed.codec.clone();
        file.original_path = Some(source_path.display().to_string());
        file.original_filename = source_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);

        let inserted = match library_match.kind {
            MediaKind::Movie => self.services.movies.add_file(&file).await,
            MediaKind::Episode => self.services.tv.add_episode_file(&file).await,
        };
        match inserted {
            Ok(row) => Some(row.id),
            Err(e) => {
                warn!(
                    "Library writer failed for {}: {}",
                    destination.display(),
                    e
                );
                None
            }
        }
    }

    /// Fire-and-forget probe with its own cancellation scope; results land
    /// on the file row whenever they arrive.
    fn spawn_background_probe(&self, kind: MediaKind, file_id: i64, destination: PathBuf) {
        if !self.services.prober.is_available() {
            return;
        }
        let services = self.services.clone();
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            let path = destination.display().to_string();
            match services.prober.probe(&path, &cancel).await {
                Ok(info) => {
                    let update = match kind {
                        MediaKind::Movie => {
                            services.movies.update_file_media_info(file_id, &info).await
                        }
                        MediaKind::Episode => {
                            services
                                .tv
                                .update_episode_file_media_info(file_id, &info)
                                .await
                        }
                    };
                    if let Err(e) = update {
                        warn!("MediaInfo update failed for {}: {}", path, e);
                    }
                }
                Err(e) => warn!("Background probe failed for {}: {}", path, e),
            }
        });
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_history(
        &self,
        library_match: &LibraryMatch,
        parsed: &ParsedRelease,
        profile: Option<&QualityProfile>,
        source_path: &Path,
        destination: &Path,
        link_mode: crate::placement::LinkMode,
        previous_file: Option<&Path>,
    ) {
        let mut data = serde_json::json!({
            "originalFilename": source_path.file_name().and_then(|n| n.to_str()),
            "finalFilename": destination.file_name().and_then(|n| n.to_str()),
            "linkMode": link_mode.to_string(),
            "isUpgrade": library_match.is_upgrade,
            "quality": parsed.quality_label(),
        });
        if let Some(previous) = previous_file {
            data["previousFile"] = serde_json::json!(previous.display().to_string());
        }
        if library_match.is_upgrade {
            if let (Some(profile), Some(old_id), Some(new_id)) = (
                profile,
                library_match.existing_quality_id,
                library_match.candidate_quality_id,
            ) {
                if let Some(name) = quality_name(profile, old_id) {
                    data["previousQuality"] = serde_json::json!(name);
                }
                if let Some(name) = quality_name(profile, new_id) {
                    data["newQuality"] = serde_json::json!(name);
                }
            }
        }

        let entry = HistoryEntry {
            event_type: "imported".to_string(),
            media_kind: library_match.kind,
            media_id: library_match.media_id().unwrap_or_default(),
            source_path: source_path.display().to_string(),
            destination_path: destination.display().to_string(),
            data,
        };
        if let Err(e) = self.services.history.record(&entry).await {
            warn!(
                "History write failed for {}: {}",
                destination.display(),
                e
            );
        }
    }
}

/// The media item slots are keyed by: movies directly, episodes by the
/// episode row (falling back to the series for season-level evaluation).
fn slot_media_id(library_match: &LibraryMatch) -> i64 {
    match library_match.kind {
        MediaKind::Movie => library_match.movie_id.unwrap_or_default(),
        MediaKind::Episode => library_match
            .episode_id
            .or(library_match.series_id)
            .unwrap_or_default(),
    }
}

fn quality_name(profile: &QualityProfile, quality_id: i64) -> Option<String> {
    profile
        .items
        .iter()
        .find(|i| i.quality.id == quality_id)
        .map(|i| i.quality.name.clone())
}

/// Assemble the naming context from the match, its library rows, and the
/// filename evidence.
fn build_token_context(
    library_match: &LibraryMatch,
    media: &MediaContext,
    parsed: &ParsedRelease,
    filename: &str,
    media_info: &MediaInfo,
) -> TokenContext {
    let stem = filename.rsplit_once('.').map_or(filename, |(s, _)| s);

    let mut ctx = TokenContext {
        quality: parsed.resolution.clone(),
        source: parsed.source.clone(),
        codec: parsed.codec.clone(),
        revision: parsed.revision_label(),
        release_group: parsed.release_group.clone(),
        edition: parsed.edition.clone(),
        original_filename: Some(filename.to_string()),
        original_title: Some(stem.to_string()),
        release_version: parsed.version.max(1),
        media_info: media_info.clone(),
        ..Default::default()
    };

    match library_match.kind {
        MediaKind::Movie => {
            if let Some(movie) = &media.movie {
                ctx.movie_title = Some(movie.title.clone());
                ctx.movie_year = movie.year;
            }
        }
        MediaKind::Episode => {
            if let Some(series) = &media.series {
                ctx.series_title = Some(series.title.clone());
                ctx.series_year = series.year;
                ctx.series_type = series.series_type;
            }
            ctx.season_number = library_match
                .season_number
                .or_else(|| media.episodes.first().map(|e| e.season_number));

            if media.episodes.is_empty() {
                ctx.episode_numbers = parsed.episode_numbers.clone();
            } else {
                ctx.episode_numbers = media.episodes.iter().map(|e| e.episode_number).collect();
                let first = &media.episodes[0];
                ctx.episode_title = first.title.clone();
                ctx.air_date = first.air_date;
                ctx.absolute_number = first.absolute_number;
            }
        }
    }

    ctx
}
