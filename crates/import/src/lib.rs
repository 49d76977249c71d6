//! Mediarr import pipeline
//!
//! This crate turns completed downloads into curated library files. It
//! covers completion detection, library matching, deterministic renaming,
//! and the end-to-end import pipeline with its worker pool.
//!
//! # Key Components
//!
//! - **Completion Detector**: decides when files and folders are safe to import
//! - **Download Scanner**: discovers importable files across download clients
//! - **Matcher**: reconciles queue metadata with filename parsing
//! - **Renamer**: token-pattern engine computing destination folders and names
//! - **Import Pipeline**: validate, match, place, write, clean up, log
//! - **Coordinator**: bounded queue, single-flight processing set, worker pool
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use mediarr_import::{CoordinatorConfig, ImportCoordinator, ImportJob, ImportPipeline};
//!
//! let pipeline = std::sync::Arc::new(ImportPipeline::new(services));
//! let coordinator = ImportCoordinator::start(pipeline, CoordinatorConfig::default());
//! coordinator.queue_import(ImportJob::new("/downloads/Show.S01E01.1080p.mkv"))?;
//! ```

pub mod completion;
pub mod coordinator;
pub mod job;
pub mod languages;
pub mod matcher;
pub mod media_info;
pub mod multi_episode;
pub mod parse;
pub mod pattern;
pub mod pipeline;
pub mod placement;
pub mod renamer;
pub mod sanitize;
pub mod scanner;
pub mod season_pack;
pub mod tokens;
pub mod validator;

// Re-export main types for convenience
pub use completion::{
    ArchiveScan, CompletionConfig, CompletionDetector, DownloadCompletionResult, ExtractionStatus,
    FileCompletion, FileReadiness,
};
pub use coordinator::{CoordinatorConfig, ImportCoordinator, ProcessingSet};
pub use job::{ImportJob, ImportResult};
pub use matcher::Matcher;
pub use media_info::{parse_ffprobe_output, FfprobeProber, PROBE_TIMEOUT};
pub use multi_episode::format_multi_episode;
pub use parse::{clean_title, normalize_title, parse_release, title_similarity};
pub use pattern::{parse_pattern, resolve_pattern, validate_pattern, PatternToken, Segment};
pub use pipeline::{ImportPipeline, PipelineServices};
pub use placement::{file_identity, same_file, FileIdentity, LinkMode, PlacementEngine};
pub use renamer::{Renamer, MAX_PATH_LENGTH};
pub use sanitize::{sanitize_filename, SanitizeOptions, ILLEGAL_CHARACTERS};
pub use scanner::{DownloadScanner, ScannerConfig, DEFAULT_SUBDIRECTORIES};
pub use season_pack::{
    is_season_pack, SeasonPackAnalysis, SeasonPackDecomposer, SeasonPackFile,
};
pub use tokens::{apply_case, resolve_token, TokenContext};
pub use validator::{is_sample_path, Validator};

// Re-export core error types
pub use mediarr_core::{ImportError, Result};
