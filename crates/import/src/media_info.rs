//! Media probing via ffprobe
//!
//! Runs the probe tool against a file and maps its JSON output into
//! [`MediaInfo`]. The probe is bounded by its own deadline and honours
//! cancellation; the pipeline runs it as a detached background task.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use mediarr_core::services::MediaProber;
use mediarr_core::{ImportError, MediaInfo, Result};

/// Hard limit for one probe invocation
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(120);

/// ffprobe-backed prober; discovery happens once at construction
pub struct FfprobeProber {
    tool: Option<PathBuf>,
}

impl FfprobeProber {
    /// Locate ffprobe on PATH. A missing tool is not an error; callers see
    /// it through [`MediaProber::is_available`].
    pub fn discover() -> Self {
        let tool = which::which("ffprobe").ok();
        match &tool {
            Some(path) => debug!("Found probe tool at {}", path.display()),
            None => debug!("No ffprobe on PATH, media probing disabled"),
        }
        Self { tool }
    }

    pub fn with_tool(tool: PathBuf) -> Self {
        Self { tool: Some(tool) }
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    fn is_available(&self) -> bool {
        self.tool.is_some()
    }

    async fn probe(&self, path: &str, cancel: &CancellationToken) -> Result<MediaInfo> {
        let tool = self
            .tool
            .as_ref()
            .ok_or(ImportError::NoProbeToolAvailable)?;

        let mut command = Command::new(tool);
        command
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                path,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // kill_on_drop reaps the child when the timeout or cancellation arm
        // drops the output future.
        let output = tokio::select! {
            result = tokio::time::timeout(PROBE_TIMEOUT, command.output()) => match result {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    return Err(ImportError::ExternalServiceError {
                        service: "ffprobe".to_string(),
                        error: e.to_string(),
                    })
                }
                Err(_) => {
                    return Err(ImportError::Timeout {
                        operation: format!("probe of {}", path),
                    })
                }
            },
            _ = cancel.cancelled() => {
                return Err(ImportError::Cancelled {
                    operation: format!("probe of {}", path),
                });
            }
        };

        if !output.status.success() {
            return Err(ImportError::ExternalServiceError {
                service: "ffprobe".to_string(),
                error: format!("probe of {} exited with {}", path, output.status),
            });
        }

        let json = String::from_utf8_lossy(&output.stdout);
        parse_ffprobe_output(&json)
    }
}

/// Map ffprobe's JSON document into [`MediaInfo`]
pub fn parse_ffprobe_output(json: &str) -> Result<MediaInfo> {
    let doc: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ImportError::ExternalServiceError {
            service: "ffprobe".to_string(),
            error: format!("unparseable probe output: {}", e),
        })?;

    let mut info = MediaInfo::default();

    if let Some(format) = doc.get("format") {
        info.container_format = format
            .get("format_name")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        info.duration_seconds = format
            .get("duration")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok());
    }

    let streams = doc
        .get("streams")
        .and_then(|s| s.as_array())
        .cloned()
        .unwrap_or_default();

    for stream in &streams {
        let codec_type = stream
            .get("codec_type")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let codec_name = stream
            .get("codec_name")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let language = stream
            .pointer("/tags/language")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        match codec_type {
            "video" if info.video_codec.is_none() => {
                info.video_codec = codec_name;
                info.video_resolution = stream
                    .get("height")
                    .and_then(|v| v.as_i64())
                    .map(resolution_label);
                info.video_bit_depth = stream
                    .get("bits_per_raw_sample")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok());
                let transfer = stream
                    .get("color_transfer")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                match transfer {
                    "smpte2084" => {
                        info.video_dynamic_range = Some("HDR".to_string());
                        info.video_dynamic_range_type = Some("HDR10".to_string());
                    }
                    "arib-std-b67" => {
                        info.video_dynamic_range = Some("HDR".to_string());
                        info.video_dynamic_range_type = Some("HLG".to_string());
                    }
                    _ => {}
                }
            }
            "audio" => {
                if info.audio_codec.is_none() {
                    info.audio_codec = codec_name;
                    info.audio_channels = stream.get("channels").and_then(|v| v.as_i64()).map(|c| {
                        // 6 channels reads as 5.1, 8 as 7.1
                        match c {
                            6 => 5.1,
                            8 => 7.1,
                            other => other as f64,
                        }
                    });
                }
                if let Some(language) = language {
                    if !info.audio_languages.contains(&language) {
                        info.audio_languages.push(language);
                    }
                }
            }
            "subtitle" => {
                if let Some(language) = language {
                    if !info.subtitle_languages.contains(&language) {
                        info.subtitle_languages.push(language);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(info)
}

fn resolution_label(height: i64) -> String {
    let label = match height {
        h if h >= 2000 => 2160,
        h if h >= 1000 => 1080,
        h if h >= 700 => 720,
        h if h >= 560 => 576,
        _ => 480,
    };
    format!("{}p", label)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OUTPUT: &str = r#"{
        "streams": [
            {
                "codec_type": "video",
                "codec_name": "hevc",
                "height": 2160,
                "bits_per_raw_sample": "10",
                "color_transfer": "smpte2084"
            },
            {
                "codec_type": "audio",
                "codec_name": "eac3",
                "channels": 6,
                "tags": { "language": "eng" }
            },
            {
                "codec_type": "audio",
                "codec_name": "aac",
                "channels": 2,
                "tags": { "language": "ger" }
            },
            {
                "codec_type": "subtitle",
                "codec_name": "subrip",
                "tags": { "language": "eng" }
            }
        ],
        "format": {
            "format_name": "matroska,webm",
            "duration": "3211.52"
        }
    }"#;

    #[test]
    fn test_parse_full_output() {
        let info = parse_ffprobe_output(SAMPLE_OUTPUT).unwrap();
        assert_eq!(info.video_codec.as_deref(), Some("hevc"));
        assert_eq!(info.video_resolution.as_deref(), Some("2160p"));
        assert_eq!(info.video_bit_depth, Some(10));
        assert_eq!(info.video_dynamic_range.as_deref(), Some("HDR"));
        assert_eq!(info.video_dynamic_range_type.as_deref(), Some("HDR10"));
        assert_eq!(info.audio_codec.as_deref(), Some("eac3"));
        assert_eq!(info.audio_channels, Some(5.1));
        assert_eq!(info.audio_languages, vec!["eng", "ger"]);
        assert_eq!(info.subtitle_languages, vec!["eng"]);
        assert_eq!(info.duration_seconds, Some(3211.52));
        assert_eq!(info.container_format.as_deref(), Some("matroska,webm"));
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_ffprobe_output("not json").is_err());
    }

    #[test]
    fn test_parse_empty_document() {
        let info = parse_ffprobe_output("{}").unwrap();
        assert!(info.is_empty());
    }

    #[test]
    fn test_resolution_labels() {
        assert_eq!(resolution_label(2160), "2160p");
        assert_eq!(resolution_label(1080), "1080p");
        assert_eq!(resolution_label(1072), "1080p");
        assert_eq!(resolution_label(720), "720p");
        assert_eq!(resolution_label(576), "576p");
        assert_eq!(resolution_label(480), "480p");
    }

    #[test]
    fn test_unavailable_prober() {
        let prober = FfprobeProber { tool: None };
        assert!(!prober.is_available());
    }
}
