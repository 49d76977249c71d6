//! Naming-token context and resolution
//!
//! Every attribute the rename patterns can reference, resolved from the
//! library match plus whatever MediaInfo is available at naming time.
//! Resolution is side-effect-free: the same context and token always
//! produce the same value.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use mediarr_core::{CaseTransform, ImportError, MediaInfo, Result, SeriesType};

use crate::languages::{format_languages, LanguageFilter};

/// The bag of resolved attributes consumed by the rename resolver
#[derive(Debug, Clone, Default)]
pub struct TokenContext {
    pub series_title: Option<String>,
    pub series_year: Option<i32>,
    pub series_type: SeriesType,
    pub season_number: Option<i32>,
    /// Sorted episode numbers; more than one marks a multi-episode file
    pub episode_numbers: Vec<i32>,
    pub absolute_number: Option<i32>,
    pub air_date: Option<NaiveDate>,
    pub episode_title: Option<String>,
    /// Resolution label, e.g. "1080p"
    pub quality: Option<String>,
    /// Source label, e.g. "WEBDL"
    pub source: Option<String>,
    pub codec: Option<String>,
    /// Revision label: "Proper", "v2", or empty
    pub revision: String,
    pub media_info: MediaInfo,
    pub release_group: Option<String>,
    pub edition: Option<String>,
    pub custom_formats: Vec<String>,
    pub original_title: Option<String>,
    pub original_filename: Option<String>,
    pub release_version: i32,
    pub movie_title: Option<String>,
    pub movie_year: Option<i32>,
}

static IDENTIFIER_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^s\d{1,2}(e\d{1,3})([-.]e?\d{1,3})*$").unwrap());

/// Every registered token name, lower case. `Custom Format` additionally
/// accepts a modifier naming the format.
pub const TOKEN_NAMES: &[&str] = &[
    "series title",
    "series titleyear",
    "series cleantitle",
    "series cleantitleyear",
    "season",
    "episode",
    "absolute",
    "air-date",
    "air date",
    "episode title",
    "episode cleantitle",
    "quality full",
    "quality title",
    "mediainfo simple",
    "mediainfo full",
    "mediainfo videocodec",
    "mediainfo videobitdepth",
    "mediainfo videodynamicrange",
    "mediainfo videodynamicrangetype",
    "mediainfo audiocodec",
    "mediainfo audiochannels",
    "mediainfo audiolanguages",
    "mediainfo subtitlelanguages",
    "release group",
    "edition tags",
    "custom formats",
    "custom format",
    "original title",
    "original filename",
    "revision",
    "version",
    "movie title",
    "movie titleyear",
    "movie cleantitle",
    "movie cleantitleyear",
    "year",
];

/// True when `name` (case-insensitive) is a registered token
pub fn is_known_token(name: &str) -> bool {
    TOKEN_NAMES.contains(&name.to_lowercase().as_str())
}

/// Resolve one token against the context. Unknown names error; known names
/// with missing values resolve to an empty string.
pub fn resolve_token(name: &str, modifier: Option<&str>, ctx: &TokenContext) -> Result<String> {
    let key = name.to_lowercase();
    let value = match key.as_str() {
        "series title" => ctx.series_title.clone().unwrap_or_default(),
        "series titleyear" => title_year(ctx.series_title.as_deref(), ctx.series_year),
        "series cleantitle" => clean_naming_title(ctx.series_title.as_deref().unwrap_or_default()),
        "series cleantitleyear" => title_year(
            non_empty(clean_naming_title(
                ctx.series_title.as_deref().unwrap_or_default(),
            ))
            .as_deref(),
            ctx.series_year,
        ),

        "season" => ctx
            .season_number
            .map(|n| format_number(n, modifier))
            .unwrap_or_default(),
        "episode" => ctx
            .episode_numbers
            .first()
            .map(|n| format_number(*n, modifier))
            .unwrap_or_default(),
        "absolute" => ctx
            .absolute_number
            .map(|n| format_number(n, modifier))
            .unwrap_or_default(),

        "air-date" => ctx
            .air_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        "air date" => ctx
            .air_date
            .map(|d| d.format("%Y %m %d").to_string())
            .unwrap_or_default(),

        "episode title" => episode_title(ctx),
        "episode cleantitle" => non_empty(clean_naming_title(&episode_title(ctx))).unwrap_or_default(),

        "quality full" => quality_label(ctx, true),
        "quality title" => quality_label(ctx, false),

        "mediainfo simple" => join_non_empty(
            &[
                ctx.media_info.video_codec.as_deref().unwrap_or_default(),
                ctx.media_info.audio_codec.as_deref().unwrap_or_default(),
            ],
            " ",
        ),
        "mediainfo full" => {
            let languages = format_languages(&ctx.media_info.audio_languages, None);
            join_non_empty(
                &[
                    ctx.media_info.video_codec.as_deref().unwrap_or_default(),
                    ctx.media_info.audio_codec.as_deref().unwrap_or_default(),
                    &languages,
                ],
                " ",
            )
        }
        "mediainfo videocodec" => ctx.media_info.video_codec.clone().unwrap_or_default(),
        "mediainfo videobitdepth" => ctx
            .media_info
            .video_bit_depth
            .map(|d| d.to_string())
            .unwrap_or_default(),
        "mediainfo videodynamicrange" => dynamic_range(ctx.media_info.video_dynamic_range.as_deref()),
        "mediainfo videodynamicrangetype" => ctx
            .media_info
            .video_dynamic_range_type
            .clone()
            .unwrap_or_default(),
        "mediainfo audiocodec" => ctx.media_info.audio_codec.clone().unwrap_or_default(),
        "mediainfo audiochannels" => ctx
            .media_info
            .audio_channels
            .map(|c| format!("{:.1}", c))
            .unwrap_or_default(),
        "mediainfo audiolanguages" => {
            let filter = modifier.map(LanguageFilter::parse);
            format_languages(&ctx.media_info.audio_languages, filter.as_ref())
        }
        "mediainfo subtitlelanguages" => {
            let filter = modifier.map(LanguageFilter::parse);
            format_languages(&ctx.media_info.subtitle_languages, filter.as_ref())
        }

        "release group" => ctx.release_group.clone().unwrap_or_default(),
        "edition tags" => ctx.edition.clone().unwrap_or_default(),
        "custom formats" => ctx.custom_formats.join(" "),
        "custom format" => match modifier {
            Some(wanted) => ctx
                .custom_formats
                .iter()
                .find(|f| f.eq_ignore_ascii_case(wanted))
                .cloned()
                .unwrap_or_default(),
            None => String::new(),
        },

        "original title" => ctx.original_title.clone().unwrap_or_default(),
        "original filename" => ctx.original_filename.clone().unwrap_or_default(),
        "revision" => ctx.revision.clone(),
        "version" => {
            if ctx.release_version > 1 {
                format!("v{}", ctx.release_version)
            } else {
                String::new()
            }
        }

        "movie title" => ctx.movie_title.clone().unwrap_or_default(),
        "movie titleyear" => title_year(ctx.movie_title.as_deref(), ctx.movie_year),
        "movie cleantitle" => clean_naming_title(ctx.movie_title.as_deref().unwrap_or_default()),
        "movie cleantitleyear" => title_year(
            non_empty(clean_naming_title(
                ctx.movie_title.as_deref().unwrap_or_default(),
            ))
            .as_deref(),
            ctx.movie_year,
        ),
        "year" => ctx
            .movie_year
            .or(ctx.series_year)
            .map(|y| y.to_string())
            .unwrap_or_default(),

        _ => {
            return Err(ImportError::InvalidToken {
                token: name.to_string(),
            })
        }
    };

    Ok(apply_string_modifier(&key, value, modifier))
}

/// Episode title with the daily-show fallback to the formatted air date
fn episode_title(ctx: &TokenContext) -> String {
    if let Some(title) = ctx.episode_title.as_deref() {
        if !title.is_empty() {
            return title.to_string();
        }
    }
    if ctx.series_type == SeriesType::Daily {
        if let Some(date) = ctx.air_date {
            return date.format("%B %-d, %Y").to_string();
        }
    }
    String::new()
}

/// "Source-Quality Revision"; pieces are skipped when empty
fn quality_label(ctx: &TokenContext, with_revision: bool) -> String {
    let source_quality = join_non_empty(
        &[
            ctx.source.as_deref().unwrap_or_default(),
            ctx.quality.as_deref().unwrap_or_default(),
        ],
        "-",
    );
    if !with_revision {
        return source_quality;
    }
    join_non_empty(&[&source_quality, &ctx.revision], " ")
}

/// Any non-empty, non-SDR dynamic range is reported as HDR
fn dynamic_range(raw: Option<&str>) -> String {
    match raw {
        Some(value) if !value.is_empty() && !value.eq_ignore_ascii_case("sdr") => {
            "HDR".to_string()
        }
        _ => String::new(),
    }
}

fn title_year(title: Option<&str>, year: Option<i32>) -> String {
    match (title, year) {
        (Some(t), Some(y)) if !t.is_empty() => format!("{} ({})", t, y),
        (Some(t), None) => t.to_string(),
        _ => String::new(),
    }
}

/// Title form safe for any naming scheme: ampersands become "and",
/// everything outside alphanumerics and spaces is dropped.
pub fn clean_naming_title(title: &str) -> String {
    let replaced = title.replace('&', " and ");
    let filtered: String = replaced
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Zero-pad when the modifier is a padding mask (leading zero); plain
/// rendering otherwise.
fn format_number(value: i32, modifier: Option<&str>) -> String {
    match modifier {
        Some(mask) if mask.starts_with('0') && mask.chars().all(|c| c.is_ascii_digit()) => {
            format!("{:0width$}", value, width = mask.len())
        }
        _ => value.to_string(),
    }
}

/// Truncation modifiers apply to plain string tokens only; numeric masks,
/// language filters and custom-format names are consumed elsewhere.
fn apply_string_modifier(key: &str, value: String, modifier: Option<&str>) -> String {
    let structural = matches!(
        key,
        "season"
            | "episode"
            | "absolute"
            | "custom format"
            | "mediainfo audiolanguages"
            | "mediainfo subtitlelanguages"
    );
    if structural {
        return value;
    }
    let Some(modifier) = modifier else {
        return value;
    };
    if modifier.starts_with('0') {
        return value;
    }
    let Ok(length) = modifier.parse::<i64>() else {
        return value;
    };

    let chars: Vec<char> = value.chars().collect();
    let keep = length.unsigned_abs() as usize;
    if keep == 0 || keep >= chars.len() {
        return value;
    }
    if length > 0 {
        chars[..keep].iter().collect()
    } else {
        chars[chars.len() - keep..].iter().collect()
    }
}

/// Case transformation for a fully resolved name. Title case keeps
/// `S01E01`-style identifiers upper case.
pub fn apply_case(name: &str, case: CaseTransform) -> String {
    match case {
        CaseTransform::Default => name.to_string(),
        CaseTransform::Upper => name.to_uppercase(),
        CaseTransform::Lower => name.to_lowercase(),
        CaseTransform::Title => name
            .split(' ')
            .map(title_case_word)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn title_case_word(word: &str) -> String {
    if IDENTIFIER_WORD.is_match(word) {
        return word.to_uppercase();
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn join_non_empty(pieces: &[&str], separator: &str) -> String {
    pieces
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(separator)
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode_ctx() -> TokenContext {
        TokenContext {
            series_title: Some("Breaking Bad".to_string()),
            series_year: Some(2008),
            season_number: Some(2),
            episode_numbers: vec![5],
            episode_title: Some("Breakage".to_string()),
            quality: Some("1080p".to_string()),
            source: Some("WEBDL".to_string()),
            release_version: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_series_tokens() {
        let ctx = episode_ctx();
        assert_eq!(resolve_token("Series Title", None, &ctx).unwrap(), "Breaking Bad");
        assert_eq!(
            resolve_token("Series TitleYear", None, &ctx).unwrap(),
            "Breaking Bad (2008)"
        );
        assert_eq!(
            resolve_token("series cleantitle", None, &ctx).unwrap(),
            "Breaking Bad"
        );
    }

    #[test]
    fn test_number_padding() {
        let ctx = episode_ctx();
        assert_eq!(resolve_token("season", Some("00"), &ctx).unwrap(), "02");
        assert_eq!(resolve_token("episode", Some("00"), &ctx).unwrap(), "05");
        assert_eq!(resolve_token("season", None, &ctx).unwrap(), "2");
        // Non-zero-leading modifier means no padding
        assert_eq!(resolve_token("season", Some("3"), &ctx).unwrap(), "2");
    }

    #[test]
    fn test_quality_tokens() {
        let mut ctx = episode_ctx();
        assert_eq!(
            resolve_token("Quality Full", None, &ctx).unwrap(),
            "WEBDL-1080p"
        );
        ctx.revision = "Proper".to_string();
        assert_eq!(
            resolve_token("Quality Full", None, &ctx).unwrap(),
            "WEBDL-1080p Proper"
        );
        assert_eq!(
            resolve_token("Quality Title", None, &ctx).unwrap(),
            "WEBDL-1080p"
        );

        ctx.source = None;
        ctx.revision = String::new();
        assert_eq!(resolve_token("Quality Full", None, &ctx).unwrap(), "1080p");
    }

    #[test]
    fn test_air_date_tokens() {
        let mut ctx = episode_ctx();
        ctx.air_date = NaiveDate::from_ymd_opt(2009, 4, 26);
        assert_eq!(
            resolve_token("Air-Date", None, &ctx).unwrap(),
            "2009-04-26"
        );
        assert_eq!(
            resolve_token("Air Date", None, &ctx).unwrap(),
            "2009 04 26"
        );
    }

    #[test]
    fn test_daily_air_date_fallback() {
        let mut ctx = episode_ctx();
        ctx.series_type = SeriesType::Daily;
        ctx.episode_title = None;
        ctx.air_date = NaiveDate::from_ymd_opt(2019, 6, 4);
        assert_eq!(
            resolve_token("Episode Title", None, &ctx).unwrap(),
            "June 4, 2019"
        );
    }

    #[test]
    fn test_missing_episode_title_is_empty_for_standard() {
        let mut ctx = episode_ctx();
        ctx.episode_title = None;
        assert_eq!(resolve_token("Episode Title", None, &ctx).unwrap(), "");
    }

    #[test]
    fn test_dynamic_range_mapping() {
        let mut ctx = episode_ctx();
        ctx.media_info.video_dynamic_range = Some("HDR10".to_string());
        ctx.media_info.video_dynamic_range_type = Some("HDR10".to_string());
        assert_eq!(
            resolve_token("MediaInfo VideoDynamicRange", None, &ctx).unwrap(),
            "HDR"
        );
        assert_eq!(
            resolve_token("MediaInfo VideoDynamicRangeType", None, &ctx).unwrap(),
            "HDR10"
        );

        ctx.media_info.video_dynamic_range = Some("SDR".to_string());
        assert_eq!(
            resolve_token("MediaInfo VideoDynamicRange", None, &ctx).unwrap(),
            ""
        );
    }

    #[test]
    fn test_audio_channels_formatting() {
        let mut ctx = episode_ctx();
        ctx.media_info.audio_channels = Some(5.1);
        assert_eq!(
            resolve_token("MediaInfo AudioChannels", None, &ctx).unwrap(),
            "5.1"
        );
        ctx.media_info.audio_channels = Some(2.0);
        assert_eq!(
            resolve_token("MediaInfo AudioChannels", None, &ctx).unwrap(),
            "2.0"
        );
    }

    #[test]
    fn test_language_tokens_with_filter() {
        let mut ctx = episode_ctx();
        ctx.media_info.audio_languages = vec!["eng".to_string(), "ger".to_string()];
        assert_eq!(
            resolve_token("MediaInfo AudioLanguages", None, &ctx).unwrap(),
            "[EN+DE]"
        );
        assert_eq!(
            resolve_token("MediaInfo AudioLanguages", Some("-DE"), &ctx).unwrap(),
            "[EN]"
        );
        assert_eq!(
            resolve_token("MediaInfo AudioLanguages", Some("EN+DE"), &ctx).unwrap(),
            "[EN+DE]"
        );
    }

    #[test]
    fn test_custom_format_lookup() {
        let mut ctx = episode_ctx();
        ctx.custom_formats = vec!["HDR".to_string(), "Atmos".to_string()];
        assert_eq!(
            resolve_token("Custom Formats", None, &ctx).unwrap(),
            "HDR Atmos"
        );
        assert_eq!(
            resolve_token("Custom Format", Some("hdr"), &ctx).unwrap(),
            "HDR"
        );
        assert_eq!(
            resolve_token("Custom Format", Some("DV"), &ctx).unwrap(),
            ""
        );
    }

    #[test]
    fn test_version_token() {
        let mut ctx = episode_ctx();
        assert_eq!(resolve_token("version", None, &ctx).unwrap(), "");
        ctx.release_version = 2;
        assert_eq!(resolve_token("version", None, &ctx).unwrap(), "v2");
    }

    #[test]
    fn test_movie_tokens_and_year_fallback() {
        let mut ctx = TokenContext {
            movie_title: Some("The Matrix".to_string()),
            movie_year: Some(1999),
            ..Default::default()
        };
        assert_eq!(
            resolve_token("Movie TitleYear", None, &ctx).unwrap(),
            "The Matrix (1999)"
        );
        assert_eq!(resolve_token("Year", None, &ctx).unwrap(), "1999");

        ctx.movie_year = None;
        ctx.series_year = Some(2008);
        assert_eq!(resolve_token("Year", None, &ctx).unwrap(), "2008");
    }

    #[test]
    fn test_truncation_modifier() {
        let ctx = episode_ctx();
        assert_eq!(
            resolve_token("Series Title", Some("8"), &ctx).unwrap(),
            "Breaking"
        );
        assert_eq!(
            resolve_token("Series Title", Some("-3"), &ctx).unwrap(),
            "Bad"
        );
    }

    #[test]
    fn test_unknown_token_errors() {
        let ctx = episode_ctx();
        assert!(matches!(
            resolve_token("Bogus Token", None, &ctx),
            Err(ImportError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_apply_case() {
        assert_eq!(
            apply_case("Breaking Bad - S02E05", CaseTransform::Upper),
            "BREAKING BAD - S02E05"
        );
        assert_eq!(
            apply_case("Breaking Bad - S02E05", CaseTransform::Lower),
            "breaking bad - s02e05"
        );
        assert_eq!(
            apply_case("breaking bad - s02e05", CaseTransform::Title),
            "Breaking Bad - S02E05"
        );
        assert_eq!(
            apply_case("mixed CASE name", CaseTransform::Default),
            "mixed CASE name"
        );
    }

    #[test]
    fn test_clean_naming_title() {
        assert_eq!(clean_naming_title("Law & Order"), "Law and Order");
        assert_eq!(clean_naming_title("Mr. Robot"), "Mr Robot");
        assert_eq!(clean_naming_title("WandaVision!"), "WandaVision");
    }
}
