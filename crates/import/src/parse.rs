//! Release filename parsing
//!
//! Decodes series/movie titles, episode identifiers, and quality evidence
//! from release names. This is the "parse" side of the matcher's two
//! evidence sources.

use once_cell::sync::Lazy;
use regex::Regex;

use mediarr_core::ParsedRelease;

// TV patterns, tried in order
static TV_SXXEXX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<title>.+?)[. _-]+S(?P<season>\d{1,2})E(?P<episode>\d{1,3})").unwrap()
});

static TV_XFORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<title>.+?)[. _-]+(?P<season>\d{1,2})x(?P<episode>\d{2,3})").unwrap()
});

static TV_VERBOSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<title>.+?)[. _-]+Season[. _-]+(?P<season>\d{1,2})[. _-]+Episode[. _-]+(?P<episode>\d{1,3})",
    )
    .unwrap()
});

// Multi-episode run attached to the first identifier: S01E01E02, S01E01-E02
static MULTI_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)S(?P<season>\d{1,2})E(?P<first>\d{1,3})(?P<rest>(?:-?E\d{1,3})+)").unwrap()
});

static EPISODE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)E(\d{1,3})").unwrap());

static MOVIE_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<title>.+?)[. _-]*[(\[]?(?P<year>19\d{2}|20\d{2})[)\]]?(?:[. _-]|$)").unwrap()
});

static YEAR_BRACKETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[(\[](?:19|20)\d{2}[)\]]").unwrap());

// Quality evidence
static RESOLUTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(2160p|1080p|720p|576p|480p|4K)\b").unwrap());

static SOURCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(WEB[-. ]?DL|WEBRip|Blu[-. ]?Ray|BDRip|BRRip|Remux|HDTV|DVDRip|SDTV|WEB|CAM)\b")
        .unwrap()
});

static CODEC_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(x264|x265|h\.?264|h\.?265|HEVC|AVC|AV1|XviD|DivX)\b").unwrap());

static RELEASE_GROUP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-([A-Za-z0-9]+)(?:\[.*?\])?$").unwrap());

static PROPER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(PROPER|REPACK)\b").unwrap());

static VERSION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)[. _-]v(\d)\b").unwrap());

static EDITION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(Directors?[. _-]Cut|Extended|Unrated|Theatrical|IMAX|Remastered|Uncut|Special[. _-]Edition)\b",
    )
    .unwrap()
});

/// Parse a release filename into evidence. Tries the TV patterns in order,
/// then falls back to the movie year pattern; returns `None` when neither
/// yields a title.
pub fn parse_release(filename: &str) -> Option<ParsedRelease> {
    let stem = strip_extension(filename);

    if let Some(parsed) = parse_tv(stem, filename) {
        return Some(parsed);
    }
    parse_movie(stem, filename)
}

fn parse_tv(stem: &str, original: &str) -> Option<ParsedRelease> {
    let caps = TV_SXXEXX
        .captures(stem)
        .or_else(|| TV_XFORMAT.captures(stem))
        .or_else(|| TV_VERBOSE.captures(stem))?;

    let title = clean_title(caps.name("title")?.as_str());
    if title.is_empty() {
        return None;
    }

    let season: i32 = caps.name("season")?.as_str().parse().ok()?;
    let first_episode: i32 = caps.name("episode")?.as_str().parse().ok()?;

    let mut episodes = vec![first_episode];
    if let Some(multi) = MULTI_EPISODE.captures(stem) {
        let first: i32 = multi.name("first")?.as_str().parse().ok()?;
        episodes = vec![first];
        for extra in EPISODE_NUMBER.captures_iter(multi.name("rest")?.as_str()) {
            if let Ok(n) = extra[1].parse::<i32>() {
                episodes.push(n);
            }
        }
    }
    episodes.sort_unstable();
    episodes.dedup();

    Some(ParsedRelease {
        original_filename: original.to_string(),
        title,
        year: None,
        season_number: Some(season),
        episode_numbers: episodes,
        absolute_number: None,
        resolution: extract_resolution(stem),
        source: extract_source(stem),
        codec: extract_codec(stem),
        release_group: extract_release_group(stem),
        edition: extract_edition(stem),
        proper: PROPER_REGEX.is_match(stem),
        version: extract_version(stem),
    })
}

fn parse_movie(stem: &str, original: &str) -> Option<ParsedRelease> {
    let caps = MOVIE_YEAR.captures(stem)?;
    let title = clean_title(caps.name("title")?.as_str());
    if title.is_empty() {
        return None;
    }
    let year: i32 = caps.name("year")?.as_str().parse().ok()?;

    Some(ParsedRelease {
        original_filename: original.to_string(),
        title,
        year: Some(year),
        season_number: None,
        episode_numbers: Vec::new(),
        absolute_number: None,
        resolution: extract_resolution(stem),
        source: extract_source(stem),
        codec: extract_codec(stem),
        release_group: extract_release_group(stem),
        edition: extract_edition(stem),
        proper: PROPER_REGEX.is_match(stem),
        version: extract_version(stem),
    })
}

fn strip_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if ext.len() <= 4 && !ext.is_empty() => stem,
        _ => filename,
    }
}

/// Clean a raw title fragment: strip bracketed years, turn the separator
/// characters `._-:&/` into spaces, drop apostrophes, collapse whitespace.
pub fn clean_title(raw: &str) -> String {
    let without_year = YEAR_BRACKETS.replace_all(raw, " ");
    let replaced: String = without_year
        .chars()
        .filter(|c| *c != '\'')
        .map(|c| match c {
            '.' | '_' | '-' | ':' | '&' | '/' => ' ',
            other => other,
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalised form used for similarity comparison: cleaned, lower-cased,
/// leading article stripped.
pub fn normalize_title(title: &str) -> String {
    let lower = clean_title(title).to_lowercase();
    for article in ["the ", "a ", "an "] {
        if let Some(rest) = lower.strip_prefix(article) {
            return rest.to_string();
        }
    }
    lower
}

/// Jaccard word-overlap similarity between two normalised titles
pub fn title_similarity(a: &str, b: &str) -> f32 {
    use std::collections::HashSet;

    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count() as f32;
    let union = words_a.union(&words_b).count() as f32;
    intersection / union
}

fn extract_resolution(s: &str) -> Option<String> {
    RESOLUTION_REGEX.find(s).map(|m| {
        let value = m.as_str();
        if value.eq_ignore_ascii_case("4K") {
            "2160p".to_string()
        } else {
            value.to_lowercase()
        }
    })
}

fn extract_source(s: &str) -> Option<String> {
    SOURCE_REGEX.find(s).map(|m| canonical_source(m.as_str()))
}

fn canonical_source(raw: &str) -> String {
    let flat: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase();
    match flat.as_str() {
        "WEBDL" | "WEB" => "WEBDL".to_string(),
        "WEBRIP" => "WEBRIP".to_string(),
        "BLURAY" => "BLURAY".to_string(),
        "BDRIP" | "BRRIP" => "BDRIP".to_string(),
        other => other.to_string(),
    }
}

fn extract_codec(s: &str) -> Option<String> {
    CODEC_REGEX.find(s).map(|m| {
        m.as_str()
            .chars()
            .filter(|c| *c != '.')
            .collect::<String>()
            .to_lowercase()
    })
}

fn extract_release_group(s: &str) -> Option<String> {
    RELEASE_GROUP_REGEX
        .captures(s)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        // Codec hits at the end of the stem are not a group
        .filter(|g| !CODEC_REGEX.is_match(g) && !RESOLUTION_REGEX.is_match(g))
}

fn extract_edition(s: &str) -> Option<String> {
    EDITION_REGEX
        .find(s)
        .map(|m| m.as_str().replace(['.', '_'], " ").replace('-', " "))
}

fn extract_version(s: &str) -> i32 {
    VERSION_REGEX
        .captures(s)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(1)
}
