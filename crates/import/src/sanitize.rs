//! Filesystem-safe name sanitation
//!
//! Applied to every resolved file and folder name before it touches disk.

use mediarr_core::ColonReplacement;

/// Characters that cannot appear in a resolved name
pub const ILLEGAL_CHARACTERS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Windows reserved device names; a name whose stem equals one of these is
/// suffixed with `_`.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// How illegal characters are handled
#[derive(Debug, Clone)]
pub struct SanitizeOptions {
    /// Replace illegal characters using the substitution map; when false
    /// they are dropped instead
    pub replace: bool,
    pub colon: ColonReplacement,
    /// Replacement string for [`ColonReplacement::Custom`]
    pub custom_colon: String,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            replace: true,
            colon: ColonReplacement::Smart,
            custom_colon: String::new(),
        }
    }
}

/// Sanitise one path component (a file or folder name, never a full path).
pub fn sanitize_filename(name: &str, options: &SanitizeOptions) -> String {
    let without_colons = replace_colons(name, options);

    let mut replaced = String::with_capacity(without_colons.len());
    for c in without_colons.chars() {
        if !ILLEGAL_CHARACTERS.contains(&c) {
            replaced.push(c);
            continue;
        }
        if !options.replace {
            continue;
        }
        match c {
            '\\' | '/' | '*' | '|' => replaced.push('-'),
            '?' => replaced.push(' '),
            '"' => replaced.push('\''),
            '<' => replaced.push('('),
            '>' => replaced.push(')'),
            // Colons were consumed above
            _ => {}
        }
    }

    let collapsed = collapse_spaces(&replaced);
    let trimmed = collapsed.trim_matches(|c| c == ' ' || c == '.');

    fix_reserved_name(trimmed)
}

fn replace_colons(name: &str, options: &SanitizeOptions) -> String {
    if !name.contains(':') {
        return name.to_string();
    }

    let replacement: &str = match options.colon {
        ColonReplacement::Delete => "",
        ColonReplacement::Dash => "-",
        ColonReplacement::SpaceDash => " -",
        ColonReplacement::SpaceDashSpace => " - ",
        ColonReplacement::Custom => &options.custom_colon,
        ColonReplacement::Smart => {
            return smart_replace_colons(name);
        }
    };
    name.replace(':', replacement)
}

/// Smart mode: pad the dash on whichever sides touch a word character, so
/// `Trek: Disc` and `Trek:Disc` both land on `Trek - Disc`.
fn smart_replace_colons(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, c) in chars.iter().enumerate() {
        if *c != ':' {
            out.push(*c);
            continue;
        }
        let prev_is_word = i
            .checked_sub(1)
            .and_then(|p| chars.get(p))
            .map(|p| p.is_alphanumeric())
            .unwrap_or(false);
        let next_is_word = chars
            .get(i + 1)
            .map(|n| n.is_alphanumeric())
            .unwrap_or(false);
        if prev_is_word {
            out.push(' ');
        }
        out.push('-');
        if next_is_word {
            out.push(' ');
        }
    }
    out
}

fn collapse_spaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = false;
    for c in s.chars() {
        if c == ' ' {
            if !last_space {
                out.push(c);
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

fn fix_reserved_name(name: &str) -> String {
    let (stem, extension) = match name.split_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (name, None),
    };

    let upper = stem.to_uppercase();
    if !RESERVED_NAMES.contains(&upper.as_str()) {
        return name.to_string();
    }

    match extension {
        Some(ext) => format!("{}_.{}", stem, ext),
        None => format!("{}_", stem),
    }
}
