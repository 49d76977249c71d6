//! Language code normalisation and naming-token formatting

/// Normalise an ISO 639-1/2/3 code or a common English language name to a
/// two-letter upper-case code. Unknown inputs fall back to their first two
/// characters.
pub fn normalize_language_code(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let code = match lower.as_str() {
        "en" | "eng" | "english" => "EN",
        "de" | "ger" | "deu" | "german" => "DE",
        "fr" | "fre" | "fra" | "french" => "FR",
        "es" | "spa" | "spanish" => "ES",
        "it" | "ita" | "italian" => "IT",
        "ja" | "jpn" | "japanese" => "JA",
        "pt" | "por" | "portuguese" => "PT",
        "ru" | "rus" | "russian" => "RU",
        "zh" | "chi" | "zho" | "chinese" => "ZH",
        "nl" | "dut" | "nld" | "dutch" => "NL",
        "ko" | "kor" | "korean" => "KO",
        "sv" | "swe" | "swedish" => "SV",
        "no" | "nor" | "norwegian" => "NO",
        "da" | "dan" | "danish" => "DA",
        "fi" | "fin" | "finnish" => "FI",
        "pl" | "pol" | "polish" => "PL",
        "cs" | "cze" | "ces" | "czech" => "CS",
        "hu" | "hun" | "hungarian" => "HU",
        "tr" | "tur" | "turkish" => "TR",
        "el" | "gre" | "ell" | "greek" => "EL",
        "he" | "heb" | "hebrew" => "HE",
        "ar" | "ara" | "arabic" => "AR",
        "hi" | "hin" | "hindi" => "HI",
        "th" | "tha" | "thai" => "TH",
        "vi" | "vie" | "vietnamese" => "VI",
        "uk" | "ukr" | "ukrainian" => "UK",
        _ => "",
    };
    if !code.is_empty() {
        return code.to_string();
    }
    lower.chars().take(2).collect::<String>().to_uppercase()
}

/// A parsed language-filter modifier: `EN+DE` (or `EN,DE`) keeps the listed
/// codes, `-DE` drops them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageFilter {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl LanguageFilter {
    pub fn parse(modifier: &str) -> Self {
        if let Some(rest) = modifier.strip_prefix('-') {
            LanguageFilter::Exclude(split_codes(rest))
        } else {
            LanguageFilter::Include(split_codes(modifier))
        }
    }

    fn keeps(&self, code: &str) -> bool {
        match self {
            LanguageFilter::Include(keep) => keep.iter().any(|k| k == code),
            LanguageFilter::Exclude(drop) => !drop.iter().any(|d| d == code),
        }
    }
}

fn split_codes(s: &str) -> Vec<String> {
    s.split(['+', ','])
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(normalize_language_code)
        .collect()
}

/// Render a language list as a naming-token value: `[EN+FR]`. Returns an
/// empty string when nothing survives the filter.
pub fn format_languages(languages: &[String], filter: Option<&LanguageFilter>) -> String {
    let codes: Vec<String> = languages
        .iter()
        .map(|l| normalize_language_code(l))
        .filter(|c| filter.map(|f| f.keeps(c)).unwrap_or(true))
        .collect();

    if codes.is_empty() {
        return String::new();
    }
    format!("[{}]", codes.join("+"))
}
