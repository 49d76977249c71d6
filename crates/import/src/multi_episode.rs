//! Multi-episode identifier formatting
//!
//! Renders `S01E01`-style identifiers for files carrying several episodes.
//! Episode lists arrive pre-sorted; padding defaults to two digits.

use mediarr_core::MultiEpisodeStyle;

/// Render an episode identifier for one or more episodes.
///
/// `season_pad` / `episode_pad` carry the digit widths of the identifier
/// being replaced so the substitution preserves the pattern's padding.
pub fn format_multi_episode(
    season: i32,
    episodes: &[i32],
    style: MultiEpisodeStyle,
    season_pad: usize,
    episode_pad: usize,
) -> String {
    let s = pad(season, season_pad);

    match episodes {
        [] => format!("S{}", s),
        [only] => format!("S{}E{}", s, pad(*only, episode_pad)),
        _ => match style {
            MultiEpisodeStyle::Extend => extend(&s, episodes, episode_pad),
            MultiEpisodeStyle::Duplicate => episodes
                .iter()
                .map(|e| format!("S{}E{}", s, pad(*e, episode_pad)))
                .collect::<Vec<_>>()
                .join("."),
            MultiEpisodeStyle::Repeat => {
                let mut out = format!("S{}", s);
                for e in episodes {
                    out.push('E');
                    out.push_str(&pad(*e, episode_pad));
                }
                out
            }
            MultiEpisodeStyle::Scene => scene(&s, episodes, episode_pad),
            MultiEpisodeStyle::Range => {
                if is_consecutive(episodes) {
                    format!(
                        "S{}E{}-{}",
                        s,
                        pad(episodes[0], episode_pad),
                        pad(*episodes.last().unwrap(), episode_pad)
                    )
                } else {
                    extend(&s, episodes, episode_pad)
                }
            }
            MultiEpisodeStyle::PrefixedRange => {
                if is_consecutive(episodes) {
                    format!(
                        "S{}E{}-E{}",
                        s,
                        pad(episodes[0], episode_pad),
                        pad(*episodes.last().unwrap(), episode_pad)
                    )
                } else {
                    scene(&s, episodes, episode_pad)
                }
            }
        },
    }
}

fn extend(season: &str, episodes: &[i32], episode_pad: usize) -> String {
    let mut out = format!("S{}E{}", season, pad(episodes[0], episode_pad));
    for e in &episodes[1..] {
        out.push('-');
        out.push_str(&pad(*e, episode_pad));
    }
    out
}

fn scene(season: &str, episodes: &[i32], episode_pad: usize) -> String {
    let mut out = format!("S{}E{}", season, pad(episodes[0], episode_pad));
    for e in &episodes[1..] {
        out.push_str("-E");
        out.push_str(&pad(*e, episode_pad));
    }
    out
}

fn is_consecutive(episodes: &[i32]) -> bool {
    episodes.windows(2).all(|w| w[1] == w[0] + 1)
}

fn pad(value: i32, width: usize) -> String {
    format!("{:0width$}", value, width = width)
}
