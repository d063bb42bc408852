//! Plain-text lyrics handling shared by the providers and translators.

use regex::Regex;
use std::sync::OnceLock;

/// Split raw lyrics into trimmed, non-empty lines.
///
/// Windows line endings are normalized first, so the same text yields the same
/// line sequence whichever API produced it.
pub fn format_lyrics(lyrics: &str) -> Vec<String> {
    lyrics
        .replace("\r\n", "\n")
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Drop LRC time tags (`[mm:ss.xx]`) from synced lyrics, keeping the text.
pub fn strip_timestamps(synced: &str) -> String {
    static TIME_TAG: OnceLock<Regex> = OnceLock::new();
    let re = TIME_TAG.get_or_init(|| {
        Regex::new(r"\[\d{1,3}:\d{2}(?:[.:]\d{1,3})?\]").expect("time tag pattern is valid")
    });

    synced
        .lines()
        .map(|line| re.replace_all(line, "").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
