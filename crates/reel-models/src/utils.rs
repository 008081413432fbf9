//! Naming helpers shared by the CLI and the merge step.

const FALLBACK_STEM: &str = "storyboard";

/// Download filename for a merged storyboard video.
///
/// ASCII alphanumerics are lowercased, every other run of characters becomes a
/// single `_`. An empty result falls back to `storyboard`.
pub fn output_filename(title: &str, extension: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            stem.push(ch.to_ascii_lowercase());
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }

    let stem = stem.trim_matches('_');
    let stem = if stem.is_empty() { FALLBACK_STEM } else { stem };

    format!("{}_merged.{}", stem, extension.trim_start_matches('.'))
}
