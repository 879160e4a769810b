//! Title normalization and identifier cleanup.
//!
//! Both the identity-key generator and the duplicate-query builder compare
//! titles through [`normalize_title`], so the two stages agree on what "the
//! same title" means.

use crate::Source;
use crate::regex::Regex;
use std::sync::LazyLock;

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static NON_WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const OPENALEX_URL_PREFIX: &str = "https://openalex.org/";

/// Canonicalizes a title for comparison.
///
/// Strips HTML/XML tags, replaces non-word characters with spaces, collapses
/// runs of whitespace, trims, lowercases, and finally strips remaining ASCII
/// punctuation (the word-character class keeps underscores that the first
/// replacement leaves behind). Total and deterministic; normalizing an
/// already-normalized title is a no-op.
pub fn normalize_title(title: &str) -> String {
    let stripped = TAG_REGEX.replace_all(title, "");
    let spaced = NON_WORD_REGEX.replace_all(&stripped, " ");
    let collapsed = WHITESPACE_REGEX.replace_all(&spaced, " ");
    collapsed
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect()
}

/// Derives the bare repository identifier from a source-specific internal id
/// by stripping the source's prefix.
///
/// Sources without a known prefix pass through trimmed; a missing prefix is
/// a data-quality anomaly, never an error.
pub fn bare_identifier(source: Source, internal_id: &str) -> String {
    let id = internal_id.trim();
    let bare = match source {
        Source::Wos => id.strip_prefix("WOS:").unwrap_or(id),
        Source::Scopus => id.strip_prefix("SCOPUS_ID:").unwrap_or(id),
        Source::Openalex => id.strip_prefix(OPENALEX_URL_PREFIX).unwrap_or(id),
        Source::Zenodo | Source::Datacite | Source::Crossref => id,
    };
    bare.trim().to_string()
}
