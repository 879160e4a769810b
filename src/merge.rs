//! Cross-source merging of harvested records.
//!
//! Records from all sources are concatenated, annotated with identity keys,
//! sorted by `(doi_id, title_pubyear_id, source rank)`, then merged in two
//! grouping passes: first by DOI, then by normalized title+year over the
//! already-merged result. The second pass intentionally links across DOI
//! groups to catch records where the DOI is missing on one side.
//!
//! Within a group the first row after sorting is the base; every other row
//! backfills the base's empty fields. The base's author list is kept verbatim
//! — sources disagree on author affiliations, and the priority order encodes
//! which source is trusted for them.

use crate::identity::{IdentityKeys, SeenIdentities, identity_keys};
use crate::{Record, Result, Source};
use log::info;
use std::collections::HashMap;
use std::hash::Hash;

/// Configuration for the merge pass.
///
/// The priority list decides which source's record becomes the base of a
/// group (lower index wins); sources absent from the list rank after all
/// listed ones. Injectable rather than a crate constant so synthetic
/// orderings can be tested.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Ordered list of sources, most trusted first.
    pub source_priority: Vec<Source>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            source_priority: vec![
                Source::Wos,
                Source::Scopus,
                Source::Openalex,
                Source::Zenodo,
            ],
        }
    }
}

/// Merges per-source record collections into one deduplicated collection.
#[derive(Debug, Default, Clone)]
pub struct Merger {
    config: MergeConfig,
}

#[derive(Debug)]
struct Keyed {
    keys: IdentityKeys,
    rank: usize,
    record: Record,
}

impl Merger {
    /// Creates a merger with the default source priority
    /// (wos, scopus, openalex, zenodo).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the merge configuration.
    #[must_use]
    pub fn with_config(mut self, config: MergeConfig) -> Self {
        self.config = config;
        self
    }

    fn rank(&self, source: Source) -> usize {
        self.config
            .source_priority
            .iter()
            .position(|candidate| *candidate == source)
            .unwrap_or(self.config.source_priority.len())
    }

    /// Merges all input collections into one record per identity group.
    ///
    /// Deterministic for a fixed configuration and input order: output groups
    /// appear in first-occurrence order of the sorted working set. Records
    /// with no DOI all share a single group during the DOI pass; the
    /// title+year pass is the real disambiguator for them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidPubYear`] if any record's year cannot
    /// be coerced to an integer.
    pub fn merge<I>(&self, collections: I) -> Result<Vec<Record>>
    where
        I: IntoIterator,
        I::Item: IntoIterator<Item = Record>,
    {
        let mut seen = SeenIdentities::new();
        let mut keyed = Vec::new();
        for record in collections.into_iter().flatten() {
            let keys = identity_keys(&record, &mut seen)?;
            let rank = self.rank(record.source);
            keyed.push(Keyed { keys, rank, record });
        }
        let input_len = keyed.len();

        keyed.sort_by(|a, b| {
            (&a.keys.doi_id, &a.keys.title_pubyear_id, a.rank).cmp(&(
                &b.keys.doi_id,
                &b.keys.title_pubyear_id,
                b.rank,
            ))
        });

        let merged = fold_groups(keyed, |row| row.keys.doi_id.clone());
        let merged = fold_groups(merged, |row| row.keys.title_pubyear_id.clone());

        info!(
            "merged {} harvested records into {} deduplicated records",
            input_len,
            merged.len()
        );
        Ok(merged.into_iter().map(|row| row.record).collect())
    }
}

/// Groups rows by key, preserving first-occurrence order, and folds each
/// group onto its first row.
fn fold_groups<K, F>(rows: Vec<Keyed>, key_of: F) -> Vec<Keyed>
where
    K: Eq + Hash + Clone,
    F: Fn(&Keyed) -> K,
{
    let mut order: Vec<K> = Vec::new();
    let mut groups: HashMap<K, Vec<Keyed>> = HashMap::new();
    for row in rows {
        let key = key_of(&row);
        let group = groups.entry(key.clone()).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(row);
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .filter_map(fold_group)
        .collect()
}

fn fold_group(group: Vec<Keyed>) -> Option<Keyed> {
    let mut rows = group.into_iter();
    let mut base = rows.next()?;
    for other in rows {
        backfill(&mut base.record, &other.record);
    }
    Some(base)
}

/// Copies `other`'s non-empty fields into `base`'s empty ones. Authors are
/// never touched; the base keeps its own list even when empty.
fn backfill(base: &mut Record, other: &Record) {
    fill_str(&mut base.internal_id, &other.internal_id);
    fill(&mut base.doi, &other.doi);
    fill(&mut base.doctype, &other.doctype);
    fill(&mut base.ifs3_doctype, &other.ifs3_doctype);
    fill(&mut base.ifs3_collection, &other.ifs3_collection);
    fill(&mut base.ifs3_collection_id, &other.ifs3_collection_id);
    fill(&mut base.publisher, &other.publisher);
    fill(&mut base.journal_title, &other.journal_title);
    fill(&mut base.book_title, &other.book_title);
    fill(&mut base.series_title, &other.series_title);
    fill(&mut base.issn, &other.issn);
    fill(&mut base.isbn, &other.isbn);
    fill(&mut base.abstract_text, &other.abstract_text);
    fill(&mut base.funding_info, &other.funding_info);
    fill(&mut base.conference_info, &other.conference_info);
    fill(&mut base.editors, &other.editors);
}

fn fill(dst: &mut Option<String>, src: &Option<String>) {
    let dst_empty = dst.as_deref().is_none_or(|value| value.trim().is_empty());
    let src_filled = src.as_deref().is_some_and(|value| !value.trim().is_empty());
    if dst_empty && src_filled {
        *dst = src.clone();
    }
}

fn fill_str(dst: &mut String, src: &str) {
    if dst.trim().is_empty() && !src.trim().is_empty() {
        *dst = src.to_string();
    }
}
