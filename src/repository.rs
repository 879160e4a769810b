//! Duplicate filtering against the target repository.
//!
//! Records that survived cross-source merging may still exist in the
//! repository from an earlier import. Each record is checked with one
//! disjunctive query combining up to three clauses — bare source identifier,
//! normalized title within a ±1 year window, and DOI — against two search
//! scopes: published research outputs and items sitting in the supervision
//! workflow. A hit in either scope marks the record as a duplicate.
//!
//! The search backend is a collaborator behind [`RepositorySearch`]; this
//! module only needs hit counts. Backend failures propagate uncaught — the
//! orchestration layer owns retries.

use crate::normalize::{bare_identifier, normalize_title};
use crate::{Record, Result};
use log::{debug, info};

/// Existence check only: one hit per scope is enough.
const MAX_HITS: usize = 1;

/// The two repository search scopes consulted per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchScope {
    /// Published research outputs.
    ResearchOutputs,
    /// Items still in the supervision/ingest workflow.
    SupervisionWorkflow,
}

/// Search seam to the repository backend.
///
/// Implementations run the query in the given scope and return the number of
/// hits, requesting at most `limit` results from the backend.
pub trait RepositorySearch {
    fn hit_count(&self, query: &str, scope: SearchScope, limit: usize) -> Result<usize>;
}

impl<T: RepositorySearch + ?Sized> RepositorySearch for &T {
    fn hit_count(&self, query: &str, scope: SearchScope, limit: usize) -> Result<usize> {
        (**self).hit_count(query, scope, limit)
    }
}

/// Result of [`DuplicateFilter::partition`]: records to load and records
/// already present, the latter retained for audit and reporting.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Partition {
    pub kept: Vec<Record>,
    pub removed: Vec<Record>,
}

/// Classifies merged records as present-in-repository or new.
#[derive(Debug)]
pub struct DuplicateFilter<S> {
    search: S,
}

impl<S: RepositorySearch> DuplicateFilter<S> {
    pub fn new(search: S) -> Self {
        Self { search }
    }

    /// Returns `true` when the record already exists in either search scope.
    ///
    /// Both scopes are always queried before combining the counts. Repeated
    /// calls against an unchanged repository yield the same answer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidPubYear`] for a non-numeric year and
    /// propagates any [`crate::Error::Search`] from the collaborator.
    pub fn classify(&self, record: &Record) -> Result<bool> {
        let query = duplicate_query(record)?;

        debug!("searching research outputs with query: {query}");
        let outputs = self
            .search
            .hit_count(&query, SearchScope::ResearchOutputs, MAX_HITS)?;

        debug!("searching supervision workflow items with query: {query}");
        let supervision =
            self.search
                .hit_count(&query, SearchScope::SupervisionWorkflow, MAX_HITS)?;

        Ok(outputs > 0 || supervision > 0)
    }

    /// Splits `records` into kept (new) and removed (already present),
    /// preserving input order within each side.
    pub fn partition(&self, records: Vec<Record>) -> Result<Partition> {
        let mut partition = Partition::default();
        for record in records {
            if self.classify(&record)? {
                partition.removed.push(record);
            } else {
                partition.kept.push(record);
            }
        }
        info!(
            "kept {} records, {} already in the repository",
            partition.kept.len(),
            partition.removed.len()
        );
        Ok(partition)
    }
}

/// Builds the disjunctive duplicate query for one record.
///
/// The identifier clause is included only when the bare identifier is
/// non-empty, the DOI clause only when a non-empty DOI is present; the
/// title+year-window clause is always included.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidPubYear`] when the year cannot be coerced
/// to an integer.
pub fn duplicate_query(record: &Record) -> Result<String> {
    let title = normalize_title(&record.title);
    let year = record.pubyear.as_year()?;
    let bare_id = bare_identifier(record.source, &record.internal_id);

    let mut clauses = Vec::with_capacity(3);
    if !bare_id.is_empty() {
        clauses.push(format!("(itemidentifier:\"*{bare_id}*\")"));
    }
    clauses.push(format!(
        "(title:({title}) AND (dateIssued.year:{year} OR dateIssued.year:{} OR dateIssued.year:{}))",
        year - 1,
        year + 1
    ));
    if let Some(doi) = record.doi.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        clauses.push(format!("(itemidentifier:\"*{doi}*\")"));
    }

    Ok(clauses.join(" OR "))
}
