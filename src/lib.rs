//! Deduplicate, merge, and split bibliographic records harvested from multiple sources.
//!
//! `bibmerge` is the record-reconciliation engine of an institutional publication
//! import pipeline. Harvester clients (Web of Science, Scopus, OpenAlex, Zenodo,
//! DataCite, Crossref — all external to this crate) each yield their own view of
//! the same publications; this crate collapses those views into one canonical
//! record per publication, filters out records already present in the target
//! repository, and explodes the survivors into flat metadata and author tables
//! ready for loading.
//!
//! # Key Features
//!
//! - **Cross-source merging**: records sharing a DOI or a normalized
//!   title+year are grouped and merged, with empty fields backfilled from
//!   lower-priority duplicates while the highest-priority source's author
//!   list is kept verbatim.
//! - **Fuzzy identity matching**: a token-set similarity pass catches near
//!   identical titles within a ±1 year window.
//! - **Repository duplicate filtering**: a disjunctive fuzzy query (source
//!   identifier OR title+year window OR DOI) is checked against two search
//!   scopes of the target repository through the [`RepositorySearch`] seam.
//! - **Table splitting**: deduplicated records become a publication-metadata
//!   table and an author-affiliation table joined by a synthetic `row_id`.
//!
//! # Basic Usage
//!
//! ```rust
//! use bibmerge::{Record, Source, PubYear, AuthorRef};
//! use bibmerge::merge::Merger;
//!
//! let wos = Record {
//!     source: Source::Wos,
//!     internal_id: "WOS:000123".into(),
//!     doi: Some("10.1234/example".into()),
//!     title: "Example Title".into(),
//!     pubyear: PubYear::Year(2024),
//!     authors: vec![AuthorRef {
//!         author: "Doe, Jane".into(),
//!         ..Default::default()
//!     }],
//!     ..Default::default()
//! };
//! let scopus = Record {
//!     source: Source::Scopus,
//!     internal_id: "SCOPUS_ID:456".into(),
//!     doi: Some("10.1234/example".into()),
//!     title: "Example Title".into(),
//!     pubyear: PubYear::Year(2024),
//!     abstract_text: Some("An abstract.".into()),
//!     ..Default::default()
//! };
//!
//! let merged = Merger::new().merge([vec![wos], vec![scopus]])?;
//! assert_eq!(merged.len(), 1);
//! // WoS wins the tie; the Scopus abstract is backfilled.
//! assert_eq!(merged[0].source, Source::Wos);
//! assert_eq!(merged[0].abstract_text.as_deref(), Some("An abstract."));
//! # Ok::<(), bibmerge::Error>(())
//! ```
//!
//! # Error Handling
//!
//! The crate uses a custom [`Result`] type wrapping [`Error`]. Precondition
//! violations (a non-numeric publication year) are fatal for the offending
//! record and propagate to the caller; search-backend failures from the
//! [`RepositorySearch`] collaborator propagate unmodified — retry policy
//! belongs to the collaborator, not to this crate.
//!
//! # Thread Safety
//!
//! The pipeline is a single forward pass. The fuzzy identity step is
//! deliberately sequential and order-dependent (see [`identity::SeenIdentities`]);
//! everything else is stateless per record.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod identity;
pub mod merge;
pub mod normalize;
mod regex;
pub mod repository;
pub mod split;

// Reexports
pub use merge::{MergeConfig, Merger};
pub use repository::{DuplicateFilter, Partition, RepositorySearch, SearchScope};
pub use split::{AuthorRow, MetadataRow, split};

/// A specialized Result type for deduplication operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents errors that can occur while merging or filtering records.
#[derive(Error, Debug)]
pub enum Error {
    /// The record's publication year could not be coerced to an integer.
    /// Fatal for the record: dropping it silently would corrupt `row_id`
    /// continuity downstream.
    #[error("invalid publication year: {0:?}")]
    InvalidPubYear(String),

    /// The repository search collaborator failed.
    #[error("repository search failed: {0}")]
    Search(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps a search-backend error for propagation out of the filter loop.
    pub fn search(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Search(err.into())
    }
}

/// Provenance of a harvested record, also the tie-break priority key.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Wos,
    Scopus,
    Openalex,
    Zenodo,
    Datacite,
    Crossref,
}

impl Source {
    /// The lowercase name used in harvester payloads and output tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Wos => "wos",
            Source::Scopus => "scopus",
            Source::Openalex => "openalex",
            Source::Zenodo => "zenodo",
            Source::Datacite => "datacite",
            Source::Crossref => "crossref",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A publication year as delivered by a harvester: either an integer or a
/// numeric string, depending on the source payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PubYear {
    Year(i32),
    Raw(String),
}

impl PubYear {
    /// Coerces the year to an integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPubYear`] if the raw value is not an integer
    /// in decimal notation.
    pub fn as_year(&self) -> Result<i32> {
        match self {
            PubYear::Year(year) => Ok(*year),
            PubYear::Raw(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::InvalidPubYear(raw.clone())),
        }
    }
}

impl Default for PubYear {
    fn default() -> Self {
        PubYear::Year(0)
    }
}

impl From<i32> for PubYear {
    fn from(year: i32) -> Self {
        PubYear::Year(year)
    }
}

impl From<&str> for PubYear {
    fn from(raw: &str) -> Self {
        PubYear::Raw(raw.to_string())
    }
}

/// One author entry embedded in a [`Record`].
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRef {
    /// Display name as returned by the source.
    pub author: String,
    /// Source-specific author identifier.
    pub internal_author_id: Option<String>,
    /// ORCID identifier.
    pub orcid_id: Option<String>,
    /// Pipe-delimited list of affiliation strings.
    pub organizations: Option<String>,
    pub suborganization: Option<String>,
}

/// One harvested bibliographic item.
///
/// `title` and `pubyear` are always present for records entering the
/// pipeline; harvesters reject records without them upstream. Every other
/// field may be empty — sparse metadata across sources is the normal case
/// this crate exists to reconcile. Empty string and `None` are treated
/// identically as "empty".
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Provenance of the record.
    pub source: Source,
    /// Source-specific unique identifier (`WOS:xxxx`, `SCOPUS_ID:xxxx`,
    /// an OpenAlex URL, ...).
    pub internal_id: String,
    /// DOI, lowercase, without URL prefix.
    pub doi: Option<String>,
    /// Raw title, not yet normalized.
    pub title: String,
    /// Publication year.
    pub pubyear: PubYear,
    /// Source document type.
    pub doctype: Option<String>,
    /// Document type mapped into the repository taxonomy.
    pub ifs3_doctype: Option<String>,
    /// Target collection name in the repository taxonomy.
    pub ifs3_collection: Option<String>,
    /// Target collection identifier in the repository taxonomy.
    pub ifs3_collection_id: Option<String>,
    /// Authors in source order.
    pub authors: Vec<AuthorRef>,
    pub publisher: Option<String>,
    pub journal_title: Option<String>,
    pub book_title: Option<String>,
    pub series_title: Option<String>,
    pub issn: Option<String>,
    pub isbn: Option<String>,
    pub abstract_text: Option<String>,
    pub funding_info: Option<String>,
    pub conference_info: Option<String>,
    pub editors: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_display() {
        let error = Error::InvalidPubYear("20xx".to_string());
        assert_eq!(error.to_string(), "invalid publication year: \"20xx\"");
    }

    #[test]
    fn test_source_roundtrip() {
        let json = serde_json::to_string(&Source::Openalex).unwrap();
        assert_eq!(json, "\"openalex\"");
        let back: Source = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Source::Openalex);
    }

    #[test]
    fn test_pubyear_coercion() {
        assert_eq!(PubYear::Year(2023).as_year().unwrap(), 2023);
        assert_eq!(PubYear::from("2023").as_year().unwrap(), 2023);
        assert_eq!(PubYear::from(" 2023 ").as_year().unwrap(), 2023);
        assert!(PubYear::from("2023.0").as_year().is_err());
        assert!(PubYear::from("n.d.").as_year().is_err());
    }

    #[test]
    fn test_pubyear_untagged_deserialization() {
        let year: PubYear = serde_json::from_str("2021").unwrap();
        assert_eq!(year, PubYear::Year(2021));
        let raw: PubYear = serde_json::from_str("\"2021\"").unwrap();
        assert_eq!(raw, PubYear::Raw("2021".to_string()));
    }

    #[test]
    fn test_full_pipeline() {
        struct KnownDoi;
        impl RepositorySearch for KnownDoi {
            fn hit_count(&self, query: &str, _scope: SearchScope, _limit: usize) -> Result<usize> {
                Ok(usize::from(query.contains("10.1/existing")))
            }
        }

        let wos = Record {
            source: Source::Wos,
            internal_id: "WOS:1".into(),
            doi: Some("10.1/new".into()),
            title: "Cadmium toxicity".into(),
            pubyear: PubYear::Year(2020),
            authors: vec![AuthorRef {
                author: "Doe, Jane".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let scopus_echo = Record {
            source: Source::Scopus,
            internal_id: "SCOPUS_ID:2".into(),
            doi: Some("10.1/new".into()),
            title: "Cadmium Toxicity".into(),
            pubyear: PubYear::Year(2020),
            abstract_text: Some("Foo".into()),
            ..Default::default()
        };
        let existing = Record {
            source: Source::Scopus,
            internal_id: "SCOPUS_ID:3".into(),
            doi: Some("10.1/existing".into()),
            title: "Graphene sensor design".into(),
            pubyear: PubYear::Year(2021),
            ..Default::default()
        };

        let merged = Merger::new()
            .merge([vec![wos], vec![scopus_echo, existing]])
            .unwrap();
        assert_eq!(merged.len(), 2);

        let partition = DuplicateFilter::new(KnownDoi).partition(merged).unwrap();
        assert_eq!(partition.removed.len(), 1);

        let (metadata, authors) = split(partition.kept);
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata[0].row_id, 1);
        assert_eq!(metadata[0].record.abstract_text.as_deref(), Some("Foo"));
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].author, "Doe, Jane");
    }
}
