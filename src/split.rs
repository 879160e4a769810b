//! Splitting deduplicated records into the two output tables.
//!
//! Downstream enrichment and loading consume a publication-metadata table and
//! an author-affiliation table joined by a synthetic `row_id`. The id is
//! assigned here, 1-based, in iteration order over the kept records.

use crate::{Record, Source};
use serde::{Deserialize, Serialize};

/// One row of the publication-metadata table.
///
/// The embedded record's `authors` list has been moved out into
/// [`AuthorRow`]s and is always empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub row_id: usize,
    #[serde(flatten)]
    pub record: Record,
}

/// One row of the author-affiliation table: a single author of a single
/// publication, referencing the metadata table through `row_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRow {
    pub row_id: usize,
    pub source: Source,
    pub author: String,
    pub orcid_id: Option<String>,
    pub internal_author_id: Option<String>,
    pub organizations: Option<String>,
    pub suborganization: Option<String>,
}

/// Explodes `records` into the metadata and author tables.
///
/// Every record appears exactly once in the metadata table; a record with no
/// authors contributes no author rows. `row_id` values form the contiguous
/// range `1..=N`.
pub fn split(records: Vec<Record>) -> (Vec<MetadataRow>, Vec<AuthorRow>) {
    let mut metadata = Vec::with_capacity(records.len());
    let mut authors = Vec::new();

    for (index, mut record) in records.into_iter().enumerate() {
        let row_id = index + 1;
        for entry in std::mem::take(&mut record.authors) {
            authors.push(AuthorRow {
                row_id,
                source: record.source,
                author: entry.author,
                orcid_id: entry.orcid_id,
                internal_author_id: entry.internal_author_id,
                organizations: entry.organizations,
                suborganization: entry.suborganization,
            });
        }
        metadata.push(MetadataRow { row_id, record });
    }

    (metadata, authors)
}
