//! JSON Lines metadata loading.
//!
//! Each line is an object of catalog columns (`docid`, `date`, `birthdate`,
//! `firstpub`, `gender`, `nationality`, `author`, `title`, `genretags`).
//! Values may be strings or numbers; missing columns read as empty.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::constants::metadata::{
    ANONYMOUS_AUTHOR_PREFIX, BLANK_AUTHOR, COLUMN_AUTHOR, COLUMN_BIRTHDATE, COLUMN_DOCID,
    COLUMN_FIRSTPUB, COLUMN_GENDER, COLUMN_NATION, COLUMN_PUBDATE, COLUMN_TAGS, COLUMN_TITLE,
    NEGATIVE_EXCLUSION_KEY,
};
use crate::data::{DocumentRecord, RecordTable};
use crate::errors::CohortError;
use crate::types::{ColumnName, DocId, Tag, Year};
use crate::utils::{parse_year, split_tags};

/// Column rules that remove rows before they become records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    /// Drop rows whose column equals the value.
    ///
    /// The `negatives` key is not a column rule: its pipe-separated value lists
    /// tags barred from the negative class.
    #[serde(default)]
    pub exclude_if: BTreeMap<ColumnName, String>,
    /// Drop rows whose column differs from the value.
    #[serde(default)]
    pub exclude_if_not: BTreeMap<ColumnName, String>,
    /// Drop rows whose column, read as a year, is below the value.
    #[serde(default)]
    pub exclude_below: BTreeMap<ColumnName, Year>,
    /// Drop rows whose column, read as a year, is above the value.
    #[serde(default)]
    pub exclude_above: BTreeMap<ColumnName, Year>,
}

impl MetadataFilter {
    /// Drop rows whose `column` equals `value`.
    pub fn with_exclude_if(
        mut self,
        column: impl Into<ColumnName>,
        value: impl Into<String>,
    ) -> Self {
        self.exclude_if.insert(column.into(), value.into());
        self
    }

    /// Drop rows whose `column` differs from `value`.
    pub fn with_exclude_if_not(
        mut self,
        column: impl Into<ColumnName>,
        value: impl Into<String>,
    ) -> Self {
        self.exclude_if_not.insert(column.into(), value.into());
        self
    }

    /// Drop rows whose `column`, read as a year, is below `year`.
    pub fn with_exclude_below(mut self, column: impl Into<ColumnName>, year: Year) -> Self {
        self.exclude_below.insert(column.into(), year);
        self
    }

    /// Drop rows whose `column`, read as a year, is above `year`.
    pub fn with_exclude_above(mut self, column: impl Into<ColumnName>, year: Year) -> Self {
        self.exclude_above.insert(column.into(), year);
        self
    }

    /// Tags listed under the `negatives` exclude-if key.
    pub fn negative_exclusion_tags(&self) -> BTreeSet<Tag> {
        self.exclude_if
            .get(NEGATIVE_EXCLUSION_KEY)
            .map(|raw| split_tags(raw).into_iter().collect())
            .unwrap_or_default()
    }

    fn excludes(&self, row: &Map<String, Value>) -> bool {
        self.exclude_if
            .iter()
            .filter(|(column, _)| column.as_str() != NEGATIVE_EXCLUSION_KEY)
            .any(|(column, value)| column_text(row, column) == *value)
            || self
                .exclude_if_not
                .iter()
                .any(|(column, value)| column_text(row, column) != *value)
            || self
                .exclude_below
                .iter()
                .any(|(column, year)| parse_year(column_text(row, column)) < *year)
            || self
                .exclude_above
                .iter()
                .any(|(column, year)| parse_year(column_text(row, column)) > *year)
    }
}

/// Counts gathered while loading metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Rows described in the metadata.
    pub rows_read: usize,
    /// Rows removed by filter rules.
    pub excluded: usize,
    /// Requested ids with no metadata row.
    pub missing_in_metadata: usize,
    /// Metadata rows whose id was not requested.
    pub missing_in_ids: usize,
    /// Records returned.
    pub accepted: usize,
}

/// Records plus load statistics.
#[derive(Clone, Debug, Default)]
pub struct LoadedMetadata {
    /// Accepted records in load order (or id-list order).
    pub records: RecordTable,
    /// Counts gathered while loading.
    pub report: LoadReport,
}

/// Read a document id list, one id per line; blank lines are skipped.
pub fn load_id_list(path: impl AsRef<Path>) -> Result<Vec<DocId>, CohortError> {
    let file = File::open(path.as_ref())?;
    let mut ids = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let id = line.trim();
        if !id.is_empty() {
            ids.push(id.to_string());
        }
    }
    debug!(ids = ids.len(), "loaded id list");
    Ok(ids)
}

/// Load metadata from a JSON Lines file.
///
/// When `ids` is given, only those documents are returned, in that order.
pub fn load_metadata(
    path: impl AsRef<Path>,
    filter: &MetadataFilter,
    ids: Option<&[DocId]>,
) -> Result<LoadedMetadata, CohortError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading metadata");
    let file = File::open(path)?;
    load_metadata_from_reader(BufReader::new(file), filter, ids)
}

/// Load metadata from any buffered reader of JSON Lines.
pub fn load_metadata_from_reader<R: BufRead>(
    reader: R,
    filter: &MetadataFilter,
    ids: Option<&[DocId]>,
) -> Result<LoadedMetadata, CohortError> {
    let mut accepted = RecordTable::new();
    let mut seen: HashSet<DocId> = HashSet::new();
    let mut report = LoadReport::default();
    let mut anonymous = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: Map<String, Value> =
            serde_json::from_str(&line).map_err(|err| CohortError::Metadata {
                line: line_no,
                reason: err.to_string(),
            })?;

        let id = column_text(&row, COLUMN_DOCID).trim().to_string();
        if id.is_empty() {
            return Err(CohortError::Metadata {
                line: line_no,
                reason: format!("missing '{COLUMN_DOCID}'"),
            });
        }
        if !seen.insert(id.clone()) {
            return Err(CohortError::Metadata {
                line: line_no,
                reason: format!("duplicate document id '{id}'"),
            });
        }
        report.rows_read += 1;

        if filter.excludes(&row) {
            debug!(id = %id, "row removed by metadata filter");
            report.excluded += 1;
            continue;
        }

        let record = build_record(id, &row, &mut anonymous);
        accepted.insert(record.id.clone(), record);
    }

    let records = match ids {
        None => accepted,
        Some(ids) => {
            let requested: HashSet<&DocId> = ids.iter().collect();
            report.missing_in_metadata =
                requested.iter().filter(|id| !seen.contains(**id)).count();
            report.missing_in_ids = seen.iter().filter(|id| !requested.contains(id)).count();
            ids.iter()
                .filter_map(|id| accepted.swap_remove(id).map(|record| (id.clone(), record)))
                .collect()
        }
    };
    report.accepted = records.len();

    info!(
        rows = report.rows_read,
        excluded = report.excluded,
        missing_in_metadata = report.missing_in_metadata,
        missing_in_ids = report.missing_in_ids,
        accepted = report.accepted,
        "metadata loaded"
    );
    Ok(LoadedMetadata { records, report })
}

fn build_record(id: DocId, row: &Map<String, Value>, anonymous: &mut usize) -> DocumentRecord {
    let mut author = column_text(row, COLUMN_AUTHOR).trim().to_string();
    if author.is_empty() || author == BLANK_AUTHOR {
        author = format!("{ANONYMOUS_AUTHOR_PREFIX}{anonymous}");
        *anonymous += 1;
    }

    let mut record = DocumentRecord::new(id)
        .with_pubdate(parse_year(column_text(row, COLUMN_PUBDATE)))
        .with_birthdate(parse_year(column_text(row, COLUMN_BIRTHDATE)))
        .with_firstpub(parse_year(column_text(row, COLUMN_FIRSTPUB)))
        .with_gender(column_text(row, COLUMN_GENDER).trim_end())
        .with_nation(column_text(row, COLUMN_NATION))
        .with_author(author)
        .with_title(column_text(row, COLUMN_TITLE))
        .with_tags(split_tags(&column_text(row, COLUMN_TAGS)));
    if record.firstpub == 0 && record.pubdate > 0 {
        record.firstpub = record.pubdate;
    }
    record
}

fn column_text(row: &Map<String, Value>, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    }
}
