use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::CohortError;
use crate::utils::{canonical_nation, normalize_tag};

pub use crate::types::{DocId, Gender, Nation, Tag, Year};

/// Record table keyed by document id, in load order.
pub type RecordTable = IndexMap<DocId, DocumentRecord>;

/// Date attribute that drives date-mode classification, reservation windows, and matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DateField {
    /// Publication date of the volume.
    PubDate,
    /// Birth year of the author.
    BirthDate,
    /// First publication date of the work.
    #[default]
    FirstPub,
}

impl DateField {
    /// Canonical lowercase name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DateField::PubDate => "pubdate",
            DateField::BirthDate => "birthdate",
            DateField::FirstPub => "firstpub",
        }
    }
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateField {
    type Err = CohortError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "pubdate" => Ok(DateField::PubDate),
            "birthdate" => Ok(DateField::BirthDate),
            "firstpub" => Ok(DateField::FirstPub),
            other => Err(CohortError::Configuration(format!(
                "unknown date field '{other}' (expected pubdate, birthdate, or firstpub)"
            ))),
        }
    }
}

/// Per-document metadata consumed by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Stable document identifier.
    pub id: DocId,
    /// Publication year (`0` when unknown).
    pub pubdate: Year,
    /// Author birth year (`0` when unknown).
    pub birthdate: Year,
    /// First publication year (`0` when unknown).
    pub firstpub: Year,
    /// Author gender; empty when unknown.
    pub gender: Gender,
    /// Canonical author nationality; empty when unknown.
    pub nation: Nation,
    /// Author name; blank authors are numbered `anonymousN` at load time.
    pub author: String,
    /// Title of the work.
    pub title: String,
    /// Normalized genre tags.
    pub tagset: BTreeSet<Tag>,
}

impl DocumentRecord {
    /// Create a record with unknown dates and demographics and no tags.
    pub fn new(id: impl Into<DocId>) -> Self {
        Self {
            id: id.into(),
            pubdate: 0,
            birthdate: 0,
            firstpub: 0,
            gender: String::new(),
            nation: String::new(),
            author: String::new(),
            title: String::new(),
            tagset: BTreeSet::new(),
        }
    }

    /// Set the publication year.
    pub fn with_pubdate(mut self, year: Year) -> Self {
        self.pubdate = year;
        self
    }

    /// Set the author's birth year.
    pub fn with_birthdate(mut self, year: Year) -> Self {
        self.birthdate = year;
        self
    }

    /// Set the first publication year.
    pub fn with_firstpub(mut self, year: Year) -> Self {
        self.firstpub = year;
        self
    }

    /// Set the author's gender.
    pub fn with_gender(mut self, gender: impl Into<Gender>) -> Self {
        self.gender = gender.into();
        self
    }

    /// Set the nationality, folding aliases into canonical codes.
    pub fn with_nation(mut self, nation: impl AsRef<str>) -> Self {
        self.nation = canonical_nation(nation);
        self
    }

    /// Set the author name.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Add normalized tags.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.tagset.extend(
            tags.into_iter()
                .map(normalize_tag)
                .filter(|tag| !tag.is_empty()),
        );
        self
    }

    /// Year stored in `field`.
    ///
    /// An unknown `firstpub` falls back to a known `pubdate`.
    pub fn date(&self, field: DateField) -> Year {
        match field {
            DateField::PubDate => self.pubdate,
            DateField::BirthDate => self.birthdate,
            DateField::FirstPub if self.firstpub == 0 && self.pubdate > 0 => self.pubdate,
            DateField::FirstPub => self.firstpub,
        }
    }

    /// True when the tagset contains `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tagset.contains(tag)
    }
}

/// Outcome of classifying one document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassLabel {
    /// Member of the positive class.
    Positive,
    /// Member of the negative (contrast) class.
    Negative,
    /// Excluded from the experiment.
    Drop,
}

/// A positive document paired with the negative chosen as its control.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    /// Positive document.
    pub positive: DocId,
    /// Negative chosen as its control.
    pub negative: DocId,
    /// Weighted proximity distance at the time of matching.
    pub distance: f64,
}

/// Final experiment cohort.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    /// Every selected document id.
    pub ids: BTreeSet<DocId>,
    /// Binary class per id (`1` positive, `0` negative).
    pub classes: BTreeMap<DocId, u8>,
    /// Ids restricted to evaluation; reserved positives plus their matched negatives.
    pub reservation: BTreeSet<DocId>,
    /// Pairs formed by proximity matching, in match order.
    pub pairs: Vec<MatchedPair>,
}

impl Cohort {
    /// Ids labeled positive.
    pub fn positives(&self) -> impl Iterator<Item = &DocId> {
        self.classes
            .iter()
            .filter(|(_, class)| **class == 1)
            .map(|(id, _)| id)
    }

    /// Ids labeled negative.
    pub fn negatives(&self) -> impl Iterator<Item = &DocId> {
        self.classes
            .iter()
            .filter(|(_, class)| **class == 0)
            .map(|(id, _)| id)
    }

    /// Ids the trainer may fit on (everything outside the reservation).
    pub fn training_ids(&self) -> impl Iterator<Item = &DocId> {
        self.ids.iter().filter(|id| !self.reservation.contains(*id))
    }

    /// Reserved ids that are positives.
    pub fn reserved_positives(&self) -> impl Iterator<Item = &DocId> {
        self.reservation
            .iter()
            .filter(|id| self.classes.get(*id) == Some(&1))
    }

    /// Number of selected documents.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
