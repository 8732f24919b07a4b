use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::reservation::{DATE_WINDOW_TOKENS, LIMIT_PREFIX, NO_MATCH_FLAG};
use crate::data::DateField;
use crate::errors::CohortError;
use crate::types::{ConditionToken, Tag, Year};
use crate::utils::normalize_tag;

/// Inclusive year range used by date-mode classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Earliest year in the range.
    pub min: Year,
    /// Latest year in the range.
    pub max: Year,
}

impl DateRange {
    /// Range from `min` to `max`, both inclusive.
    pub const fn new(min: Year, max: Year) -> Self {
        Self { min, max }
    }

    /// True when `year` lies inside the range, bounds included.
    pub fn contains(&self, year: Year) -> bool {
        year >= self.min && year <= self.max
    }
}

/// Classification mode, without its criteria.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassMode {
    /// Classes defined by genre tags.
    Tag,
    /// Classes defined by date ranges.
    Date,
}

/// Positive/negative class definitions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ClassCriteria {
    /// A document is positive/negative when it carries one of these tags.
    Tag {
        /// Tags marking the positive class.
        positive: BTreeSet<Tag>,
        /// Tags marking the negative class.
        negative: BTreeSet<Tag>,
    },
    /// A document is positive/negative when its date falls in these ranges.
    Date {
        /// Years of the positive class.
        positive: DateRange,
        /// Years of the negative class.
        negative: DateRange,
    },
}

impl ClassCriteria {
    /// Build tag criteria, normalizing every tag.
    pub fn tags<P, N, T, U>(positive: P, negative: N) -> Self
    where
        P: IntoIterator<Item = T>,
        N: IntoIterator<Item = U>,
        T: AsRef<str>,
        U: AsRef<str>,
    {
        ClassCriteria::Tag {
            positive: positive.into_iter().map(normalize_tag).collect(),
            negative: negative.into_iter().map(normalize_tag).collect(),
        }
    }

    /// Build date-range criteria.
    pub fn dates(positive: DateRange, negative: DateRange) -> Self {
        ClassCriteria::Date { positive, negative }
    }

    /// Classification mode of these criteria.
    pub fn mode(&self) -> ClassMode {
        match self {
            ClassCriteria::Tag { .. } => ClassMode::Tag,
            ClassCriteria::Date { .. } => ClassMode::Date,
        }
    }

    /// Positive tags in tag mode; empty in date mode.
    pub fn positive_tags(&self) -> BTreeSet<Tag> {
        match self {
            ClassCriteria::Tag { positive, .. } => positive.clone(),
            ClassCriteria::Date { .. } => BTreeSet::new(),
        }
    }

    fn validate(&self) -> Result<(), CohortError> {
        match self {
            ClassCriteria::Tag { positive, .. } if positive.is_empty() => Err(
                CohortError::Configuration("tag criteria need at least one positive tag".into()),
            ),
            ClassCriteria::Tag { .. } => Ok(()),
            ClassCriteria::Date { positive, negative } => {
                for (name, range) in [("positive", positive), ("negative", negative)] {
                    if range.min > range.max {
                        return Err(CohortError::Configuration(format!(
                            "{name} date range is reversed ({} > {})",
                            range.min, range.max
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

/// One parsed reservation condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationCondition {
    /// Positives carrying this tag (and no other positive tag) are reserved.
    TagExclusion(Tag),
    /// Positives dated outside this inclusive window are reserved.
    DateWindow(Year, Year),
    /// The reservation is down-sampled to at most this many positives.
    SizeLimit(usize),
    /// Reserved positives are not paired with negatives.
    NoMatch,
}

impl fmt::Display for ReservationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationCondition::TagExclusion(tag) => f.write_str(tag),
            ReservationCondition::DateWindow(past, future) => write!(f, "{past},{future}"),
            ReservationCondition::SizeLimit(limit) => write!(f, "{LIMIT_PREFIX}{limit}"),
            ReservationCondition::NoMatch => f.write_str(NO_MATCH_FLAG),
        }
    }
}

/// Parsed set of reservation conditions.
///
/// Raw tokens are classified once: `donotmatch` is the no-match flag,
/// `limit==N` a size limit, all-digit tokens are window bounds (exactly two
/// are required), and everything else is a tag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ConditionToken>", into = "Vec<ConditionToken>")]
pub struct ReservationConditions {
    conditions: Vec<ReservationCondition>,
}

impl ReservationConditions {
    /// Empty condition set: nothing reserved, default window.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build from already-parsed conditions.
    pub fn from_conditions(conditions: Vec<ReservationCondition>) -> Self {
        Self { conditions }
    }

    /// Parse tokens, logging a warning when the date-window tokens are malformed.
    pub fn parse<I, T>(tokens: I) -> Result<Self, CohortError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self::parse_inner(tokens, false)
    }

    /// Parse tokens, rejecting a numeric token count other than zero or two.
    pub fn parse_strict<I, T>(tokens: I) -> Result<Self, CohortError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self::parse_inner(tokens, true)
    }

    fn parse_inner<I, T>(tokens: I, strict: bool) -> Result<Self, CohortError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut conditions = Vec::new();
        let mut years: Vec<Year> = Vec::new();
        let mut numeric_tokens = 0usize;
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() {
                continue;
            }
            if token == NO_MATCH_FLAG {
                conditions.push(ReservationCondition::NoMatch);
            } else if let Some(raw) = token.strip_prefix(LIMIT_PREFIX) {
                let limit = raw.trim().parse::<usize>().map_err(|_| {
                    CohortError::Configuration(format!(
                        "reservation limit '{token}' is not a non-negative integer"
                    ))
                })?;
                conditions.push(ReservationCondition::SizeLimit(limit));
            } else if token.chars().all(|ch| ch.is_ascii_digit()) {
                numeric_tokens += 1;
                match token.parse::<Year>() {
                    Ok(year) => years.push(year),
                    Err(_) if strict => {
                        return Err(CohortError::Configuration(format!(
                            "reservation year '{token}' is out of range"
                        )));
                    }
                    Err(_) => warn!(token, "reservation year is out of range"),
                }
            } else {
                conditions.push(ReservationCondition::TagExclusion(normalize_tag(token)));
            }
        }

        years.sort_unstable();
        if numeric_tokens == DATE_WINDOW_TOKENS && years.len() == DATE_WINDOW_TOKENS {
            conditions.push(ReservationCondition::DateWindow(years[0], years[1]));
        } else if numeric_tokens > 0 {
            let message = format!(
                "reservation conditions hold {} numeric tokens {:?}; a date window needs exactly {}",
                numeric_tokens, years, DATE_WINDOW_TOKENS
            );
            if strict {
                return Err(CohortError::Configuration(message));
            }
            warn!("{message}; falling back to the default window");
        }
        Ok(Self { conditions })
    }

    /// Parsed conditions in token order, date window last.
    pub fn conditions(&self) -> &[ReservationCondition] {
        &self.conditions
    }

    /// Tags that trigger reservation.
    pub fn exclusion_tags(&self) -> BTreeSet<Tag> {
        self.conditions
            .iter()
            .filter_map(|condition| match condition {
                ReservationCondition::TagExclusion(tag) => Some(tag.clone()),
                _ => None,
            })
            .collect()
    }

    /// Configured trainable date window, if any.
    pub fn date_window(&self) -> Option<(Year, Year)> {
        self.conditions.iter().find_map(|condition| match condition {
            ReservationCondition::DateWindow(past, future) => Some((*past, *future)),
            _ => None,
        })
    }

    /// Smallest configured reservation size limit, if any.
    pub fn size_limit(&self) -> Option<usize> {
        self.conditions
            .iter()
            .filter_map(|condition| match condition {
                ReservationCondition::SizeLimit(limit) => Some(*limit),
                _ => None,
            })
            .min()
    }

    /// True when reserved positives are left without matched negatives.
    pub fn no_match(&self) -> bool {
        self.conditions
            .iter()
            .any(|condition| matches!(condition, ReservationCondition::NoMatch))
    }

    /// Render back to raw tokens.
    pub fn to_tokens(&self) -> Vec<ConditionToken> {
        let mut tokens = Vec::new();
        for condition in &self.conditions {
            match condition {
                ReservationCondition::DateWindow(past, future) => {
                    tokens.push(past.to_string());
                    tokens.push(future.to_string());
                }
                other => tokens.push(other.to_string()),
            }
        }
        tokens
    }
}

impl TryFrom<Vec<ConditionToken>> for ReservationConditions {
    type Error = CohortError;

    fn try_from(tokens: Vec<ConditionToken>) -> Result<Self, Self::Error> {
        Self::parse(tokens)
    }
}

impl From<ReservationConditions> for Vec<ConditionToken> {
    fn from(conditions: ReservationConditions) -> Self {
        conditions.to_tokens()
    }
}

/// Order in which retained positives are matched against the negative pool.
///
/// Under distance ties the order decides which positive gets which negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchOrder {
    /// Ascending document id across all retained positives.
    #[default]
    Identifier,
    /// Trainable positives by id, then reserved positives by id.
    TrainableFirst,
}

/// Top-level cohort configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortConfig {
    /// Class definitions (carries the classification mode).
    pub criteria: ClassCriteria,
    /// Maximum trainable positives; `<= 0` disables capping and matching.
    pub sizecap: i64,
    /// Date attribute used by date-mode classification, reservation, and matching.
    #[serde(default)]
    pub date_field: DateField,
    /// Tags that disqualify an otherwise negative document.
    #[serde(default)]
    pub negative_exclusion_tags: BTreeSet<Tag>,
    /// Reservation conditions.
    #[serde(default)]
    pub reservation: ReservationConditions,
    /// Matching order for retained positives.
    #[serde(default)]
    pub match_order: MatchOrder,
    /// Leave positives unpaired instead of failing when the pool runs dry.
    #[serde(default)]
    pub allow_unmatched: bool,
}

impl CohortConfig {
    /// Create a config with no cap, no exclusions, and no reservation.
    pub fn new(criteria: ClassCriteria) -> Self {
        Self {
            criteria,
            sizecap: 0,
            date_field: DateField::default(),
            negative_exclusion_tags: BTreeSet::new(),
            reservation: ReservationConditions::none(),
            match_order: MatchOrder::default(),
            allow_unmatched: false,
        }
    }

    /// Set the trainable positive cap; `<= 0` disables capping and matching.
    pub fn with_sizecap(mut self, sizecap: i64) -> Self {
        self.sizecap = sizecap;
        self
    }

    /// Set the date attribute used across classification, reservation, and matching.
    pub fn with_date_field(mut self, date_field: DateField) -> Self {
        self.date_field = date_field;
        self
    }

    /// Add tags barred from the negative class.
    pub fn with_negative_exclusions<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.negative_exclusion_tags
            .extend(tags.into_iter().map(normalize_tag));
        self
    }

    /// Replace the reservation conditions.
    pub fn with_reservation(mut self, reservation: ReservationConditions) -> Self {
        self.reservation = reservation;
        self
    }

    /// Set the order in which positives claim negatives.
    pub fn with_match_order(mut self, match_order: MatchOrder) -> Self {
        self.match_order = match_order;
        self
    }

    /// Leave positives unpaired instead of failing when the negative pool runs dry.
    pub fn with_allow_unmatched(mut self, allow_unmatched: bool) -> Self {
        self.allow_unmatched = allow_unmatched;
        self
    }

    /// Positive size cap, or `None` when unbounded.
    pub fn cap(&self) -> Option<usize> {
        usize::try_from(self.sizecap).ok().filter(|cap| *cap > 0)
    }

    /// Check criteria consistency.
    pub fn validate(&self) -> Result<(), CohortError> {
        self.criteria.validate()
    }
}
