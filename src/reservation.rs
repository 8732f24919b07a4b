//! Evaluation-only reservation of positive documents.

use std::collections::BTreeSet;

use rand::Rng;
use tracing::debug;

use crate::config::ReservationConditions;
use crate::constants::reservation::{DEFAULT_FUTURE_THRESHOLD, DEFAULT_PAST_THRESHOLD};
use crate::data::{DateField, RecordTable};
use crate::errors::CohortError;
use crate::rng::sample_ids;
use crate::types::{DocId, Tag, Year};

/// Trainable date window, defaulting to `(0, 3000)` when none is configured.
pub fn thresholds(conditions: &ReservationConditions) -> (Year, Year) {
    conditions
        .date_window()
        .unwrap_or((DEFAULT_PAST_THRESHOLD, DEFAULT_FUTURE_THRESHOLD))
}

/// Compute the positives that may be evaluated but never trained on.
///
/// A positive is reserved when its date falls outside the trainable window,
/// or when it carries an exclusion tag and no positive tag other than the
/// exclusion tags. A size limit down-samples the result uniformly.
pub fn reserve<R: Rng + ?Sized>(
    positives: &BTreeSet<DocId>,
    positive_tags: &BTreeSet<Tag>,
    records: &RecordTable,
    conditions: &ReservationConditions,
    date_field: DateField,
    rng: &mut R,
) -> Result<BTreeSet<DocId>, CohortError> {
    let (past, future) = thresholds(conditions);
    let exclusion_tags = conditions.exclusion_tags();
    let mut reserved = BTreeSet::new();

    for id in positives {
        let record = records
            .get(id)
            .ok_or_else(|| CohortError::UnknownDocument(id.clone()))?;

        let year = record.date(date_field);
        if year < past || year > future {
            reserved.insert(id.clone());
            continue;
        }

        let has_other_positive = positive_tags
            .iter()
            .any(|tag| record.has_tag(tag) && !exclusion_tags.contains(tag));
        let has_exclusion = exclusion_tags.iter().any(|tag| record.has_tag(tag));
        if has_exclusion && !has_other_positive {
            reserved.insert(id.clone());
        }
    }

    if let Some(limit) = conditions.size_limit()
        && limit < reserved.len()
    {
        debug!(
            reserved = reserved.len(),
            limit, "down-sampling reservation to its size limit"
        );
        reserved = sample_ids(&reserved, limit, rng);
    }

    Ok(reserved)
}
