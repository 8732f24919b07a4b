//! Proximity matching of negative controls to positive documents.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::constants::matching::{DEMOGRAPHIC_PENALTY, KNOWN_NATIONS};
use crate::data::{DateField, DocId, DocumentRecord, MatchedPair};
use crate::errors::CohortError;

/// True for nationalities that can incur a mismatch penalty.
pub fn is_known_nation(nation: &str) -> bool {
    KNOWN_NATIONS.contains(&nation)
}

/// Weighted dissimilarity between a candidate negative and a target positive.
///
/// Absolute year difference, plus a penalty when both genders are known and
/// differ, plus a penalty when both nations are known (`us`/`uk`) and differ.
/// Unknown values never count as a mismatch.
pub fn proximity(
    candidate: &DocumentRecord,
    target: &DocumentRecord,
    date_field: DateField,
) -> f64 {
    let years = i64::from(candidate.date(date_field)) - i64::from(target.date(date_field));
    let mut distance = years.abs() as f64;

    if !candidate.gender.is_empty()
        && !target.gender.is_empty()
        && candidate.gender != target.gender
    {
        distance += DEMOGRAPHIC_PENALTY;
    }
    if is_known_nation(&candidate.nation)
        && is_known_nation(&target.nation)
        && candidate.nation != target.nation
    {
        distance += DEMOGRAPHIC_PENALTY;
    }
    distance
}

/// Index of the candidate nearest to `target`; ties go to the lowest index.
pub fn closest(
    pool: &[&DocumentRecord],
    target: &DocumentRecord,
    date_field: DateField,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, candidate) in pool.iter().enumerate() {
        let distance = proximity(candidate, target, date_field);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((idx, distance)),
        }
    }
    best
}

/// Negative candidates consumed by one matching pass.
///
/// Matched candidates are removed by swap-and-pop, so each negative pairs
/// with at most one positive.
#[derive(Debug, Clone)]
pub struct NegativePool<'a> {
    candidates: Vec<&'a DocumentRecord>,
}

impl<'a> NegativePool<'a> {
    /// Pool in the given order, without shuffling.
    pub fn new(candidates: Vec<&'a DocumentRecord>) -> Self {
        Self { candidates }
    }

    /// Pool shuffled once with `rng`, so demographic ties do not always
    /// resolve against the same underlying order.
    pub fn shuffled<R: Rng + ?Sized>(
        mut candidates: Vec<&'a DocumentRecord>,
        rng: &mut R,
    ) -> Self {
        candidates.shuffle(rng);
        Self { candidates }
    }

    /// Candidates still available.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// True when every candidate has been matched.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Remaining candidates in their current order.
    pub fn candidates(&self) -> &[&'a DocumentRecord] {
        &self.candidates
    }

    /// Remove and return the candidate nearest to `target` with its distance.
    pub fn take_closest(
        &mut self,
        target: &DocumentRecord,
        date_field: DateField,
    ) -> Option<(&'a DocumentRecord, f64)> {
        let (idx, distance) = closest(&self.candidates, target, date_field)?;
        Some((self.candidates.swap_remove(idx), distance))
    }
}

/// Result of matching positives against a pool that may run dry.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Pairs in the order the positives were supplied.
    pub pairs: Vec<MatchedPair>,
    /// Positives left without a negative because the pool was exhausted.
    pub unmatched: Vec<DocId>,
}

/// Match each positive, in the supplied order, to its nearest remaining negative.
///
/// Positives that arrive after the pool is exhausted are reported as unmatched.
pub fn match_available(
    positives: &[&DocumentRecord],
    mut pool: NegativePool<'_>,
    date_field: DateField,
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();
    for positive in positives {
        match pool.take_closest(positive, date_field) {
            Some((negative, distance)) => outcome.pairs.push(MatchedPair {
                positive: positive.id.clone(),
                negative: negative.id.clone(),
                distance,
            }),
            None => outcome.unmatched.push(positive.id.clone()),
        }
    }
    debug!(
        matched = outcome.pairs.len(),
        unmatched = outcome.unmatched.len(),
        remaining = pool.len(),
        "proximity matching finished"
    );
    outcome
}

/// Match every positive, failing when the pool runs out first.
pub fn match_all(
    positives: &[&DocumentRecord],
    pool: NegativePool<'_>,
    date_field: DateField,
) -> Result<Vec<MatchedPair>, CohortError> {
    let outcome = match_available(positives, pool, date_field);
    if let Some(positive) = outcome.unmatched.into_iter().next() {
        return Err(CohortError::InsufficientNegatives {
            positive,
            matched: outcome.pairs.len(),
        });
    }
    Ok(outcome.pairs)
}
