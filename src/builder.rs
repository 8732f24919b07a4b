//! Cohort assembly: classification, reservation, size caps, and negative selection.

use std::collections::BTreeSet;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::{ClassMode, CohortConfig, MatchOrder};
use crate::data::{ClassLabel, Cohort, DocId, DocumentRecord, MatchedPair, RecordTable};
use crate::errors::CohortError;
use crate::labeler::classify;
use crate::matcher::{NegativePool, match_available};
use crate::reservation::reserve;
use crate::rng::sample_ids;

/// Every document sorted into a class before reservation and capping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassPartition {
    /// Documents labeled `Positive`.
    pub positives: BTreeSet<DocId>,
    /// Documents labeled `Negative` that survived the exclusion tags.
    pub negatives: BTreeSet<DocId>,
    /// Negatives discarded because they carry a negative-exclusion tag.
    pub excluded_negatives: usize,
    /// Documents labeled `Drop`.
    pub dropped: usize,
}

/// Builds experiment cohorts from a record table.
#[derive(Clone, Debug)]
pub struct CohortBuilder {
    config: CohortConfig,
}

impl CohortBuilder {
    /// Create a builder after validating `config`.
    pub fn new(config: CohortConfig) -> Result<Self, CohortError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Validated configuration driving this builder.
    pub fn config(&self) -> &CohortConfig {
        &self.config
    }

    /// Classify every record, discarding negatives that carry an exclusion tag.
    pub fn partition(&self, records: &RecordTable) -> ClassPartition {
        let mut partition = ClassPartition::default();
        for (id, record) in records {
            match classify(record, &self.config.criteria, self.config.date_field) {
                ClassLabel::Positive => {
                    partition.positives.insert(id.clone());
                }
                ClassLabel::Negative => {
                    let excluded = self
                        .config
                        .negative_exclusion_tags
                        .iter()
                        .any(|tag| record.has_tag(tag));
                    if excluded {
                        partition.excluded_negatives += 1;
                    } else {
                        partition.negatives.insert(id.clone());
                    }
                }
                ClassLabel::Drop => partition.dropped += 1,
            }
        }
        debug!(
            positives = partition.positives.len(),
            negatives = partition.negatives.len(),
            excluded_negatives = partition.excluded_negatives,
            dropped = partition.dropped,
            "classified records"
        );
        partition
    }

    /// Select the cohort, drawing every random decision from `rng`.
    pub fn build<R: Rng + ?Sized>(
        &self,
        records: &RecordTable,
        rng: &mut R,
    ) -> Result<Cohort, CohortError> {
        let config = &self.config;
        let partition = self.partition(records);

        let mut reservation = reserve(
            &partition.positives,
            &config.criteria.positive_tags(),
            records,
            &config.reservation,
            config.date_field,
            rng,
        )?;

        let trainable: BTreeSet<DocId> = partition
            .positives
            .difference(&reservation)
            .cloned()
            .collect();
        let sampled_trainable = match config.cap() {
            Some(cap) if trainable.len() > cap => sample_ids(&trainable, cap, rng),
            _ => trainable,
        };
        debug!(
            trainable = sampled_trainable.len(),
            reserved = reservation.len(),
            "selected positives"
        );

        let final_positives: BTreeSet<DocId> =
            sampled_trainable.union(&reservation).cloned().collect();

        let mut pairs = Vec::new();
        let negatives: BTreeSet<DocId> = match (config.criteria.mode(), config.cap()) {
            (ClassMode::Tag, Some(_)) => {
                let order = self.match_sequence(&sampled_trainable, &reservation);
                pairs = self.match_negatives(&order, &partition.negatives, records, rng)?;
                for pair in &pairs {
                    if reservation.contains(&pair.positive) {
                        reservation.insert(pair.negative.clone());
                    }
                }
                pairs.iter().map(|pair| pair.negative.clone()).collect()
            }
            (ClassMode::Date, Some(cap)) => sample_ids(&partition.negatives, cap, rng),
            (_, None) => partition.negatives.clone(),
        };

        info!(
            positives = final_positives.len(),
            negatives = negatives.len(),
            reserved = reservation.len(),
            "cohort selected"
        );

        let mut cohort = Cohort {
            reservation,
            pairs,
            ..Cohort::default()
        };
        for id in final_positives {
            cohort.ids.insert(id.clone());
            cohort.classes.insert(id, 1);
        }
        for id in negatives {
            cohort.ids.insert(id.clone());
            cohort.classes.insert(id, 0);
        }
        Ok(cohort)
    }

    /// Positives that need a matched negative, in the configured order.
    fn match_sequence(
        &self,
        trainable: &BTreeSet<DocId>,
        reservation: &BTreeSet<DocId>,
    ) -> Vec<DocId> {
        let skip_reserved = self.config.reservation.no_match();
        let reserved = reservation.iter().filter(|_| !skip_reserved);
        match self.config.match_order {
            MatchOrder::Identifier => {
                let mut merged: BTreeSet<&DocId> = trainable.iter().collect();
                merged.extend(reserved);
                merged.into_iter().cloned().collect()
            }
            MatchOrder::TrainableFirst => trainable.iter().chain(reserved).cloned().collect(),
        }
    }

    fn match_negatives<R: Rng + ?Sized>(
        &self,
        order: &[DocId],
        negatives: &BTreeSet<DocId>,
        records: &RecordTable,
        rng: &mut R,
    ) -> Result<Vec<MatchedPair>, CohortError> {
        let positives = lookup(order.iter(), records)?;
        let pool = NegativePool::shuffled(lookup(negatives.iter(), records)?, rng);
        let outcome = match_available(&positives, pool, self.config.date_field);

        if let Some(first) = outcome.unmatched.first() {
            if !self.config.allow_unmatched {
                return Err(CohortError::InsufficientNegatives {
                    positive: first.clone(),
                    matched: outcome.pairs.len(),
                });
            }
            warn!(
                unmatched = outcome.unmatched.len(),
                "negative pool exhausted; leaving positives unmatched"
            );
        }
        Ok(outcome.pairs)
    }
}

fn lookup<'a, 'i>(
    ids: impl Iterator<Item = &'i DocId>,
    records: &'a RecordTable,
) -> Result<Vec<&'a DocumentRecord>, CohortError> {
    ids.map(|id| {
        records
            .get(id)
            .ok_or_else(|| CohortError::UnknownDocument(id.clone()))
    })
    .collect()
}
