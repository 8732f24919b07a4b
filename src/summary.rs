use serde::Serialize;

use crate::data::{Cohort, DateField, RecordTable};
use crate::errors::CohortError;
use crate::matcher::is_known_nation;

/// Aggregate balance metrics for a selected cohort.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CohortSummary {
    /// Documents labeled positive.
    pub positives: usize,
    /// Documents labeled negative.
    pub negatives: usize,
    /// Positives in the reservation.
    pub reserved_positives: usize,
    /// Negatives in the reservation.
    pub reserved_negatives: usize,
    /// Pairs formed by proximity matching.
    pub matched_pairs: usize,
    /// Mean absolute year gap between matched positives and negatives.
    pub mean_date_gap: Option<f64>,
    /// Share of matched pairs whose genders agree (unknowns count as agreeing).
    pub gender_agreement: Option<f64>,
    /// Share of matched pairs whose nations agree (only `us`/`uk` can disagree).
    pub nation_agreement: Option<f64>,
}

/// Compute balance metrics for `cohort` against the records it was drawn from.
pub fn summarize(
    cohort: &Cohort,
    records: &RecordTable,
    date_field: DateField,
) -> Result<CohortSummary, CohortError> {
    let reserved_positives = cohort.reserved_positives().count();
    let mut gap_total = 0.0;
    let mut gender_agree = 0usize;
    let mut nation_agree = 0usize;

    for pair in &cohort.pairs {
        let positive = records
            .get(&pair.positive)
            .ok_or_else(|| CohortError::UnknownDocument(pair.positive.clone()))?;
        let negative = records
            .get(&pair.negative)
            .ok_or_else(|| CohortError::UnknownDocument(pair.negative.clone()))?;

        let gap = i64::from(positive.date(date_field)) - i64::from(negative.date(date_field));
        gap_total += gap.abs() as f64;
        if agrees(&positive.gender, &negative.gender) {
            gender_agree += 1;
        }
        if nations_agree(&positive.nation, &negative.nation) {
            nation_agree += 1;
        }
    }

    let matched = cohort.pairs.len();
    Ok(CohortSummary {
        positives: cohort.positives().count(),
        negatives: cohort.negatives().count(),
        reserved_positives,
        reserved_negatives: cohort.reservation.len() - reserved_positives,
        matched_pairs: matched,
        mean_date_gap: mean(gap_total, matched),
        gender_agreement: mean(gender_agree as f64, matched),
        nation_agreement: mean(nation_agree as f64, matched),
    })
}

fn agrees(left: &str, right: &str) -> bool {
    left.is_empty() || right.is_empty() || left == right
}

fn nations_agree(left: &str, right: &str) -> bool {
    !(is_known_nation(left) && is_known_nation(right)) || left == right
}

fn mean(total: f64, count: usize) -> Option<f64> {
    (count > 0).then(|| total / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DocumentRecord, MatchedPair};

    fn record(id: &str, year: i32, gender: &str, nation: &str) -> DocumentRecord {
        DocumentRecord::new(id)
            .with_pubdate(year)
            .with_gender(gender)
            .with_nation(nation)
    }

    #[test]
    fn summary_reports_pair_balance() {
        let records: RecordTable = [
            record("p1", 1900, "f", "us"),
            record("p2", 1910, "m", "uk"),
            record("n1", 1902, "f", "us"),
            record("n2", 1910, "f", ""),
        ]
        .into_iter()
        .map(|record| (record.id.clone(), record))
        .collect();

        let mut cohort = Cohort::default();
        for (id, class) in [("p1", 1), ("p2", 1), ("n1", 0), ("n2", 0)] {
            cohort.ids.insert(id.to_string());
            cohort.classes.insert(id.to_string(), class);
        }
        cohort.reservation.extend(["p2".to_string(), "n2".to_string()]);
        cohort.pairs = vec![
            MatchedPair {
                positive: "p1".into(),
                negative: "n1".into(),
                distance: 2.0,
            },
            MatchedPair {
                positive: "p2".into(),
                negative: "n2".into(),
                distance: 0.6,
            },
        ];

        let summary = summarize(&cohort, &records, DateField::PubDate).unwrap();
        assert_eq!(summary.positives, 2);
        assert_eq!(summary.negatives, 2);
        assert_eq!(summary.reserved_positives, 1);
        assert_eq!(summary.reserved_negatives, 1);
        assert_eq!(summary.matched_pairs, 2);
        assert_eq!(summary.mean_date_gap, Some(1.0));
        assert_eq!(summary.gender_agreement, Some(0.5));
        assert_eq!(summary.nation_agreement, Some(1.0));
    }

    #[test]
    fn nations_outside_us_uk_never_disagree() {
        let records: RecordTable = [
            record("p1", 1900, "f", "fr"),
            record("n1", 1900, "f", "us"),
        ]
        .into_iter()
        .map(|record| (record.id.clone(), record))
        .collect();

        let mut cohort = Cohort::default();
        for (id, class) in [("p1", 1), ("n1", 0)] {
            cohort.ids.insert(id.to_string());
            cohort.classes.insert(id.to_string(), class);
        }
        cohort.pairs = vec![MatchedPair {
            positive: "p1".into(),
            negative: "n1".into(),
            distance: 0.0,
        }];

        let summary = summarize(&cohort, &records, DateField::PubDate).unwrap();
        assert_eq!(summary.nation_agreement, Some(1.0));
        assert_eq!(summary.mean_date_gap, Some(0.0));
    }

    #[test]
    fn unmatched_cohort_has_no_pair_metrics() {
        let summary = summarize(&Cohort::default(), &RecordTable::new(), DateField::FirstPub)
            .unwrap();
        assert_eq!(summary.matched_pairs, 0);
        assert!(summary.mean_date_gap.is_none());
        assert!(summary.gender_agreement.is_none());
    }
}
