use std::collections::BTreeSet;

use cohorts::config::{ClassCriteria, CohortConfig, DateRange, MatchOrder, ReservationConditions};
use cohorts::data::{Cohort, DateField, DocumentRecord, RecordTable};
use cohorts::{CohortBuilder, CohortRng, DocId};

const GENDERS: [&str; 3] = ["f", "m", ""];
const NATIONS: [&str; 4] = ["us", "uk", "ca", ""];

fn build_record(id: String, idx: i32, tags: &[&str]) -> DocumentRecord {
    DocumentRecord::new(id)
        .with_firstpub(1850 + (idx * 7) % 120)
        .with_gender(GENDERS[idx as usize % GENDERS.len()])
        .with_nation(NATIONS[idx as usize % NATIONS.len()])
        .with_tags(tags.iter().copied())
}

fn corpus() -> RecordTable {
    let mut records = Vec::new();
    for idx in 0..40 {
        let tags: &[&str] = match idx % 8 {
            0 => &["juv"],
            1 => &["sf_loc", "juv"],
            _ => &["sf_loc"],
        };
        records.push(build_record(format!("pos_{idx:03}"), idx, tags));
    }
    for idx in 0..90 {
        let tags: &[&str] = match idx % 15 {
            0 => &["random", "poetry"],
            1 => &["random", "drop"],
            _ => &["random"],
        };
        records.push(build_record(format!("neg_{idx:03}"), idx + 3, tags));
    }
    records
        .into_iter()
        .map(|record| (record.id.clone(), record))
        .collect()
}

fn reserving_config(sizecap: i64) -> CohortConfig {
    CohortConfig::new(ClassCriteria::tags(["sf_loc", "juv"], ["random"]))
        .with_sizecap(sizecap)
        .with_negative_exclusions(["poetry"])
        .with_reservation(ReservationConditions::parse(["juv", "1860", "1950"]).unwrap())
}

fn assert_structural_invariants(cohort: &Cohort) {
    let class_keys: BTreeSet<&DocId> = cohort.classes.keys().collect();
    let ids: BTreeSet<&DocId> = cohort.ids.iter().collect();
    assert_eq!(class_keys, ids, "every selected id carries exactly one class");
    assert!(cohort.classes.values().all(|class| *class <= 1));
    assert!(cohort.reservation.is_subset(&cohort.ids));

    let mut seen_negatives = BTreeSet::new();
    for pair in &cohort.pairs {
        assert_eq!(cohort.classes.get(&pair.positive), Some(&1));
        assert_eq!(cohort.classes.get(&pair.negative), Some(&0));
        assert!(seen_negatives.insert(pair.negative.clone()), "negative reused");
    }
}

#[test]
fn cohorts_hold_structural_invariants_across_seeds() {
    let records = corpus();
    for seed in [0, 1, 7, 42, 1234] {
        for sizecap in [-1, 0, 5, 12, 100] {
            let builder = CohortBuilder::new(reserving_config(sizecap)).unwrap();
            let cohort = builder
                .build(&records, &mut CohortRng::new(seed))
                .unwrap();
            assert_structural_invariants(&cohort);

            let reserved: BTreeSet<&DocId> = cohort.reserved_positives().collect();
            let trainable = cohort.positives().filter(|id| !reserved.contains(id)).count();
            if sizecap > 0 {
                assert!(trainable <= sizecap as usize);
                assert_eq!(cohort.pairs.len(), cohort.positives().count());
            } else {
                assert!(cohort.pairs.is_empty());
            }
        }
    }
}

#[test]
fn excluded_and_dropped_documents_never_selected() {
    let records = corpus();
    let builder = CohortBuilder::new(reserving_config(0)).unwrap();
    let cohort = builder.build(&records, &mut CohortRng::new(5)).unwrap();

    for (id, record) in &records {
        if record.has_tag("drop") || record.has_tag("poetry") {
            assert!(!cohort.ids.contains(id), "{id} should have been removed");
        }
    }
}

#[test]
fn unbounded_sizecap_keeps_all_negatives() {
    let records = corpus();
    let builder = CohortBuilder::new(reserving_config(0)).unwrap();
    let partition = builder.partition(&records);
    let cohort = builder.build(&records, &mut CohortRng::new(9)).unwrap();

    let negatives: BTreeSet<DocId> = cohort.negatives().cloned().collect();
    assert_eq!(negatives, partition.negatives);
    let positives: BTreeSet<DocId> = cohort.positives().cloned().collect();
    assert_eq!(positives, partition.positives);
}

#[test]
fn reserved_positives_are_never_capped() {
    let records = corpus();
    let uncapped = CohortBuilder::new(reserving_config(0))
        .unwrap()
        .build(&records, &mut CohortRng::new(3))
        .unwrap();
    let capped = CohortBuilder::new(reserving_config(2))
        .unwrap()
        .build(&records, &mut CohortRng::new(3))
        .unwrap();

    let before: BTreeSet<&DocId> = uncapped.reserved_positives().collect();
    let after: BTreeSet<&DocId> = capped.reserved_positives().collect();
    assert!(!before.is_empty());
    assert_eq!(before, after);
}

#[test]
fn same_seed_yields_identical_cohort() {
    let records = corpus();
    for order in [MatchOrder::Identifier, MatchOrder::TrainableFirst] {
        let builder =
            CohortBuilder::new(reserving_config(10).with_match_order(order)).unwrap();
        let first = builder.build(&records, &mut CohortRng::new(77)).unwrap();
        let second = builder.build(&records, &mut CohortRng::new(77)).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn different_seeds_change_capped_selection() {
    let records = corpus();
    let builder = CohortBuilder::new(reserving_config(4)).unwrap();
    let selections: BTreeSet<Vec<DocId>> = (0..8)
        .map(|seed| {
            builder
                .build(&records, &mut CohortRng::new(seed))
                .unwrap()
                .positives()
                .cloned()
                .collect()
        })
        .collect();
    assert!(selections.len() > 1);
}

#[test]
fn date_mode_overlap_resolves_positive() {
    let records: RecordTable = (0..30)
        .map(|idx| DocumentRecord::new(format!("doc_{idx:02}")).with_pubdate(1900 + idx))
        .map(|record| (record.id.clone(), record))
        .collect();
    let config = CohortConfig::new(ClassCriteria::dates(
        DateRange::new(1915, 1929),
        DateRange::new(1900, 1920),
    ))
    .with_date_field(DateField::PubDate);
    let cohort = CohortBuilder::new(config)
        .unwrap()
        .build(&records, &mut CohortRng::new(1))
        .unwrap();

    assert_eq!(cohort.positives().count(), 15);
    assert_eq!(cohort.negatives().count(), 15);
    assert_eq!(cohort.classes.get("doc_17"), Some(&1));
}
