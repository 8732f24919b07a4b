#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command-line runner for cohort selection.
pub mod app;
/// Class partitioning, capping, reservation, and matching pipeline.
pub mod builder;
/// Class criteria, reservation conditions, and cohort configuration.
pub mod config;
/// Centralized constants used across labeling, reservation, and matching.
pub mod constants;
/// Document records and cohort output types.
pub mod data;
/// Single-record class assignment.
pub mod labeler;
/// Proximity matching of negatives to positives.
pub mod matcher;
/// JSON Lines metadata loading and row filters.
pub mod metadata;
/// Evaluation-only reservation of positives.
pub mod reservation;
/// Deterministic RNG and id sampling helpers.
pub mod rng;
/// Balance metrics for selected cohorts.
pub mod summary;
/// Shared type aliases.
pub mod types;
/// Text and field normalization helpers.
pub mod utils;

mod errors;

pub use builder::{ClassPartition, CohortBuilder};
pub use config::{
    ClassCriteria, ClassMode, CohortConfig, DateRange, MatchOrder, ReservationCondition,
    ReservationConditions,
};
pub use data::{ClassLabel, Cohort, DateField, DocumentRecord, MatchedPair, RecordTable};
pub use errors::CohortError;
pub use labeler::classify;
pub use matcher::{MatchOutcome, NegativePool, closest, match_all, match_available, proximity};
pub use metadata::{
    LoadReport, LoadedMetadata, MetadataFilter, load_metadata, load_metadata_from_reader,
};
pub use reservation::reserve;
pub use rng::{CohortRng, sample_ids};
pub use summary::{CohortSummary, summarize};
pub use types::{ColumnName, ConditionToken, DocId, Gender, Nation, Tag, Year};
