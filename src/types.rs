/// Unique document identifier (stable across runs).
/// Example: `mdp.39015012345678`
pub type DocId = String;
/// Normalized genre/category tag attached to a document.
/// Examples: `sf_loc`, `fantasy_oclc`, `random`
pub type Tag = String;
/// Canonical nationality code.
/// Examples: `us`, `uk`, `fr`
pub type Nation = String;
/// Free-form gender value as recorded in metadata.
/// Examples: `f`, `m`, empty when unknown
pub type Gender = String;
/// Integer year value; `0` means unknown.
/// Examples: `1950`, `1887`
pub type Year = i32;
/// Raw reservation condition token before parsing.
/// Examples: `juv`, `1900`, `limit==250`, `donotmatch`
pub type ConditionToken = String;
/// Raw metadata column name.
/// Examples: `gender`, `firstpub`, `genretags`
pub type ColumnName = String;
