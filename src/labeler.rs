//! Document → class labeling.

use crate::config::ClassCriteria;
use crate::constants::labeling::{DROP_TAG, GENERIC_CONTRAST_MARKER};
use crate::data::{ClassLabel, DateField, DocumentRecord};

/// Classify one document as positive, negative, or dropped.
///
/// A `drop` tag wins over everything. In tag mode a generic contrast tag
/// (one containing `random`) does not conflict with a positive tag, while any
/// other negative tag on a positive document drops it. In date mode the
/// positive range is checked before the negative range, so overlapping ranges
/// resolve to positive.
pub fn classify(
    record: &DocumentRecord,
    criteria: &ClassCriteria,
    date_field: DateField,
) -> ClassLabel {
    if record.has_tag(DROP_TAG) {
        return ClassLabel::Drop;
    }

    let mut positive = false;
    let mut negative = false;

    match criteria {
        ClassCriteria::Tag {
            positive: positive_tags,
            negative: negative_tags,
        } => {
            positive = positive_tags.iter().any(|tag| record.has_tag(tag));
            negative = negative_tags
                .iter()
                .filter(|tag| record.has_tag(tag))
                .any(|tag| !positive || !tag.contains(GENERIC_CONTRAST_MARKER));
        }
        ClassCriteria::Date {
            positive: positive_range,
            negative: negative_range,
        } => {
            let year = record.date(date_field);
            if positive_range.contains(year) {
                positive = true;
            } else if negative_range.contains(year) {
                negative = true;
            }
        }
    }

    match (positive, negative) {
        (true, true) => ClassLabel::Drop,
        (false, true) => ClassLabel::Negative,
        (true, false) => ClassLabel::Positive,
        (false, false) => ClassLabel::Drop,
    }
}
