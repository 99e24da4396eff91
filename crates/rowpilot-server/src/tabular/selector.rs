//! Row selection
//!
//! Filters a mapped dataset down to a set of row indices. Indices arrive as
//! strings from the form; anything that is not an integer is rejected, while
//! integers outside `[0, len)` are dropped and reported back to the caller.

use std::collections::BTreeSet;

use rowpilot_common::types::MappedDataset;
use rowpilot_common::{Result, RowpilotError};
use serde::Serialize;

/// Result of applying a selection
#[derive(Debug, Clone, Serialize)]
pub struct SelectionOutcome {
    /// The retained records, in their original order
    pub dataset: MappedDataset,
    /// Indices that matched a record, ascending
    pub selected: Vec<usize>,
    /// Indices that fell outside the dataset, in submission order
    pub ignored: Vec<i64>,
}

/// Parse submitted row indices
pub fn parse_indices<S: AsRef<str>>(raw: &[S]) -> Result<Vec<i64>> {
    raw.iter()
        .map(|value| {
            let value = value.as_ref();
            value
                .trim()
                .parse::<i64>()
                .map_err(|_| RowpilotError::InvalidRowIndex(value.to_string()))
        })
        .collect()
}

/// Keep only the records whose index appears in `indices`.
///
/// Duplicate indices collapse to one record; out-of-range indices are ignored.
pub fn select_rows(dataset: &MappedDataset, indices: &[i64]) -> SelectionOutcome {
    let len = dataset.len();
    let mut wanted = BTreeSet::new();
    let mut ignored = Vec::new();

    for &index in indices {
        match usize::try_from(index) {
            Ok(position) if position < len => {
                wanted.insert(position);
            },
            _ => {
                if !ignored.contains(&index) {
                    ignored.push(index);
                }
            },
        }
    }

    let selected: Vec<usize> = wanted.into_iter().collect();
    let records = selected
        .iter()
        .map(|&position| dataset.records[position].clone())
        .collect();

    SelectionOutcome {
        dataset: MappedDataset::new(dataset.fields.clone(), records),
        selected,
        ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowpilot_common::types::{MappedRecord, Scalar};

    fn dataset(n: i64) -> MappedDataset {
        let records = (0..n)
            .map(|i| MappedRecord::new(vec![("n".to_string(), Scalar::Int(i))]))
            .collect();
        MappedDataset::new(vec!["n".to_string()], records)
    }

    fn values(dataset: &MappedDataset) -> Vec<Scalar> {
        dataset
            .records
            .iter()
            .map(|r| r.get("n").cloned().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_select_first_and_last_of_three() {
        let outcome = select_rows(&dataset(3), &[0, 2]);

        assert_eq!(values(&outcome.dataset), vec![Scalar::Int(0), Scalar::Int(2)]);
        assert_eq!(outcome.selected, vec![0, 2]);
        assert!(outcome.ignored.is_empty());
    }

    #[test]
    fn test_selection_preserves_original_order() {
        let outcome = select_rows(&dataset(5), &[4, 1, 3]);
        assert_eq!(
            values(&outcome.dataset),
            vec![Scalar::Int(1), Scalar::Int(3), Scalar::Int(4)]
        );
    }

    #[test]
    fn test_out_of_range_indices_are_reported_not_fatal() {
        let outcome = select_rows(&dataset(3), &[-1, 1, 3, 99, 3]);

        assert_eq!(outcome.selected, vec![1]);
        assert_eq!(outcome.ignored, vec![-1, 3, 99]);
        assert_eq!(outcome.dataset.len(), 1);
    }

    #[test]
    fn test_duplicates_collapse() {
        let outcome = select_rows(&dataset(3), &[1, 1, 1]);
        assert_eq!(outcome.dataset.len(), 1);
    }

    #[test]
    fn test_empty_selection_keeps_fields() {
        let outcome = select_rows(&dataset(3), &[]);
        assert!(outcome.dataset.is_empty());
        assert_eq!(outcome.dataset.fields, vec!["n"]);
    }

    #[test]
    fn test_parse_indices() {
        assert_eq!(parse_indices(&["0", " 2 ", "-4"]).unwrap(), vec![0, 2, -4]);

        let err = parse_indices(&["1", "two"]).unwrap_err();
        assert!(matches!(err, RowpilotError::InvalidRowIndex(ref v) if v == "two"));
    }
}
