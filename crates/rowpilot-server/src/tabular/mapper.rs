//! Column mapping
//!
//! Projects a loaded [`Table`] onto target field names. Two modes exist:
//!
//! - **Free selection** ([`map_free`]): any non-empty set of source columns, each
//!   optionally renamed. Output fields follow the order of the selection.
//! - **Fixed schema** ([`map_fixed`]): a configured ordered list of target fields,
//!   each bound to one source column. Output fields follow the schema order.
//!
//! Field names used by the report (`row_number`, `status`, `message`) are reserved.

use std::collections::HashMap;

use rowpilot_common::types::{MappedDataset, MappedRecord, Table};
use rowpilot_common::{Result, RowpilotError};
use serde::{Deserialize, Serialize};

use crate::jobs::report::RESERVED_COLUMNS;

/// One selected source column and the name it takes in the output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSelection {
    pub column: String,
    pub rename: Option<String>,
}

impl ColumnSelection {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            rename: None,
        }
    }

    pub fn renamed(column: impl Into<String>, rename: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            rename: Some(rename.into()),
        }
    }

    /// The output name; a blank rename keeps the source name
    pub fn target_name(&self) -> &str {
        match self.rename.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.column,
        }
    }
}

/// Map with a caller-chosen set of columns
pub fn map_free(table: &Table, selections: &[ColumnSelection]) -> Result<MappedDataset> {
    if selections.is_empty() {
        return Err(RowpilotError::EmptySelection);
    }

    let bindings: Vec<(String, &str)> = selections
        .iter()
        .map(|s| (s.target_name().to_string(), s.column.as_str()))
        .collect();

    project(table, &bindings)
}

/// Map onto a fixed, ordered schema.
///
/// `bindings` maps target field to source column. Every schema field needs a
/// non-blank binding; all missing fields are reported together.
pub fn map_fixed(
    table: &Table,
    schema: &[String],
    bindings: &HashMap<String, String>,
) -> Result<MappedDataset> {
    if schema.is_empty() {
        return Err(RowpilotError::NoFixedSchema);
    }

    let missing: Vec<String> = schema
        .iter()
        .filter(|field| {
            bindings
                .get(*field)
                .map_or(true, |column| column.trim().is_empty())
        })
        .cloned()
        .collect();

    if !missing.is_empty() {
        return Err(RowpilotError::MissingFields(missing));
    }

    let ordered: Vec<(String, &str)> = schema
        .iter()
        .filter_map(|field| {
            bindings
                .get(field)
                .map(|column| (field.clone(), column.trim()))
        })
        .collect();

    project(table, &ordered)
}

fn project(table: &Table, bindings: &[(String, &str)]) -> Result<MappedDataset> {
    let mut fields: Vec<String> = Vec::with_capacity(bindings.len());
    let mut sources = Vec::with_capacity(bindings.len());

    for (target, source) in bindings {
        if RESERVED_COLUMNS.contains(&target.as_str()) {
            return Err(RowpilotError::ReservedField(target.clone()));
        }
        if fields.contains(target) {
            return Err(RowpilotError::DuplicateField(target.clone()));
        }
        let column = table
            .column(source)
            .ok_or_else(|| RowpilotError::UnknownColumn(source.to_string()))?;

        fields.push(target.clone());
        sources.push(column);
    }

    let records = (0..table.row_count())
        .map(|row| {
            MappedRecord::new(
                fields
                    .iter()
                    .zip(&sources)
                    .map(|(field, column)| (field.clone(), column.values[row].clone()))
                    .collect(),
            )
        })
        .collect();

    Ok(MappedDataset::new(fields, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowpilot_common::types::{Column, Scalar};

    fn people() -> Table {
        Table::new(vec![
            Column::new("Nome", vec!["Ana".into(), "Rui".into(), "Eva".into()]),
            Column::new("E-mail", vec!["a@x".into(), "r@x".into(), "e@x".into()]),
            Column::new("Cidade", vec!["Lisboa".into(), "Porto".into(), "Lisboa".into()]),
        ])
        .unwrap()
    }

    fn schema(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_free_selection_renames_and_preserves_order() {
        let dataset = map_free(
            &people(),
            &[
                ColumnSelection::renamed("Cidade", "city"),
                ColumnSelection::renamed("Nome", "name"),
            ],
        )
        .unwrap();

        assert_eq!(dataset.fields, vec!["city", "name"]);
        assert_eq!(dataset.len(), 3);
        for record in &dataset.records {
            assert_eq!(record.len(), 2);
            let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
            assert_eq!(keys, vec!["city", "name"]);
        }
        assert_eq!(dataset.records[1].get("name"), Some(&Scalar::from("Rui")));
    }

    #[test]
    fn test_free_selection_blank_rename_keeps_source_name() {
        let dataset = map_free(&people(), &[ColumnSelection::renamed("Nome", "  ")]).unwrap();
        assert_eq!(dataset.fields, vec!["Nome"]);
    }

    #[test]
    fn test_free_selection_rejects_empty_set() {
        assert!(matches!(
            map_free(&people(), &[]),
            Err(RowpilotError::EmptySelection)
        ));
    }

    #[test]
    fn test_free_selection_rejects_unknown_column() {
        let err = map_free(&people(), &[ColumnSelection::new("Telefone")]).unwrap_err();
        assert!(matches!(err, RowpilotError::UnknownColumn(ref c) if c == "Telefone"));
    }

    #[test]
    fn test_free_selection_rejects_duplicate_targets() {
        let err = map_free(
            &people(),
            &[
                ColumnSelection::renamed("Nome", "who"),
                ColumnSelection::renamed("E-mail", "who"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, RowpilotError::DuplicateField(_)));
    }

    #[test]
    fn test_reserved_names_are_rejected() {
        let err = map_free(&people(), &[ColumnSelection::renamed("Nome", "status")]).unwrap_err();
        assert!(matches!(err, RowpilotError::ReservedField(ref f) if f == "status"));
    }

    #[test]
    fn test_fixed_schema_uses_schema_order() {
        let bindings = HashMap::from([
            ("email".to_string(), "E-mail".to_string()),
            ("name".to_string(), "Nome".to_string()),
        ]);

        let dataset = map_fixed(&people(), &schema(&["name", "email"]), &bindings).unwrap();

        assert_eq!(dataset.fields, vec!["name", "email"]);
        assert_eq!(dataset.records[2].get("email"), Some(&Scalar::from("e@x")));
    }

    #[test]
    fn test_fixed_schema_names_exactly_the_missing_field() {
        let bindings = HashMap::from([
            ("name".to_string(), "Nome".to_string()),
            ("email".to_string(), " ".to_string()),
        ]);

        let err = map_fixed(&people(), &schema(&["name", "email"]), &bindings).unwrap_err();

        match err {
            RowpilotError::MissingFields(fields) => assert_eq!(fields, vec!["email"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_fixed_schema_requires_configuration() {
        assert!(matches!(
            map_fixed(&people(), &[], &HashMap::new()),
            Err(RowpilotError::NoFixedSchema)
        ));
    }
}
