use crate::error::SerializeError;
use model::{core::value::Value, records::record::Record, schema::table::TableModel};

/// Resolve one ordered row for a model-driven load. For each column, in
/// column-list order: the record's value wins, then the model's default,
/// then null when the column is declared without a default. A column the
/// model does not know at all is an error, not a silent null.
///
/// Pure: the record is never mutated.
pub fn serialize_row(
    columns: &[String],
    record: &Record,
    model: &TableModel,
) -> Result<Vec<Value>, SerializeError> {
    columns
        .iter()
        .map(|column| match record.get(column) {
            Some(value) => Ok(value.clone()),
            None => match model.column_for(column) {
                Some(descriptor) => Ok(descriptor.default.clone().unwrap_or(Value::Null)),
                None => Err(SerializeError::MissingColumn {
                    column: column.clone(),
                }),
            },
        })
        .collect()
}

/// Raw-load resolution: same two-key record lookup, no model and no
/// default fallback. Unresolved columns become null.
pub fn raw_row(columns: &[String], record: &Record) -> Vec<Value> {
    columns
        .iter()
        .map(|column| record.get(column).cloned().unwrap_or(Value::Null))
        .collect()
}
