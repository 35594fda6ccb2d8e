use crate::core::value::Value;
use serde::{Deserialize, Serialize};

/// Per-column descriptor: the name plus the schema-level default that the
/// serializer substitutes when a record carries no value for the column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnModel {
    pub name: String,
    pub default: Option<Value>,
}

impl ColumnModel {
    pub fn new(name: impl Into<String>) -> Self {
        ColumnModel {
            name: name.into(),
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Schema descriptor for one target table. Column order is the declaration
/// order and defines the attribute order used to build COPY column lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableModel {
    pub table_name: String,
    columns: Vec<ColumnModel>,
}

impl TableModel {
    pub fn new(table_name: impl Into<String>) -> Self {
        TableModel {
            table_name: table_name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnModel) -> Self {
        self.columns.push(column);
        self
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_for(&self, name: &str) -> Option<&ColumnModel> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn default_for(&self, name: &str) -> Option<&Value> {
        self.column_for(name).and_then(|c| c.default.as_ref())
    }
}
