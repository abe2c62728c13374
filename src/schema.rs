//! Table schema: maps condition field names to database column names.

use crate::error::FilterError;
use sea_query::Iden;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failed to load a schema description from disk. Kept separate from
/// [`FilterError`]: loading happens at startup, compilation per query.
#[derive(Debug, Error)]
pub enum SchemaLoadError {
    #[error("cannot read schema file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse schema file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Column identifier wrapper for sea-query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// A table description the compiler resolves field names against.
///
/// Fields that are not listed do not exist as far as compilation is
/// concerned; [`TableSchema::resolve`] fails with
/// [`FilterError::UnknownField`] for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Database table name.
    table: String,
    /// Condition field name to column name.
    #[serde(default)]
    columns: HashMap<String, String>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: HashMap::new(),
        }
    }

    /// Add a field whose column name differs from the field name.
    pub fn with_column(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.columns.insert(field.into(), column.into());
        self
    }

    /// Add a field whose column is named after it.
    pub fn with_field(self, field: impl Into<String>) -> Self {
        let field = field.into();
        let column = field.clone();
        self.with_column(field, column)
    }

    /// Load a schema from a JSON file of the shape
    /// `{"table": "users", "columns": {"firstName": "first_name"}}`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaLoadError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SchemaLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SchemaLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Table identifier for sea-query `FROM` clauses.
    pub fn table_name(&self) -> ColumnName {
        ColumnName(self.table.clone())
    }

    /// Resolve a condition field to its column.
    pub fn resolve(&self, field: &str) -> Result<ColumnName, FilterError> {
        self.columns
            .get(field)
            .map(|column| ColumnName(column.clone()))
            .ok_or_else(|| FilterError::UnknownField(field.to_string()))
    }
}
