//! Oracle tables: named, ordered lists of story elements.
//!
//! A table set is loaded from a JSON object of the form
//! `{ "Oracle of Ash": ["element", ...], ... }`. The first non-empty table in
//! document order fixes `rows_per_table`; tables of any other length are kept
//! for raw access but do not take part in sampling.

use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from loading or validating a table set.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Error: JSON file not found at '{}'", path.display())]
    NotFound { path: PathBuf },

    #[error("Error: Could not decode oracle tables from {origin}: {message}")]
    Malformed { origin: String, message: String },

    #[error("Error: No valid rows found in any table of {origin}")]
    Empty { origin: String },

    #[error("Error reading '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single named oracle table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    elements: Vec<String>,
    participating: bool,
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Whether this table's row count matches the set's `rows_per_table`.
    pub fn is_participating(&self) -> bool {
        self.participating
    }
}

/// A validated set of oracle tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSet {
    tables: Vec<Table>,
    rows_per_table: usize,
}

impl TableSet {
    /// Load a table set from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                LoadError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                LoadError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let tables = Self::from_json_str(&content, &format!("'{}'", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            tables = tables.len(),
            participating = tables.participating_count(),
            rows_per_table = tables.rows_per_table,
            "loaded oracle tables"
        );
        Ok(tables)
    }

    /// Parse a table set from JSON text. `origin` names the source in errors.
    pub fn from_json_str(content: &str, origin: &str) -> Result<Self, LoadError> {
        let value: Value = serde_json::from_str(content).map_err(|e| LoadError::Malformed {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;
        Self::from_value(value, origin)
    }

    /// Build a table set from an already-parsed JSON value.
    pub fn from_value(value: Value, origin: &str) -> Result<Self, LoadError> {
        let malformed = |message: String| LoadError::Malformed {
            origin: origin.to_string(),
            message,
        };

        let Value::Object(object) = value else {
            return Err(malformed(format!(
                "expected an object of table name to element list, found {}",
                json_kind(&value)
            )));
        };

        let mut tables = Vec::with_capacity(object.len());
        for (name, entries) in object {
            let Value::Array(entries) = entries else {
                return Err(malformed(format!(
                    "table '{name}' is {}, expected a list of strings",
                    json_kind(&entries)
                )));
            };

            let mut elements = Vec::with_capacity(entries.len());
            for (row, entry) in entries.into_iter().enumerate() {
                match entry {
                    Value::String(element) => elements.push(element),
                    other => {
                        return Err(malformed(format!(
                            "table '{name}' row {row} is {}, expected a string",
                            json_kind(&other)
                        )))
                    }
                }
            }
            tables.push((name, elements));
        }

        Self::from_tables(tables, origin)
    }

    /// Build a table set from `(name, elements)` pairs in order.
    pub fn from_tables<I, S>(tables: I, origin: &str) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (S, Vec<String>)>,
        S: Into<String>,
    {
        let mut collected: Vec<Table> = Vec::new();
        for (name, elements) in tables {
            let name = name.into();
            if collected.iter().any(|t| t.name == name) {
                return Err(LoadError::Malformed {
                    origin: origin.to_string(),
                    message: format!("duplicate table name '{name}'"),
                });
            }
            collected.push(Table {
                name,
                elements,
                participating: false,
            });
        }

        let rows_per_table = collected
            .iter()
            .map(Table::len)
            .find(|&len| len > 0)
            .ok_or_else(|| LoadError::Empty {
                origin: origin.to_string(),
            })?;

        for table in &mut collected {
            table.participating = table.len() == rows_per_table;
            if !table.participating {
                tracing::warn!(
                    table = %table.name,
                    rows = table.len(),
                    expected = rows_per_table,
                    "table excluded from sampling: row count differs"
                );
            }
        }

        Ok(Self {
            tables: collected,
            rows_per_table,
        })
    }

    /// Write the table set as pretty-printed JSON, creating parent directories.
    pub async fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&self.to_value())?;
        fs::write(path, content).await?;
        tracing::info!(path = %path.display(), tables = self.len(), "saved oracle tables");
        Ok(())
    }

    /// The set as a JSON object, tables in their original order.
    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(self.tables.len());
        for table in &self.tables {
            object.insert(
                table.name.clone(),
                Value::Array(table.elements.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(object)
    }

    /// Row count shared by every participating table.
    pub fn rows_per_table(&self) -> usize {
        self.rows_per_table
    }

    /// Number of tables, participating or not.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(Table::name)
    }

    /// Raw access to a table's elements, participating or not.
    pub fn table(&self, name: &str) -> Option<&[String]> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .map(Table::elements)
    }

    pub fn is_participating(&self, name: &str) -> bool {
        self.tables
            .iter()
            .any(|t| t.name == name && t.participating)
    }

    /// Tables that take part in sampling, in document order.
    pub fn participating(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().filter(|t| t.participating)
    }

    pub fn participating_count(&self) -> usize {
        self.participating().count()
    }

    /// Distinct (table, row) pairs available to the sampler.
    pub fn total_combinations(&self) -> usize {
        self.participating_count() * self.rows_per_table
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
