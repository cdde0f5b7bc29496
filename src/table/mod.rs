// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The tabular unit that flows between workflow steps.
//!
//! A [`Table`] is an ordered list of column names plus rows of JSON values.
//! Graph-valued columns carry the graph document as a JSON string so every
//! table can be checkpointed with the [`parquet`] codec and reloaded by a
//! later run.

pub mod csv;
pub mod jsonl;
pub mod parquet;

use crate::errors::TableError;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty table with a fixed schema.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Columns are taken in first-seen order across `rows`.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut table = Self::new();
        for row in rows {
            table.push(row);
        }
        table
    }

    /// Appends `row`, registering any column the table has not seen yet.
    pub fn push(&mut self, row: Row) {
        for key in row.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn require_column(&self, column: &str) -> Result<(), TableError> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(TableError::MissingColumn {
                column: column.to_string(),
            })
        }
    }

    /// Cell `column` of row `row` as text; strings only.
    pub fn str_at(&self, row: usize, column: &str) -> Result<&str, TableError> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(Value::as_str)
            .ok_or_else(|| TableError::InvalidCell {
                column: column.to_string(),
                row,
                expected: "string",
            })
    }

    /// Keeps `columns`, in the order given.
    pub fn select(&self, columns: &[String]) -> Result<Table, TableError> {
        for column in columns {
            self.require_column(column)?;
        }
        let rows = self
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect();
        Ok(Table {
            columns: columns.to_vec(),
            rows,
        })
    }

    /// Renames columns `from -> to`; unmapped columns are kept.
    pub fn rename(&self, mapping: &BTreeMap<String, String>) -> Result<Table, TableError> {
        for from in mapping.keys() {
            self.require_column(from)?;
        }
        let renamed = |c: &String| mapping.get(c).cloned().unwrap_or_else(|| c.clone());
        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().map(|(k, v)| (renamed(k), v.clone())).collect())
            .collect();
        let mut seen = HashSet::new();
        let columns = self
            .columns
            .iter()
            .map(renamed)
            .filter(|c| seen.insert(c.clone()))
            .collect();
        Ok(Table { columns, rows })
    }

    /// Stacks `tables` vertically; the schema is the union in first-seen order.
    pub fn concat<'a, I>(tables: I) -> Table
    where
        I: IntoIterator<Item = &'a Table>,
    {
        let mut combined = Table::new();
        for table in tables {
            for column in &table.columns {
                if !combined.has_column(column) {
                    combined.columns.push(column.clone());
                }
            }
            combined.rows.extend(table.rows.iter().cloned());
        }
        combined
    }

    /// Approximate in-memory size: the length of every cell serialized as JSON.
    pub fn approx_bytes(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.values())
            .map(|v| match v {
                Value::String(s) => s.len(),
                other => other.to_string().len(),
            })
            .sum()
    }
}

/// Builds a [`Row`] from `key => value` pairs.
#[macro_export]
macro_rules! row {
    ($($key:expr => $value:tt),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut row = $crate::table::Row::new();
        $(row.insert($key.to_string(), serde_json::json!($value));)*
        row
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use serde_json::json;

    fn sample() -> Table {
        Table::from_rows(vec![
            row! {"id" => "1", "text" => "alpha"},
            row! {"id" => "2", "text" => "beta", "extra" => 3},
        ])
    }

    #[test]
    fn test_columns_follow_first_seen_order() {
        assert_eq!(sample().columns(), &["id", "text", "extra"]);
    }

    #[test]
    fn test_select_and_rename() {
        let table = sample();
        let selected = table.select(&["text".to_string()]).unwrap();
        assert_eq!(selected.columns(), &["text"]);
        assert_eq!(selected.rows()[1]["text"], json!("beta"));

        let mapping = BTreeMap::from([("text".to_string(), "body".to_string())]);
        let renamed = table.rename(&mapping).unwrap();
        assert_eq!(renamed.columns(), &["id", "body", "extra"]);
        assert_eq!(renamed.str_at(0, "body").unwrap(), "alpha");

        assert!(matches!(
            table.select(&["missing".to_string()]),
            Err(TableError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_concat_unions_schema() {
        let other = Table::from_rows(vec![row! {"id" => "3", "score" => 0.5}]);
        let combined = Table::concat([&sample(), &other]);
        assert_eq!(combined.len(), 3);
        assert_eq!(combined.columns(), &["id", "text", "extra", "score"]);
    }

    #[test]
    fn test_str_at_rejects_non_strings() {
        let table = sample();
        assert!(matches!(
            table.str_at(1, "extra"),
            Err(TableError::InvalidCell { row: 1, .. })
        ));
    }
}
