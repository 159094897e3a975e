//! In-memory CSV tables shared by the extract, merge and load stages

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// A CSV table: ordered column names and rows of optional cells.
///
/// Empty CSV cells are `None`. Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Build a table from API records. Columns are the union of keys in
    /// first-seen order; missing keys and `null` become empty cells.
    pub fn from_records(records: &[Map<String, Value>]) -> Self {
        let mut table = Table::default();
        for record in records {
            for key in record.keys() {
                if table.column_index(key).is_none() {
                    table.columns.push(key.clone());
                }
            }
        }

        for record in records {
            let row = table
                .columns
                .iter()
                .map(|column| record.get(column).and_then(value_to_cell))
                .collect();
            table.rows.push(row);
        }
        table
    }

    /// Append another table, widening the column set as needed
    pub fn append(&mut self, other: Table) {
        let mapping: Vec<usize> = other
            .columns
            .iter()
            .map(|column| match self.column_index(column) {
                Some(idx) => idx,
                None => {
                    self.columns.push(column.clone());
                    for row in &mut self.rows {
                        row.push(None);
                    }
                    self.columns.len() - 1
                }
            })
            .collect();

        for row in other.rows {
            let mut widened = vec![None; self.columns.len()];
            for (cell, &idx) in row.into_iter().zip(&mapping) {
                widened[idx] = cell;
            }
            self.rows.push(widened);
        }
    }

    /// Iterate over the cells of one column
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = Option<&str>> {
        self.rows.iter().map(move |row| row[idx].as_deref())
    }

    /// Read a CSV file. Returns `None` for a file with no header row.
    pub fn read_csv(path: &Path) -> Result<Option<Table>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open CSV: {}", path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header: {}", path.display()))?;
        if headers.is_empty() {
            return Ok(None);
        }

        let mut table = Table::new(headers.iter().map(str::to_string).collect());
        for record in reader.records() {
            let record =
                record.with_context(|| format!("Failed to read CSV row: {}", path.display()))?;
            let row = (0..table.columns.len())
                .map(|i| match record.get(i) {
                    Some("") | None => None,
                    Some(cell) => Some(cell.to_string()),
                })
                .collect();
            table.rows.push(row);
        }
        Ok(Some(table))
    }

    /// Write the table as CSV. A table without columns writes an empty file.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if self.is_empty() {
            fs::write(path, "")
                .with_context(|| format!("Failed to write CSV: {}", path.display()))?;
            return Ok(());
        }

        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create CSV: {}", path.display()))?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write CSV: {}", path.display()))?;
        Ok(())
    }
}

fn value_to_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Vec<Map<String, Value>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_from_records_unions_columns() {
        let table = Table::from_records(&records(json!([
            {"id": 1, "name": "Acme"},
            {"id": 2, "active": true, "tags": ["a", "b"], "name": null}
        ])));

        assert_eq!(table.columns, vec!["id", "name", "active", "tags"]);
        assert_eq!(
            table.rows[0],
            vec![Some("1".into()), Some("Acme".into()), None, None]
        );
        assert_eq!(
            table.rows[1],
            vec![
                Some("2".into()),
                None,
                Some("true".into()),
                Some(r#"["a","b"]"#.into())
            ]
        );
    }

    #[test]
    fn test_append_widens_columns() {
        let mut left = Table::new(vec!["a".into(), "b".into()]);
        left.rows.push(vec![Some("1".into()), Some("2".into())]);

        let mut right = Table::new(vec!["b".into(), "c".into()]);
        right.rows.push(vec![Some("3".into()), Some("4".into())]);

        left.append(right);
        assert_eq!(left.columns, vec!["a", "b", "c"]);
        assert_eq!(left.rows[0], vec![Some("1".into()), Some("2".into()), None]);
        assert_eq!(left.rows[1], vec![None, Some("3".into()), Some("4".into())]);
    }

    #[test]
    fn test_csv_round_trip_keeps_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");

        let mut table = Table::new(vec!["id".into(), "note".into()]);
        table.rows.push(vec![Some("1".into()), None]);
        table.rows.push(vec![Some("2".into()), Some("has, comma".into())]);
        table.write_csv(&path).unwrap();

        assert_eq!(Table::read_csv(&path).unwrap(), Some(table));
    }

    #[test]
    fn test_read_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        Table::default().write_csv(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        assert_eq!(Table::read_csv(&path).unwrap(), None);
    }
}
