//! Load merged CSV files into SQLite, one table per endpoint

use anyhow::{Context, Result};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::convert::{convert_date_columns, convert_hour_columns};
use crate::table::Table;
use crate::types::Endpoint;

/// SQLite column type chosen from a column's values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

/// INTEGER if every non-empty cell is an integer, REAL if every one is a
/// number, TEXT otherwise (including all-empty columns)
pub fn infer_column_type<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ColumnType {
    let mut column_type = None;
    for value in values.flatten() {
        let value_type = if value.parse::<i64>().is_ok() {
            ColumnType::Integer
        } else if value.parse::<f64>().is_ok() {
            ColumnType::Real
        } else {
            return ColumnType::Text;
        };
        column_type = match (column_type, value_type) {
            (Some(ColumnType::Real), _) | (_, ColumnType::Real) => Some(ColumnType::Real),
            _ => Some(ColumnType::Integer),
        };
    }
    column_type.unwrap_or(ColumnType::Text)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Replace `table_name` with the contents of `table`. Returns rows inserted.
pub fn replace_table(conn: &mut Connection, table_name: &str, table: &Table) -> Result<usize> {
    let tx = conn.transaction()?;
    tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table_name)), [])?;

    let definitions: Vec<String> = table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let column_type = infer_column_type(table.column_values(idx));
            format!("{} {}", quote_ident(name), column_type.as_sql())
        })
        .collect();
    tx.execute(
        &format!("CREATE TABLE {} ({})", quote_ident(table_name), definitions.join(", ")),
        [],
    )
    .with_context(|| format!("Failed to create table {}", table_name))?;

    let placeholders: Vec<String> = (1..=table.columns.len()).map(|i| format!("?{}", i)).collect();
    let insert = format!(
        "INSERT INTO {} VALUES ({})",
        quote_ident(table_name),
        placeholders.join(", ")
    );
    {
        let mut stmt = tx.prepare(&insert)?;
        for row in &table.rows {
            stmt.execute(params_from_iter(row.iter().map(|cell| cell.as_deref())))
                .with_context(|| format!("Failed to insert into {}", table_name))?;
        }
    }
    tx.commit()?;
    Ok(table.rows.len())
}

/// Load one endpoint's merged file. Missing or empty files are skipped.
pub fn load_endpoint(conn: &mut Connection, data_dir: &Path, endpoint: &Endpoint) -> Result<Option<usize>> {
    let merged_path = data_dir.join(endpoint.merged_file_name());
    if !merged_path.exists() {
        warn!("Merged file not found for {}", endpoint.label);
        return Ok(None);
    }

    let Some(mut table) = Table::read_csv(&merged_path)? else {
        warn!("Merged file for {} is empty, skipping", endpoint.label);
        return Ok(None);
    };

    convert_date_columns(&mut table);
    convert_hour_columns(&mut table);

    let table_name = endpoint.table_name();
    let rows = replace_table(conn, &table_name, &table)?;
    info!(
        "Exported merged data for {} to {} ({} rows)",
        endpoint.label, table_name, rows
    );
    Ok(Some(rows))
}

/// Load every configured endpoint into the database at `db_path`
pub fn run_load(config: &Config, db_path: &Path) -> Result<usize> {
    let mut conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    let mut loaded = 0;
    for endpoint in &config.endpoints {
        if load_endpoint(&mut conn, &config.data_dir, endpoint)?.is_some() {
            loaded += 1;
        }
    }
    info!("Loaded {} tables into {}", loaded, db_path.display());
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_infer_column_type() {
        let infer = |values: &[Option<&str>]| infer_column_type(values.iter().copied());
        assert_eq!(infer(&[Some("1"), None, Some("-3")]), ColumnType::Integer);
        assert_eq!(infer(&[Some("1"), Some("2.5")]), ColumnType::Real);
        assert_eq!(infer(&[Some("2.5"), Some("1")]), ColumnType::Real);
        assert_eq!(infer(&[Some("1"), Some("x")]), ColumnType::Text);
        assert_eq!(infer(&[None, None]), ColumnType::Text);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("company profiles_data"), "\"company profiles_data\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_load_endpoint_replaces_table() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Endpoint::new("activities", "Activities");
        let merged = dir.path().join("Activities_merged.csv");
        let mut conn = Connection::open_in_memory().unwrap();

        fs::write(
            &merged,
            "id,subject,date_logged,billable\n1,Call,1700000000,5400\n2,,86400,\n",
        )
        .unwrap();
        assert_eq!(load_endpoint(&mut conn, dir.path(), &endpoint).unwrap(), Some(2));

        let (subject, date, hours): (Option<String>, String, f64) = conn
            .query_row(
                "SELECT subject, date_logged, billable FROM activities_data WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(subject.as_deref(), Some("Call"));
        assert_eq!(date, "2023-11-14");
        assert!((hours - 1.5).abs() < 1e-9);

        let empty_subject: Option<String> = conn
            .query_row("SELECT subject FROM activities_data WHERE id = 2", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(empty_subject, None);

        // A second load replaces the table wholesale
        fs::write(&merged, "id,subject\n9,Email\n").unwrap();
        assert_eq!(load_endpoint(&mut conn, dir.path(), &endpoint).unwrap(), Some(1));
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM activities_data", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_load_skips_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = Connection::open_in_memory().unwrap();

        let staff = Endpoint::new("staff", "Staff");
        assert_eq!(load_endpoint(&mut conn, dir.path(), &staff).unwrap(), None);

        fs::write(dir.path().join("Staff_merged.csv"), "").unwrap();
        assert_eq!(load_endpoint(&mut conn, dir.path(), &staff).unwrap(), None);
    }

    #[test]
    fn test_run_load() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("out.db");
        fs::write(dir.path().join("Staff_merged.csv"), "id,name\n1,Ada\n").unwrap();

        let config = Config {
            data_dir: dir.path().to_path_buf(),
            endpoints: vec![Endpoint::new("staff", "Staff"), Endpoint::new("jobs", "Jobs")],
            ..Config::default()
        };
        assert_eq!(run_load(&config, &db_path).unwrap(), 1);

        let conn = Connection::open(&db_path).unwrap();
        let name: String = conn
            .query_row("SELECT name FROM staff_data WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "Ada");
    }
}
