//! Long-to-wide pivot of profile attribute/value rows

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::table::Table;

pub const ENTITY_COLUMN: &str = "link_id";
pub const ATTRIBUTE_COLUMN: &str = "field_name";
pub const VALUE_COLUMN: &str = "value";

/// One (entity, attribute, value) triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRow {
    pub entity_id: String,
    pub attribute: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEntry {
    pub entity_id: String,
    /// Only attributes with a value; absent cells have no key
    pub values: HashMap<String, String>,
}

/// One row per entity, one column per attribute that occurs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileTable {
    pub columns: Vec<String>,
    pub rows: Vec<ProfileEntry>,
}

impl ProfileTable {
    /// Flatten into a CSV table with the entity id as the first column
    pub fn to_table(&self) -> Table {
        let mut columns = vec![ENTITY_COLUMN.to_string()];
        columns.extend(self.columns.iter().cloned());

        let mut table = Table::new(columns);
        for entry in &self.rows {
            let mut row = vec![Some(entry.entity_id.clone())];
            row.extend(self.columns.iter().map(|c| entry.values.get(c).cloned()));
            table.rows.push(row);
        }
        table
    }
}

/// Pivot profile rows into a wide table.
///
/// Only attributes named in `allow_list` are kept (all of them when the list
/// is empty). The first value seen for an (entity, attribute) pair wins and
/// rows without a value are ignored. Columns follow allow-list order and
/// appear only if some entity has a value for them.
pub fn pivot<I>(rows: I, allow_list: &[&str]) -> ProfileTable
where
    I: IntoIterator<Item = ProfileRow>,
{
    let mut order: Vec<String> = Vec::new();
    let mut entities: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut seen_attributes: Vec<String> = Vec::new();

    for row in rows {
        let Some(value) = row.value.filter(|v| !v.is_empty()) else {
            continue;
        };
        if !allow_list.is_empty() && !allow_list.contains(&row.attribute.as_str()) {
            continue;
        }
        if !seen_attributes.contains(&row.attribute) {
            seen_attributes.push(row.attribute.clone());
        }

        let values = entities.entry(row.entity_id.clone()).or_insert_with(|| {
            order.push(row.entity_id.clone());
            HashMap::new()
        });
        values.entry(row.attribute).or_insert(value);
    }

    let columns = if allow_list.is_empty() {
        seen_attributes
    } else {
        allow_list
            .iter()
            .filter(|a| seen_attributes.iter().any(|s| s.as_str() == **a))
            .map(|a| a.to_string())
            .collect()
    };

    sort_entity_ids(&mut order);
    let rows = order
        .into_iter()
        .map(|entity_id| {
            let values = entities.remove(&entity_id).unwrap_or_default();
            ProfileEntry { entity_id, values }
        })
        .collect();

    ProfileTable { columns, rows }
}

/// Numeric order when every id is an integer, lexicographic otherwise
fn sort_entity_ids(ids: &mut [String]) {
    let numeric: Option<Vec<i64>> = ids.iter().map(|id| id.parse().ok()).collect();
    if numeric.is_some() {
        ids.sort_by_key(|id| id.parse::<i64>().unwrap_or_default());
    } else {
        ids.sort();
    }
}

/// Read `link_id`/`field_name`/`value` rows out of a merged table
pub fn profile_rows(table: &Table) -> Result<Vec<ProfileRow>> {
    let index = |name: &str| {
        table
            .column_index(name)
            .with_context(|| format!("missing column '{}'", name))
    };
    let (entity, attribute, value) = (
        index(ENTITY_COLUMN)?,
        index(ATTRIBUTE_COLUMN)?,
        index(VALUE_COLUMN)?,
    );

    Ok(table
        .rows
        .iter()
        .filter_map(|row| {
            Some(ProfileRow {
                entity_id: row[entity].clone()?,
                attribute: row[attribute].clone()?,
                value: row[value].clone(),
            })
        })
        .collect())
}

fn try_reshape_file(path: &Path, allow_list: &[&str]) -> Result<ProfileTable> {
    let table = Table::read_csv(path)?
        .with_context(|| format!("{} is empty", path.display()))?;
    let pivoted = pivot(profile_rows(&table)?, allow_list);
    pivoted.to_table().write_csv(path)?;
    Ok(pivoted)
}

/// Pivot a merged profile CSV in place. Failures are logged and leave the
/// file as it was.
pub fn reshape_file(path: &Path, allow_list: &[&str]) -> Option<ProfileTable> {
    match try_reshape_file(path, allow_list) {
        Ok(pivoted) => {
            info!(
                "Reshaped {} into {} rows with columns [{}]",
                path.display(),
                pivoted.rows.len(),
                pivoted.columns.join(", ")
            );
            Some(pivoted)
        }
        Err(e) => {
            warn!("Error: {:#}. Skipping transformation for {}", e, path.display());
            None
        }
    }
}
