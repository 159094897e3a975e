//! Merge an endpoint's page files into one CSV

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::convert::convert_date_columns;
use crate::reshape::reshape_file;
use crate::table::Table;
use crate::types::Endpoint;

/// List the CSV files in a directory ordered by page number, then by name
pub fn page_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "csv"))
        .collect();

    files.sort_by_key(|path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let page = page_number(&name);
        (page.is_none(), page, name)
    });
    Ok(files)
}

/// Page number from a name like "jobs_data_page_12.csv"
fn page_number(file_name: &str) -> Option<u64> {
    let stem = file_name.strip_suffix(".csv")?;
    let (_, number) = stem.rsplit_once("_page_")?;
    number.parse().ok()
}

/// Concatenate the page files of one endpoint into `<data_dir>/<label>_merged.csv`.
///
/// Empty page files are skipped. Returns the merged file path, or `None` when
/// the endpoint has no page directory.
pub fn merge_endpoint(data_dir: &Path, endpoint: &Endpoint) -> Result<Option<PathBuf>> {
    info!("Started processing {}", endpoint.label);
    let endpoint_dir = data_dir.join(endpoint.label);
    if !endpoint_dir.is_dir() {
        warn!("Directory not found for {}", endpoint.label);
        return Ok(None);
    }

    let mut merged = Table::default();
    for path in page_files(&endpoint_dir)? {
        debug!("Reading {}", path.display());
        match Table::read_csv(&path)? {
            Some(table) => merged.append(table),
            None => debug!("Skipping empty file {}", path.display()),
        }
    }

    convert_date_columns(&mut merged);

    let merged_path = data_dir.join(endpoint.merged_file_name());
    merged.write_csv(&merged_path)?;
    info!(
        "Merged {} rows for {} into {}",
        merged.rows.len(),
        endpoint.label,
        merged_path.display()
    );
    Ok(Some(merged_path))
}

/// Merge every endpoint, then pivot the profile endpoints in place
pub fn run_merge(config: &Config) -> Result<Vec<PathBuf>> {
    let mut merged_files = Vec::new();
    for endpoint in &config.endpoints {
        let Some(path) = merge_endpoint(&config.data_dir, endpoint)? else {
            continue;
        };
        if let Some(attributes) = endpoint.profile_attributes {
            reshape_file(&path, attributes);
        }
        merged_files.push(path);
    }
    Ok(merged_files)
}
