//! Drain each endpoint into per-page CSV files

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

use crate::client::PageSource;
use crate::config::Config;
use crate::pager::{count_pages, PageCount};
use crate::table::Table;
use crate::types::Endpoint;

/// Outcome of draining one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub label: String,
    pub total_pages: u64,
    pub pages_written: u64,
    pub records: u64,
    /// Set when pagination stopped early or the page count was unavailable
    pub failure: Option<String>,
}

/// Remove page files left behind by an earlier run. Returns how many went.
pub fn clear_page_files(save_dir: &Path, endpoint: &Endpoint) -> Result<usize> {
    let mut removed = 0;
    let entries = fs::read_dir(save_dir)
        .with_context(|| format!("Failed to read directory: {}", save_dir.display()))?;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_page = path
            .file_name()
            .is_some_and(|name| endpoint.is_page_file_name(&name.to_string_lossy()));
        if is_page && path.is_file() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove stale page: {}", path.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Fetch pages `0..total_pages` of an endpoint, writing each as a CSV file
/// under `<data_dir>/<label>/`. Pages from a previous run are removed first.
/// A failed page stops this endpoint; pages already written stay on disk.
pub fn extract_endpoint<S: PageSource>(
    source: &S,
    endpoint: &Endpoint,
    total_pages: u64,
    page_size: u64,
    data_dir: &Path,
) -> Result<ExtractSummary> {
    let save_dir = data_dir.join(endpoint.label);
    fs::create_dir_all(&save_dir)
        .with_context(|| format!("Failed to create directory: {}", save_dir.display()))?;

    let stale = clear_page_files(&save_dir, endpoint)?;
    if stale > 0 {
        debug!("Removed {} page files from a previous {} run", stale, endpoint.label);
    }

    let mut summary = ExtractSummary {
        label: endpoint.label.to_string(),
        total_pages,
        pages_written: 0,
        records: 0,
        failure: None,
    };

    for page in 0..total_pages {
        let records = match source.fetch_page(endpoint, page, page_size) {
            Ok(records) => records,
            Err(e) => {
                error!(
                    status = ?e.status(),
                    "API request for {} page {} failed: {}",
                    endpoint.label,
                    page,
                    e
                );
                summary.failure = Some(e.to_string());
                break;
            }
        };

        let path = save_dir.join(endpoint.page_file_name(page));
        Table::from_records(&records).write_csv(&path)?;

        summary.pages_written += 1;
        summary.records += records.len() as u64;
        info!(
            "Processing {}: page {}/{} ({} records)",
            endpoint.label,
            page + 1,
            total_pages,
            records.len()
        );
    }

    Ok(summary)
}

/// Count and drain every configured endpoint, one after another
pub fn run_extract<S: PageSource>(source: &S, config: &Config) -> Result<Vec<ExtractSummary>> {
    let mut summaries = Vec::new();

    for endpoint in &config.endpoints {
        let total_pages =
            match count_pages(source, endpoint, config.page_size, config.search_retries) {
                Ok(count) => {
                    if let PageCount::Counted { records, .. } = count {
                        debug!("{} reports {} records", endpoint.label, records);
                    }
                    count.pages()
                }
                Err(e) => {
                    error!("Could not determine page count for {}: {}", endpoint.label, e);
                    summaries.push(ExtractSummary {
                        label: endpoint.label.to_string(),
                        total_pages: 0,
                        pages_written: 0,
                        records: 0,
                        failure: Some(e.to_string()),
                    });
                    continue;
                }
            };

        let summary =
            extract_endpoint(source, endpoint, total_pages, config.page_size, &config.data_dir)?;
        summaries.push(summary);
    }

    let failed = summaries.iter().filter(|s| s.failure.is_some()).count();
    info!(
        "Extracted {} endpoints ({} incomplete)",
        summaries.len(),
        failed
    );
    Ok(summaries)
}
