//! Page-count discovery for collection endpoints
//!
//! The count companion endpoint is tried first. When it is missing or
//! unhelpful, the last page is located by bisecting over page indices,
//! which assumes that once a page comes back empty every later page does too.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{FetchError, PageSource};
use crate::types::Endpoint;

/// Exclusive upper bound on page indices requested by the bisection
pub const SEARCH_CEILING: u64 = 1 << 20;

#[derive(Debug, Error)]
pub enum PagerError {
    #[error("request for page {page} failed after {attempts} attempt(s): {source}")]
    SearchFailed {
        page: u64,
        attempts: u32,
        #[source]
        source: FetchError,
    },
    #[error("no empty page found below page {0}; collection too large to count")]
    CeilingReached(u64),
}

/// How a page count was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCount {
    Counted { records: u64, pages: u64 },
    Searched { pages: u64 },
}

impl PageCount {
    pub fn pages(&self) -> u64 {
        match self {
            PageCount::Counted { pages, .. } | PageCount::Searched { pages } => *pages,
        }
    }
}

/// Pages needed to hold `total` records, rounding up
pub fn pages_for_total(total: u64, page_size: u64) -> u64 {
    total.div_ceil(page_size)
}

/// Determine how many pages an endpoint serves
pub fn count_pages<S: PageSource>(
    source: &S,
    endpoint: &Endpoint,
    page_size: u64,
    search_retries: u32,
) -> Result<PageCount, PagerError> {
    if let Some(records) = source.count(endpoint) {
        let pages = pages_for_total(records, page_size);
        info!("Total pages for {} data: {}", endpoint.label, pages);
        return Ok(PageCount::Counted { records, pages });
    }

    info!(
        "Count request for {} failed or did not provide count data. Using binary search to find the last page.",
        endpoint.label
    );
    let pages = binary_page_search(source, endpoint, page_size, search_retries)?;
    info!("Total pages for {} data: {}", endpoint.label, pages);
    Ok(PageCount::Searched { pages })
}

/// Find the first empty page index in `[0, SEARCH_CEILING)`.
///
/// A page request that fails is retried `search_retries` times and then aborts the
/// search; a failure says nothing about whether the page holds data.
pub fn binary_page_search<S: PageSource>(
    source: &S,
    endpoint: &Endpoint,
    page_size: u64,
    search_retries: u32,
) -> Result<u64, PagerError> {
    let (mut low, mut high) = (0u64, SEARCH_CEILING);

    while low < high {
        let mid = low + (high - low) / 2;
        let empty = page_is_empty(source, endpoint, mid, page_size, search_retries)?;
        debug!(endpoint = endpoint.label, page = mid, empty, "checked page");
        if empty {
            high = mid;
        } else {
            low = mid + 1;
        }
    }

    if low == SEARCH_CEILING {
        return Err(PagerError::CeilingReached(SEARCH_CEILING));
    }
    Ok(low)
}

fn page_is_empty<S: PageSource>(
    source: &S,
    endpoint: &Endpoint,
    page: u64,
    page_size: u64,
    search_retries: u32,
) -> Result<bool, PagerError> {
    let attempts = search_retries + 1;
    let mut attempt = 1;
    loop {
        match source.fetch_page(endpoint, page, page_size) {
            Ok(records) => return Ok(records.is_empty()),
            Err(source_err) if attempt >= attempts => {
                return Err(PagerError::SearchFailed {
                    page,
                    attempts,
                    source: source_err,
                });
            }
            Err(e) => {
                warn!(
                    "Request for {} page {} failed ({}), retrying ({}/{})",
                    endpoint.label, page, e, attempt, attempts
                );
                attempt += 1;
            }
        }
    }
}
