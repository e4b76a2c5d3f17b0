//! Pull-based ingestion from an upstream sensor API.
//!
//! The upstream pages its data as `{ "results": [...], "next_cursor": "..." }`.
//! Each item is extracted leniently and pushed through the ETL pipeline.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::RawReading;
use crate::pipeline::EtlPipeline;

/// Cap on per-item error messages kept in a [`SyncReport`].
pub const MAX_REPORTED_ERRORS: usize = 10;

// ---

/// Outcome of one upstream synchronisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub pages: u32,
    pub total_fetched: usize,
    pub processed: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
}

/// Fetch paginated raw readings from the upstream sensor API.
pub async fn fetch_sensor_data(
    client: &reqwest::Client,
    base_url: &str,
    max_pages: u32,
) -> Result<(Vec<RawReading>, u32)> {
    // ---
    let mut all_data = Vec::new();
    let mut cursor: Option<String> = None;
    let mut page_count = 0;

    loop {
        if page_count >= max_pages {
            debug!(
                "Hit page limit of {}, stopping pagination. Fetched {} records so far.",
                max_pages,
                all_data.len()
            );
            break;
        }
        page_count += 1;

        let url = match &cursor {
            Some(cursor) => format!("{}?cursor={}", base_url, cursor),
            None => base_url.to_string(),
        };

        debug!("Fetching page {} from: {}", page_count, url);

        let response: Value = client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let page = parse_page(&response);
        debug!("Page {} held {} items", page_count, page.readings.len());
        all_data.extend(page.readings);

        cursor = page.next_cursor;
        if cursor.is_none() {
            break;
        }
    }

    info!(
        "Finished fetching {} total records from {} pages",
        all_data.len(),
        page_count
    );
    Ok((all_data, page_count))
}

/// Pull everything from the upstream API and run it through the pipeline.
///
/// A fetch failure aborts the sync. A storage failure on one item is
/// recorded in the report and the remaining items still run.
pub async fn sync(
    pipeline: &EtlPipeline,
    client: &reqwest::Client,
    base_url: &str,
    max_pages: u32,
) -> Result<SyncReport> {
    // ---
    let (readings, pages) = fetch_sensor_data(client, base_url, max_pages).await?;

    let mut report = SyncReport {
        pages,
        total_fetched: readings.len(),
        ..SyncReport::default()
    };

    for raw in readings {
        let device = raw.device_id().to_string();
        match pipeline.run(raw).await {
            Ok(_) => report.processed += 1,
            Err(e) => {
                warn!("sync: failed to process reading from {}: {}", device, e);
                report.error_count += 1;
                if report.errors.len() < MAX_REPORTED_ERRORS {
                    report.errors.push(format!("{device}: {e}"));
                }
            }
        }
    }

    info!(
        "sync complete: {} of {} readings processed",
        report.processed, report.total_fetched
    );
    Ok(report)
}

// ---

struct Page {
    readings: Vec<RawReading>,
    next_cursor: Option<String>,
}

fn parse_page(response: &Value) -> Page {
    // ---
    let readings = match response.get("results").and_then(|d| d.as_array()) {
        Some(items) => items.iter().map(RawReading::from_payload).collect(),
        None => {
            debug!("response missing 'results' field or not an array");
            Vec::new()
        }
    };

    let next_cursor = response
        .get("next_cursor")
        .and_then(|c| c.as_str())
        .map(String::from);

    Page {
        readings,
        next_cursor,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::FieldValue;
    use serde_json::json;

    #[test]
    fn test_parse_page_extracts_items_and_cursor() {
        // ---
        let page = parse_page(&json!({
            "results": [
                { "temperature": 21.5, "humidity": 40, "device_id": "a" },
                { "temperature": "bad", "humidity": 40 }
            ],
            "next_cursor": "abc"
        }));

        assert_eq!(page.readings.len(), 2);
        assert_eq!(page.readings[0].device_id(), "a");
        assert_eq!(page.readings[1].temperature, FieldValue::Invalid);
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_page_without_results() {
        // ---
        let page = parse_page(&json!({ "status": "ok" }));
        assert!(page.readings.is_empty());
        assert!(page.next_cursor.is_none());
    }
}
