use crate::app::{CurrentUser, MarketplaceApp, RunPage, RunRecord};
use color_eyre::eyre::Result;

#[derive(serde::Deserialize)]
struct RunListResponse {
    #[serde(default)]
    data: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(serde::Deserialize)]
struct Paging {
    #[serde(default)]
    total: Option<usize>,
}

/// Parses a run list body: `{"data": [...], "paging": {"total": N}}`.
///
/// Without a usable `paging.total` the number of returned records is used.
/// A record that cannot be read at all is kept as an empty record, which
/// displays as a failed run.
pub fn parse_run_page(json: &str) -> Result<RunPage> {
    let resp: RunListResponse = serde_json::from_str(json)?;
    let records: Vec<RunRecord> = resp
        .data
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(index, "unreadable run record: {e}");
                RunRecord::default()
            })
        })
        .collect();
    let total = resp
        .paging
        .and_then(|p| p.total)
        .unwrap_or(records.len());
    Ok(RunPage { records, total })
}

pub fn parse_current_user(json: &str) -> Result<CurrentUser> {
    Ok(serde_json::from_str(json)?)
}

pub fn parse_marketplace_app(json: &str) -> Result<MarketplaceApp> {
    Ok(serde_json::from_str(json)?)
}

#[derive(serde::Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
}

/// Extracts the `message` of a server error body, if there is one.
pub fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiError>(body)
        .ok()
        .and_then(|e| e.message)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}
