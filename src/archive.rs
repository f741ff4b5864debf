//! Result archive.
//!
//! Saving writes the posted object under `saved:<id>` (90-day TTL) and pushes
//! the id onto the head of [`SAVED_RESULTS_LIST`], trimmed to the configured
//! capacity. Listing reads the list and batch-fetches every member.
//!
//! The list is an index, not an owner. A trimmed id leaves its record in
//! place until the record's own TTL runs out, and a listed id whose record
//! has expired is skipped on read.

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::new_id;
use crate::store::{put_json, saved_key, KvStore, SAVED_RESULTS_LIST};

pub const SAVED_KIND: &str = "saved_analysis";
pub const INVALID_RESULT_MESSAGE: &str = "Invalid result data";
pub const SAVED_MESSAGE: &str = "Result saved successfully";

#[derive(Debug, Clone, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedResults {
    pub results: Vec<Value>,
}

/// JSON truthiness: `null`, `false`, `0` and `""` are false.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Reuses a truthy `id` from the posted object, else generates one.
fn resolve_id(object: &Map<String, Value>) -> String {
    match object.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(other) if is_truthy(other) => other.to_string(),
        _ => new_id(),
    }
}

/// Archives `body` and records its id in the recency list.
pub async fn save_result(
    store: &dyn KvStore,
    config: &Config,
    body: Option<Value>,
) -> AppResult<SaveResponse> {
    let mut object = match body {
        Some(Value::Object(object)) if object.get("title").is_some_and(is_truthy) => object,
        _ => return Err(AppError::invalid(INVALID_RESULT_MESSAGE)),
    };

    let id = resolve_id(&object);
    object.insert("id".into(), Value::String(id.clone()));
    object.insert("savedAt".into(), Value::String(Utc::now().to_rfc3339()));
    object.insert("type".into(), Value::String(SAVED_KIND.to_string()));

    put_json(
        store,
        &saved_key(&id),
        &object,
        config.retention.saved_ttl(),
    )
    .await?;
    store
        .push_capped(
            SAVED_RESULTS_LIST,
            &id,
            config.retention.saved_list_capacity,
        )
        .await?;

    info!(id = %id, "result archived");

    Ok(SaveResponse {
        success: true,
        id,
        message: SAVED_MESSAGE.to_string(),
    })
}

/// Every archived result still in the store, newest first.
///
/// Listed ids with a missing or unparseable record are dropped silently.
pub async fn list_results(store: &dyn KvStore) -> AppResult<SavedResults> {
    let ids = store.list_range(SAVED_RESULTS_LIST).await?;
    if ids.is_empty() {
        return Ok(SavedResults {
            results: Vec::new(),
        });
    }

    let keys: Vec<String> = ids.iter().map(|id| saved_key(id)).collect();
    let raw = store.get_many(&keys).await?;

    let results: Vec<Value> = raw
        .into_iter()
        .flatten()
        .filter_map(|json| serde_json::from_str(&json).ok())
        .collect();

    if results.len() < ids.len() {
        debug!(
            listed = ids.len(),
            found = results.len(),
            "some archived ids no longer resolve"
        );
    }

    Ok(SavedResults { results })
}
