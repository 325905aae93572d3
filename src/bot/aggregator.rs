//! Result aggregation for a finished execution.
//!
//! Picks the intermediate steps out of the final status (everything except
//! the `start`/`end` sentinels) and fetches each step's payload concurrently.

use std::collections::{BTreeMap, BTreeSet};

use futures::future::join_all;
use serde_json::{Map, Value};

use super::client::ExecutionBackend;
use super::types::{JobHandle, NodeResult, SENTINEL_STEPS};

/// Step names of the result map minus the sentinels, in sorted order.
pub fn classify_intermediate_steps(results: Option<&Map<String, Value>>) -> Vec<String> {
    let steps: BTreeSet<&String> = results
        .into_iter()
        .flat_map(|map| map.keys())
        .filter(|name| !SENTINEL_STEPS.contains(&name.as_str()))
        .collect();
    steps.into_iter().cloned().collect()
}

/// Fetch every named step concurrently and key the results by step name.
///
/// Failures arrive as error-marker [`NodeResult`]s, so the returned map has
/// one entry per distinct name no matter how many fetches failed.
pub async fn gather_step_results(
    backend: &dyn ExecutionBackend,
    handle: &JobHandle,
    steps: &[String],
) -> BTreeMap<String, NodeResult> {
    let unique: BTreeSet<&str> = steps.iter().map(String::as_str).collect();

    let fetches = unique.iter().map(|step| async move {
        let result = backend.fetch_step_result(handle, step).await;
        if result.is_error() {
            tracing::warn!(execution_id = %handle.execution_id(), %step, "Step result unavailable");
        }
        (step.to_string(), result)
    });

    join_all(fetches).await.into_iter().collect()
}
