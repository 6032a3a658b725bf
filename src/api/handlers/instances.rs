use anyhow::anyhow;
use rocket::State;
use rocket::serde::json::Json;

use crate::api::{AppError, AppResult, AppState};
use crate::models::{PipelineInstance, PipelineState};

fn parse_state(raw: &str) -> Option<PipelineState> {
    match raw.to_ascii_lowercase().as_str() {
        "createrecord" | "create-record" => Some(PipelineState::CreateRecord),
        "paralleltransform" | "parallel-transform" => Some(PipelineState::ParallelTransform),
        "mergeresults" | "merge-results" => Some(PipelineState::MergeResults),
        "updaterecord" | "update-record" => Some(PipelineState::UpdateRecord),
        "succeeded" => Some(PipelineState::Succeeded),
        "failed" => Some(PipelineState::Failed),
        _ => None,
    }
}

#[get("/instances/<id>")]
pub async fn get_instance(state: &State<AppState>, id: &str) -> AppResult<Json<PipelineInstance>> {
    let instances = state.orchestrator.instances().clone();
    let owned_id = id.to_string();
    let instance = tokio::task::spawn_blocking(move || instances.load(&owned_id)).await??;
    instance
        .map(Json)
        .ok_or_else(|| AppError::not_found(anyhow!("pipeline instance {} not found", id)))
}

/// Lists instances, optionally only those in `status`.
#[get("/instances?<status>")]
pub async fn list_instances(
    state: &State<AppState>,
    status: Option<&str>,
) -> AppResult<Json<Vec<PipelineInstance>>> {
    let wanted = match status {
        Some(raw) => Some(
            parse_state(raw)
                .ok_or_else(|| AppError::bad_request(anyhow!("unknown pipeline state `{}`", raw)))?,
        ),
        None => None,
    };
    let instances = state.orchestrator.instances().clone();
    let listed = tokio::task::spawn_blocking(move || match wanted {
        Some(wanted) => instances.with_state(wanted),
        None => instances.list_where(|_| true),
    })
    .await??;
    Ok(Json(listed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filters_accept_both_spellings() {
        assert_eq!(parse_state("failed"), Some(PipelineState::Failed));
        assert_eq!(parse_state("ParallelTransform"), Some(PipelineState::ParallelTransform));
        assert_eq!(parse_state("update-record"), Some(PipelineState::UpdateRecord));
        assert_eq!(parse_state("bogus"), None);
    }
}
