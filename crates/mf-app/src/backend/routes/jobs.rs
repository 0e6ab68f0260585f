use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use mf_core::Job;
use serde_json::Value;

use crate::backend::schemas::{ClearCompletedResponse, JobCreateRequest, RebuildRequest, StopWatchResponse, WaitQuery};
use crate::backend::state::GenState;
use crate::error::AppResult;

pub async fn create_job(
    State(state): State<Arc<GenState>>,
    payload: Result<Json<JobCreateRequest>, JsonRejection>,
) -> AppResult<Json<Vec<Job>>> {
    let Json(req) = payload?;
    let (kind, inputs, row_id) = req.into_parts()?;
    Ok(Json(state.generator().create_job(kind, inputs, row_id).await?))
}

pub async fn list_jobs(State(state): State<Arc<GenState>>) -> AppResult<Json<Vec<Job>>> {
    Ok(Json(state.generator().list_jobs().await?))
}

pub async fn get_job(State(state): State<Arc<GenState>>, Path(id): Path<String>) -> AppResult<Json<Job>> {
    Ok(Json(state.generator().get_job(&id).await?))
}

/// Block until the job is terminal or the attempt budget runs out.
pub async fn wait_for_job(
    State(state): State<Arc<GenState>>,
    Path(id): Path<String>,
    Query(query): Query<WaitQuery>,
) -> AppResult<Json<Job>> {
    let max_attempts = query.max_attempts()?;
    Ok(Json(state.generator().poll_until_terminal(&id, max_attempts).await?))
}

pub async fn stop_watching(
    State(state): State<Arc<GenState>>,
    Path(id): Path<String>,
) -> AppResult<Json<StopWatchResponse>> {
    let stopped = state.generator().stop_watching(&id).await?;
    Ok(Json(StopWatchResponse { id, stopped }))
}

pub async fn clear_completed(State(state): State<Arc<GenState>>) -> AppResult<Json<ClearCompletedResponse>> {
    let cleared = state.generator().clear_completed().await?;
    Ok(Json(ClearCompletedResponse { cleared }))
}

pub async fn finalize_job(State(state): State<Arc<GenState>>, Path(id): Path<String>) -> AppResult<Json<Value>> {
    Ok(Json(state.generator().finalize_job(&id).await?))
}

/// Re-run an image job with an edited prompt; answers with the new job.
pub async fn rebuild_job(
    State(state): State<Arc<GenState>>,
    Path(id): Path<String>,
    payload: Result<Json<RebuildRequest>, JsonRejection>,
) -> AppResult<Json<Job>> {
    let Json(req) = payload?;
    let prompt = req.prompt()?;
    Ok(Json(state.generator().rebuild_image_job(&id, &prompt).await?))
}
