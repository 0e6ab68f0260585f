use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use mf_core::Provider;

use crate::backend::schemas::{GenerateVideoRequest, GenerateVideoResponse, VideoStatusResponse};
use crate::backend::state::GenState;
use crate::error::AppResult;

/// Single-provider submission; rejections come back as errors rather than
/// failed jobs.
pub async fn generate_video(
    State(state): State<Arc<GenState>>,
    payload: Result<Json<GenerateVideoRequest>, JsonRejection>,
) -> AppResult<Json<GenerateVideoResponse>> {
    let Json(req) = payload?;
    let job = state.generator().submit_single(Provider::VideoModelA, req.into_inputs()?).await?;
    Ok(Json(GenerateVideoResponse { task_id: job.id, status: job.status }))
}

pub async fn video_status(
    State(state): State<Arc<GenState>>,
    Path(task_id): Path<String>,
) -> AppResult<Json<VideoStatusResponse>> {
    let status = state.generator().video_status(&task_id).await?;
    Ok(Json(VideoStatusResponse::new(task_id, status)))
}
