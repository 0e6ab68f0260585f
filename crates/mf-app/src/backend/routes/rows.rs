use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use mf_providers::Row;
use serde_json::Value;

use crate::backend::schemas::FinalizeRequest;
use crate::backend::state::GenState;
use crate::error::AppResult;

pub async fn finalize(
    State(state): State<Arc<GenState>>,
    payload: Result<Json<FinalizeRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(req) = payload?;
    let (row_id, video_url) = req.into_parts()?;
    Ok(Json(state.generator().finalize(&row_id, &video_url).await?))
}

pub async fn list_rows(State(state): State<Arc<GenState>>) -> AppResult<Json<Vec<Row>>> {
    Ok(Json(state.generator().rows().await?))
}
