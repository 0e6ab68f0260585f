use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use mf_providers::ImageAnalysis;

use crate::backend::schemas::{
    AnalyzeImageRequest, GenerateImageRequest, GenerateImageResponse, PromptResponse, YamlToPromptRequest,
};
use crate::backend::state::GenState;
use crate::error::AppResult;

pub async fn generate_image(
    State(state): State<Arc<GenState>>,
    payload: Result<Json<GenerateImageRequest>, JsonRejection>,
) -> AppResult<Json<GenerateImageResponse>> {
    let Json(req) = payload?;
    let prompt = req.prompt()?;
    let image_url = state.generator().generate_image(&prompt, req.size.as_deref()).await?;
    Ok(Json(GenerateImageResponse { image_url, prompt }))
}

pub async fn analyze_image(
    State(state): State<Arc<GenState>>,
    payload: Result<Json<AnalyzeImageRequest>, JsonRejection>,
) -> AppResult<Json<ImageAnalysis>> {
    let Json(req) = payload?;
    let analysis = state.generator().analyze_image(&req.image_url()?).await?;
    Ok(Json(analysis))
}

pub async fn yaml_to_prompt(
    State(state): State<Arc<GenState>>,
    payload: Result<Json<YamlToPromptRequest>, JsonRejection>,
) -> AppResult<Json<PromptResponse>> {
    let Json(req) = payload?;
    let prompt = state.generator().convert_to_prompt(&req.yaml()?).await?;
    Ok(Json(PromptResponse { prompt }))
}
