use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::backend::routes::jobs::{
    clear_completed, create_job, finalize_job, get_job, list_jobs, rebuild_job, stop_watching, wait_for_job,
};
use crate::backend::routes::media::{analyze_image, generate_image, yaml_to_prompt};
use crate::backend::routes::rows::{finalize, list_rows};
use crate::backend::routes::video::{generate_video, video_status};
use crate::backend::state::GenState;

mod jobs;
mod media;
mod rows;
mod video;

pub fn api_routes() -> Router<Arc<GenState>> {
    Router::new()
        .route("/generate-image", post(generate_image))
        .route("/analyze-image", post(analyze_image))
        .route("/yaml-to-prompt", post(yaml_to_prompt))
        .route("/generate-video", post(generate_video))
        .route("/video-status/{task_id}", get(video_status))
        .route("/finalize", post(finalize))
        .route("/rows", get(list_rows))
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/completed", delete(clear_completed))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/wait", get(wait_for_job))
        .route("/jobs/{id}/watch", delete(stop_watching))
        .route("/jobs/{id}/finalize", post(finalize_job))
        .route("/jobs/{id}/rebuild", post(rebuild_job))
}
