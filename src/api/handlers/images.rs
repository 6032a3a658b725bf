use anyhow::anyhow;
use rocket::State;
use rocket::serde::json::Json;

use crate::api::{AppError, AppResult, AppState};
use crate::models::{ImageId, ImageRecord};

#[get("/images/<id>")]
pub async fn get_image(state: &State<AppState>, id: &str) -> AppResult<Json<ImageRecord>> {
    let id = ImageId::parse(id).map_err(AppError::bad_request)?;
    let images = state.orchestrator.images().clone();
    let record = tokio::task::spawn_blocking(move || images.get(id)).await??;
    record
        .map(Json)
        .ok_or_else(|| AppError::not_found(anyhow!("image {} not found", id)))
}
