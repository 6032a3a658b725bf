pub mod handlers;

use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use serde_json::json;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use crate::grant::GrantIssuer;
use crate::storage::ObjectStore;
use crate::workflow::Orchestrator;
use crate::workflow::tasks::transform::TransformWorker;

/// Request body ceiling for multipart uploads.
pub const UPLOAD_LIMIT: &str = "50 MiB";

#[derive(Debug)]
pub struct AppError {
    pub status: Status,
    pub error: anyhow::Error,
}

impl AppError {
    pub fn new(status: Status, error: impl Into<anyhow::Error>) -> Self {
        AppError {
            status,
            error: error.into(),
        }
    }

    pub fn forbidden(error: impl Into<anyhow::Error>) -> Self {
        Self::new(Status::Forbidden, error)
    }

    pub fn not_found(error: impl Into<anyhow::Error>) -> Self {
        Self::new(Status::NotFound, error)
    }

    pub fn bad_request(error: impl Into<anyhow::Error>) -> Self {
        Self::new(Status::BadRequest, error)
    }
}

#[rocket::async_trait]
impl<'r, 'o: 'r> Responder<'r, 'o> for AppError {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'o> {
        let outer_msg = self.error.to_string();

        let chain: Vec<String> = self.error.chain().map(|e| e.to_string()).collect();

        let body = json!({
            "error": outer_msg,
            "chain": chain,
        })
        .to_string();

        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl<E> From<E> for AppError
where
    anyhow::Error: From<E>,
{
    fn from(err: E) -> Self {
        AppError {
            status: Status::InternalServerError,
            error: anyhow::Error::from(err),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Everything the handlers reach through `&State<AppState>`.
pub struct AppState {
    pub issuer: GrantIssuer,
    pub orchestrator: Arc<Orchestrator<TransformWorker>>,
    pub store: Arc<dyn ObjectStore>,
    pub bucket: String,
    pub upload_dir: PathBuf,
}

pub fn build_rocket(state: AppState) -> rocket::Rocket<rocket::Build> {
    let figment = rocket::Config::figment()
        .merge(("limits.file", UPLOAD_LIMIT))
        .merge(("limits.data-form", UPLOAD_LIMIT));

    rocket::custom(figment)
        .manage(state)
        .mount("/", handlers::generate_grant_routes())
        .mount("/", handlers::generate_upload_routes())
        .mount("/", handlers::generate_inspection_routes())
}
