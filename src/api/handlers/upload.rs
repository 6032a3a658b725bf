use anyhow::{Context, Result, anyhow};
use log::info;
use rocket::State;
use rocket::form::{Errors, Form, FromForm};
use rocket::fs::TempFile;
use rocket::http::Status;
use std::path::{Path, PathBuf};
use std::time::Instant;
use ulid::Ulid;

use crate::api::{AppError, AppResult, AppState};
use crate::models::UploadEvent;

#[derive(FromForm, Debug)]
pub struct UploadForm<'r> {
    pub key: String,
    pub token: String,
    pub file: TempFile<'r>,
}

/// Accepts a granted upload, writes it to the object store and emits the
/// upload-completion event for `original_` keys.
#[post("/upload", data = "<form>")]
pub async fn upload(
    state: &State<AppState>,
    form: Result<Form<UploadForm<'_>>, Errors<'_>>,
) -> AppResult<Status> {
    let mut inner_form = match form {
        Ok(form) => form.into_inner(),
        Err(errors) => {
            let error_chain = errors
                .iter()
                .map(|e| anyhow!(e.to_string()))
                .reduce(|acc, e| acc.context(e.to_string()));

            return match error_chain {
                Some(chain) => Err(AppError::bad_request(chain.context("Failed to parse form"))),
                None => Err(AppError::bad_request(anyhow!("Failed to parse form with unknown error"))),
            };
        }
    };

    let start_time = Instant::now();
    let size = inner_form.file.len();
    state
        .issuer
        .verify(&inner_form.token, &inner_form.key, size)
        .map_err(AppError::forbidden)?;

    let bytes = read_file(&mut inner_form.file, &state.upload_dir).await?;
    let store = state.store.clone();
    let (bucket, key) = (state.bucket.clone(), inner_form.key.clone());
    tokio::task::spawn_blocking(move || store.put(&bucket, &key, &bytes))
        .await
        .context("object store task panicked")??;

    info!(duration = &*format!("{:?}", start_time.elapsed());
        "Stored {}/{} ({} bytes)", state.bucket, inner_form.key, size
    );

    state
        .orchestrator
        .submit(UploadEvent::new(state.bucket.clone(), inner_form.key))
        .await?;
    Ok(Status::NoContent)
}

async fn read_file(file: &mut TempFile<'_>, upload_dir: &Path) -> Result<Vec<u8>> {
    let path_tmp: PathBuf = upload_dir.join(format!("{}.tmp", Ulid::new()));
    file.move_copy_to(&path_tmp)
        .await
        .with_context(|| format!("failed to persist upload to {:?}", path_tmp))?;

    let bytes = tokio::fs::read(&path_tmp)
        .await
        .with_context(|| format!("failed to read upload from {:?}", path_tmp));
    tokio::fs::remove_file(&path_tmp)
        .await
        .with_context(|| format!("failed to remove {:?}", path_tmp))?;
    bytes
}
