use log::{error, info, warn};
use rocket::State;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde_json::{Value, json};

use crate::api::AppState;
use crate::grant::{GrantError, GrantIssuer, UploadGrant};

pub type GrantResponse = Result<Json<UploadGrant>, (Status, Json<Value>)>;

fn reject(status: Status, message: &str) -> (Status, Json<Value>) {
    (status, Json(json!({ "message": message })))
}

#[post("/create-presigned-post", data = "<body>")]
pub async fn create_presigned_post(state: &State<AppState>, body: Option<String>) -> GrantResponse {
    let Some(body) = body.filter(|body| !body.trim().is_empty()) else {
        warn!("Grant request without a body");
        return Err(reject(Status::Forbidden, "Missing body"));
    };

    let issued = GrantIssuer::parse_request(&body).and_then(|request| state.issuer.issue(&request));
    match issued {
        Ok(grant) => {
            info!(id = grant.id.as_str(); "Issued upload grant for {}", grant.fields.key);
            Ok(Json(grant))
        }
        Err(GrantError::Generation(reason)) => {
            error!("Failed to generate upload grant: {}", reason);
            Err(reject(Status::InternalServerError, "Failed to generate upload grant"))
        }
        Err(err) => {
            warn!("Rejected grant request: {}", err);
            Err(reject(Status::Forbidden, "Invalid body"))
        }
    }
}
