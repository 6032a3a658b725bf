use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::{Value, json};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use miniinsta::api::{AppState, build_rocket};
use miniinsta::database::{ImageTable, InstanceTable, Tree};
use miniinsta::grant::GrantIssuer;
use miniinsta::models::{ImageRecord, PipelineInstance, PipelineState};
use miniinsta::storage::{LocalObjectStore, ObjectStore};
use miniinsta::workflow::Orchestrator;
use miniinsta::workflow::processors::image::ImageCrateCodec;
use miniinsta::workflow::tasks::retry::RetryPolicy;
use miniinsta::workflow::tasks::transform::TransformWorker;

const BUCKET: &str = "images";
const BOUNDARY: &str = "miniinsta-test-boundary";

async fn client() -> (TempDir, Client, Arc<dyn ObjectStore>) {
    let dir = TempDir::new().unwrap();
    let tree = Arc::new(Tree::open(dir.path().join("miniinsta.redb")).unwrap());
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path().join("objects")));
    let worker = TransformWorker::new(store.clone(), Arc::new(ImageCrateCodec::default()));
    let orchestrator = Arc::new(Orchestrator::new(
        ImageTable::new(tree.clone()),
        InstanceTable::new(tree),
        worker,
        RetryPolicy {
            max_attempts: 1,
            backoff: Duration::from_millis(1),
            timeout: Duration::from_secs(30),
        },
    ));
    let upload_dir = dir.path().join("upload");
    std::fs::create_dir_all(&upload_dir).unwrap();

    let state = AppState {
        issuer: GrantIssuer::new(b"api-test-secret".to_vec(), "http://localhost/upload", 300),
        orchestrator,
        store: store.clone(),
        bucket: BUCKET.to_string(),
        upload_dir,
    };
    let client = Client::tracked(build_rocket(state)).await.unwrap();
    (dir, client, store)
}

fn sample_png() -> Vec<u8> {
    let pixels = RgbaImage::from_fn(300, 900, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 40, 255]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(pixels)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

fn multipart(key: &str, token: &str, file: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in [("key", key), ("token", token)] {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_type() -> ContentType {
    ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY))
}

async fn request_grant(client: &Client, size: usize) -> Value {
    let response = client
        .post("/create-presigned-post")
        .header(ContentType::JSON)
        .body(json!({ "size": size, "contentType": "image/png" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    response.into_json::<Value>().await.unwrap()
}

#[rocket::async_test]
async fn grant_endpoint_rejects_missing_and_invalid_bodies() {
    let (_dir, client, _) = client().await;

    let response = client.post("/create-presigned-post").dispatch().await;
    assert_eq!(response.status(), Status::Forbidden);
    let body = response.into_json::<Value>().await.unwrap();
    assert_eq!(body["message"], "Missing body");

    let response = client
        .post("/create-presigned-post")
        .body(json!({ "size": 10, "contentType": "image/avif" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);
    let body = response.into_json::<Value>().await.unwrap();
    assert_eq!(body["message"], "Invalid body");

    let response = client
        .post("/create-presigned-post")
        .body(json!({ "size": 10, "contentType": "text/plain" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);
    let body = response.into_json::<Value>().await.unwrap();
    assert_eq!(body["message"], "Invalid body");
}

#[rocket::async_test]
async fn granted_upload_runs_pipeline_to_completion() {
    let (_dir, client, store) = client().await;
    let bytes = sample_png();
    let grant = request_grant(&client, bytes.len()).await;
    let id = grant["id"].as_str().unwrap().to_string();
    let key = grant["fields"]["key"].as_str().unwrap().to_string();
    let token = grant["fields"]["token"].as_str().unwrap().to_string();
    assert_eq!(key, format!("original_{id}.png"));

    let response = client
        .post("/upload")
        .header(multipart_type())
        .body(multipart(&key, &token, &bytes))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NoContent);
    assert_eq!(store.get(BUCKET, &key).unwrap().unwrap(), bytes);

    let mut record = None;
    for _ in 0..100 {
        let response = client.get(format!("/images/{id}")).dispatch().await;
        if response.status() == Status::Ok {
            let current = response.into_json::<ImageRecord>().await.unwrap();
            if !current.is_pristine() {
                record = Some(current);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let record = record.expect("pipeline should patch the record");
    assert_eq!(record.images.original, key);
    assert_eq!(record.images.normalized, Some(format!("normalized_{id}.png")));
    assert!(record.images.blur_hash.is_some());

    let listed = client
        .get("/instances?status=succeeded")
        .dispatch()
        .await
        .into_json::<Vec<PipelineInstance>>()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].state, PipelineState::Succeeded);

    let response = client.get(format!("/instances/{}", listed[0].id)).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
}

#[rocket::async_test]
async fn upload_must_match_granted_size() {
    let (_dir, client, store) = client().await;
    let bytes = sample_png();
    let grant = request_grant(&client, bytes.len() + 1).await;
    let key = grant["fields"]["key"].as_str().unwrap();
    let token = grant["fields"]["token"].as_str().unwrap();

    let response = client
        .post("/upload")
        .header(multipart_type())
        .body(multipart(key, token, &bytes))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);
    let body = response.into_json::<Value>().await.unwrap();
    assert!(body["chain"].as_array().is_some());
    assert!(store.get(BUCKET, key).unwrap().is_none());
}

#[rocket::async_test]
async fn unknown_image_is_not_found() {
    let (_dir, client, _) = client().await;
    let response = client.get("/images/NOPE").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);

    let response = client.get("/instances?status=bogus").dispatch().await;
    assert_eq!(response.status(), Status::BadRequest);

    let response = client.get("/instances/01J0NOSUCHINSTANCE0000000000").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);

    let listed = client
        .get("/instances")
        .dispatch()
        .await
        .into_json::<Vec<PipelineInstance>>()
        .await
        .unwrap();
    assert!(listed.is_empty());
}
