use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::spawn_blocking;

use crate::models::{KeyPrefix, ObjectKey};
use crate::storage::ObjectStore;
use crate::workflow::processors::image::ImageCodec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "normalize")]
    Normalize,
    #[serde(rename = "derive-placeholder", alias = "blurHash")]
    DerivePlaceholder,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Normalize => "normalize",
            Operation::DerivePlaceholder => "derive-placeholder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRequest {
    pub bucket: String,
    pub key: String,
    pub operation: Operation,
}

/// Wire shape of a worker response: a bare string, or `{}` when the source was missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransformOutput {
    Value(String),
    Empty {},
}

impl TransformOutput {
    pub fn into_value(self) -> Option<String> {
        match self {
            TransformOutput::Value(value) => Some(value),
            TransformOutput::Empty {} => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("invalid transform request: {0}")]
    Validation(String),
    #[error("image codec failure: {0}")]
    Codec(String),
    #[error("object store failure: {0}")]
    Storage(String),
    #[error("transform timed out after {0:?}")]
    Timeout(Duration),
    #[error("source object `{0}` not found")]
    MissingSource(String),
}

impl TransformError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            TransformError::Validation(_) | TransformError::MissingSource(_)
        )
    }
}

/// One transform invocation: `(bucket, key, operation) -> result`.
pub trait Transformer: Send + Sync + 'static {
    fn transform(
        &self,
        request: TransformRequest,
    ) -> impl Future<Output = Result<TransformOutput, TransformError>> + Send;
}

/// Stateless worker over an injected object store and codec.
#[derive(Clone)]
pub struct TransformWorker {
    store: Arc<dyn ObjectStore>,
    codec: Arc<dyn ImageCodec>,
    missing_source_is_error: bool,
}

impl TransformWorker {
    pub fn new(store: Arc<dyn ObjectStore>, codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            store,
            codec,
            missing_source_is_error: false,
        }
    }

    pub fn missing_source_is_error(mut self, enabled: bool) -> Self {
        self.missing_source_is_error = enabled;
        self
    }
}

impl Transformer for TransformWorker {
    fn transform(
        &self,
        request: TransformRequest,
    ) -> impl Future<Output = Result<TransformOutput, TransformError>> + Send {
        let worker = self.clone();
        async move {
            spawn_blocking(move || transform_task(&worker, request))
                .await
                .map_err(|err| TransformError::Codec(format!("transform task panicked: {err}")))?
        }
    }
}

fn storage_error(err: anyhow::Error) -> TransformError {
    TransformError::Storage(format!("{err:#}"))
}

fn codec_error(err: anyhow::Error) -> TransformError {
    TransformError::Codec(format!("{err:#}"))
}

fn transform_task(
    worker: &TransformWorker,
    request: TransformRequest,
) -> Result<TransformOutput, TransformError> {
    let start_time = Instant::now();
    let TransformRequest {
        bucket,
        key,
        operation,
    } = request;

    let target_key = match operation {
        Operation::Normalize => Some(
            ObjectKey::parse(&key, KeyPrefix::Original)
                .map_err(|err| TransformError::Validation(err.to_string()))?
                .with_prefix(KeyPrefix::Normalized)
                .to_string(),
        ),
        Operation::DerivePlaceholder => None,
    };

    let bytes = match worker.store.get(&bucket, &key).map_err(storage_error)? {
        Some(bytes) => bytes,
        None if worker.missing_source_is_error => {
            return Err(TransformError::MissingSource(format!("{bucket}/{key}")));
        }
        None => {
            warn!("Source object {}/{} not found, skipping {}", bucket, key, operation.as_str());
            return Ok(TransformOutput::Empty {});
        }
    };

    match target_key {
        Some(target_key) => {
            let normalized = worker.codec.normalize(&bytes).map_err(codec_error)?;
            worker
                .store
                .put(&bucket, &target_key, &normalized)
                .map_err(storage_error)?;
            info!(duration = &*format!("{:?}", start_time.elapsed());
                "Normalized {} into {}", key, target_key
            );
            Ok(TransformOutput::Value(target_key))
        }
        None => {
            let placeholder = worker.codec.placeholder(&bytes).map_err(codec_error)?;
            info!(duration = &*format!("{:?}", start_time.elapsed());
                "Derived placeholder for {}", key
            );
            Ok(TransformOutput::Value(placeholder))
        }
    }
}
