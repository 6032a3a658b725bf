use anyhow::{Context, Result, anyhow, bail};
use futures::future::join_all;
use log::{error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tokio::task::spawn_blocking;

use crate::common::errors::{chain_message, handle_error};
use crate::database::{ImageTable, InstanceTable, RecordError};
use crate::models::identity::extract_identity;
use crate::models::{
    BranchSlot, ImageRecord, KeyPrefix, MergedResults, PipelineContext, PipelineInstance,
    PipelineState, UploadEvent,
};
use crate::workflow::state::{Action, transition};
use crate::workflow::tasks::retry::RetryPolicy;
use crate::workflow::tasks::transform::{Operation, TransformRequest, Transformer};
use crate::workflow::types::try_acquire;

/// Another task currently holds the instance's processing guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pipeline instance {0} is already being driven")]
pub struct AlreadyDriven(pub String);

/// Drives one durable pipeline instance per upload-completion event:
/// create record, transform in parallel, merge, patch record.
pub struct Orchestrator<W> {
    images: ImageTable,
    instances: InstanceTable,
    worker: W,
    retry: RetryPolicy,
}

fn slot(context: &PipelineContext, operation: Operation) -> &BranchSlot {
    match operation {
        Operation::Normalize => &context.normalized,
        Operation::DerivePlaceholder => &context.placeholder,
    }
}

fn slot_mut(context: &mut PipelineContext, operation: Operation) -> &mut BranchSlot {
    match operation {
        Operation::Normalize => &mut context.normalized,
        Operation::DerivePlaceholder => &mut context.placeholder,
    }
}

fn lock(shared: &Mutex<PipelineInstance>) -> MutexGuard<'_, PipelineInstance> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<W: Transformer> Orchestrator<W> {
    pub fn new(images: ImageTable, instances: InstanceTable, worker: W, retry: RetryPolicy) -> Self {
        Self {
            images,
            instances,
            worker,
            retry,
        }
    }

    pub fn images(&self) -> &ImageTable {
        &self.images
    }

    pub fn instances(&self) -> &InstanceTable {
        &self.instances
    }

    /// Persists a new instance for a qualifying event. Returns `None` for ignored keys.
    pub fn accept(&self, event: UploadEvent) -> Result<Option<String>> {
        if !event.is_qualifying() {
            info!("Ignoring object-created event for {}/{}", event.bucket, event.key);
            return Ok(None);
        }
        let instance = PipelineInstance::new(event);
        self.instances.save(&instance)?;
        info!(instance = instance.id.as_str();
            "Started pipeline for {}/{}", instance.context.bucket, instance.context.original_key
        );
        Ok(Some(instance.id))
    }

    /// Accepts `event` off the async executor and drives the instance in the background.
    pub async fn submit(self: &Arc<Self>, event: UploadEvent) -> Result<Option<String>> {
        let orchestrator = Arc::clone(self);
        let id = spawn_blocking(move || orchestrator.accept(event))
            .await
            .context("accept task panicked")??;
        if let Some(id) = id.clone() {
            let orchestrator = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = orchestrator.run(&id).await {
                    handle_error(err.context(format!("failed to drive pipeline instance {}", id)));
                }
            });
        }
        Ok(id)
    }

    /// Accepts `event` and drives the instance to a terminal state on the current task.
    pub async fn handle_event(&self, event: UploadEvent) -> Result<Option<PipelineInstance>> {
        match self.accept(event)? {
            Some(id) => Ok(Some(self.run(&id).await?)),
            None => Ok(None),
        }
    }

    /// Picks every unfinished instance back up from its persisted cursor.
    pub async fn resume_pending(&self) -> Result<Vec<PipelineInstance>> {
        let pending = self.instances.unfinished()?;
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        info!("Resuming {} unfinished pipeline instance(s)", pending.len());

        let results = join_all(pending.iter().map(|instance| self.run(&instance.id))).await;
        let mut resumed = Vec::with_capacity(results.len());
        for (instance, result) in pending.iter().zip(results) {
            match result {
                Ok(finished) => resumed.push(finished),
                Err(err) if err.downcast_ref::<AlreadyDriven>().is_some() => {
                    info!(instance = instance.id.as_str(); "Already being driven, not resuming");
                }
                Err(err) => {
                    handle_error(err.context(format!("failed to resume instance {}", instance.id)));
                }
            }
        }
        Ok(resumed)
    }

    /// Interprets the transition table until the instance reaches a terminal state.
    /// A failed instance is returned as `Ok` with `state == Failed`; `Err` means the
    /// instance could not be loaded or persisted.
    pub async fn run(&self, id: &str) -> Result<PipelineInstance> {
        let _guard = try_acquire(id).ok_or_else(|| AlreadyDriven(id.to_string()))?;
        let mut instance = self
            .instances
            .load(id)?
            .ok_or_else(|| anyhow!("pipeline instance {} does not exist", id))?;
        if instance.state.is_terminal() {
            return Ok(instance);
        }
        instance.runs += 1;
        instance.touch();
        self.instances.save(&instance)?;

        while let Some((action, next)) = transition(instance.state) {
            let start_time = Instant::now();
            match self.perform(action, &mut instance).await {
                Ok(()) => {
                    info!(instance = id, duration = &*format!("{:?}", start_time.elapsed());
                        "{} -> {}", instance.state, next
                    );
                    instance.state = next;
                    instance.touch();
                    self.instances.save(&instance)?;
                }
                Err(err) => {
                    let err = handle_error(
                        err.context(format!("pipeline instance {} failed in {}", id, instance.state)),
                    );
                    instance.error = Some(chain_message(&err));
                    instance.state = PipelineState::Failed;
                    instance.touch();
                    self.instances.save(&instance)?;
                    return Ok(instance);
                }
            }
        }

        Ok(instance)
    }

    async fn perform(&self, action: Action, instance: &mut PipelineInstance) -> Result<()> {
        match action {
            Action::WriteInitialRecord => self.write_initial_record(instance),
            Action::FanOutTransforms => self.fan_out_transforms(instance).await,
            Action::MergeBranches => merge_branches(&mut instance.context),
            Action::PatchRecord => self.patch_record(instance),
        }
    }

    fn write_initial_record(&self, instance: &PipelineInstance) -> Result<()> {
        let original_key = &instance.context.original_key;
        let id = extract_identity(original_key, KeyPrefix::Original)
            .with_context(|| format!("failed to extract identity from `{}`", original_key))?;

        match self.images.create(&ImageRecord::new(id, original_key)) {
            Ok(()) => Ok(()),
            Err(err)
                if instance.is_resumed()
                    && matches!(
                        err.downcast_ref::<RecordError>(),
                        Some(RecordError::AlreadyExists(_))
                    ) =>
            {
                // The create committed before the cursor did.
                match self.images.get(id)? {
                    Some(record) if record.images.original == *original_key && record.is_pristine() => {
                        warn!(instance = instance.id.as_str();
                            "Record {} already written by an earlier run", id
                        );
                        Ok(())
                    }
                    _ => Err(err),
                }
            }
            Err(err) => Err(err.context(format!("failed to create image record {}", id))),
        }
    }

    async fn fan_out_transforms(&self, instance: &mut PipelineInstance) -> Result<()> {
        let shared = Mutex::new(instance.clone());
        let (normalize, placeholder) = tokio::join!(
            self.run_branch(Operation::Normalize, &shared),
            self.run_branch(Operation::DerivePlaceholder, &shared),
        );
        *instance = shared.into_inner().unwrap_or_else(PoisonError::into_inner);
        normalize?;
        placeholder?;

        let failures = [Operation::Normalize, Operation::DerivePlaceholder]
            .into_iter()
            .filter_map(|operation| match slot(&instance.context, operation) {
                BranchSlot::Failed(reason) => Some(format!("{}: {}", operation.as_str(), reason)),
                _ => None,
            })
            .collect::<Vec<_>>();
        if !failures.is_empty() {
            bail!("transform branches failed: {}", failures.join("; "));
        }
        Ok(())
    }

    /// Runs one branch unless an earlier run already settled it, then persists its outcome.
    async fn run_branch(&self, operation: Operation, shared: &Mutex<PipelineInstance>) -> Result<()> {
        let (instance_id, request) = {
            let instance = lock(shared);
            if slot(&instance.context, operation).is_settled() {
                info!(instance = instance.id.as_str();
                    "{} branch already settled, skipping", operation.as_str()
                );
                return Ok(());
            }
            let request = TransformRequest {
                bucket: instance.context.bucket.clone(),
                key: instance.context.original_key.clone(),
                operation,
            };
            (instance.id.clone(), request)
        };

        let label = format!("{} of {}", operation.as_str(), request.key);
        let outcome = self
            .retry
            .run(&label, || self.worker.transform(request.clone()))
            .await;
        let settled = match outcome {
            Ok(output) => BranchSlot::Done(output.into_value()),
            Err(err) => {
                error!(instance = instance_id.as_str(); "{} gave up: {}", label, err);
                BranchSlot::Failed(err.to_string())
            }
        };

        let mut instance = lock(shared);
        *slot_mut(&mut instance.context, operation) = settled;
        instance.touch();
        self.instances.save(&instance)
    }

    fn patch_record(&self, instance: &PipelineInstance) -> Result<()> {
        let context = &instance.context;
        let merged = context
            .merged
            .as_ref()
            .ok_or_else(|| anyhow!("merged results missing"))?;
        let expected = extract_identity(&context.original_key, KeyPrefix::Original)
            .with_context(|| format!("failed to extract identity from `{}`", context.original_key))?;

        if merged.normalized.is_none() && merged.blur_hash.is_none() {
            warn!(instance = instance.id.as_str();
                "Source {} vanished before processing, leaving record {} untouched",
                context.original_key, expected
            );
            return Ok(());
        }

        let id = match merged.normalized.as_deref() {
            Some(normalized_key) => extract_identity(normalized_key, KeyPrefix::Normalized)
                .with_context(|| format!("failed to extract identity from `{}`", normalized_key))?,
            None => expected,
        };
        if id != expected {
            bail!("normalized key belongs to {} but the upload was {}", id, expected);
        }

        self.images
            .set_derived(id, merged.normalized.as_deref(), merged.blur_hash.as_deref())
            .with_context(|| format!("failed to update image record {}", id))?;
        Ok(())
    }
}

/// Places each branch output under its own field, independent of completion order.
fn merge_branches(context: &mut PipelineContext) -> Result<()> {
    let settled = |operation: Operation| match slot(context, operation) {
        BranchSlot::Done(value) => Ok(value.clone()),
        other => Err(anyhow!("{} branch not settled: {:?}", operation.as_str(), other)),
    };
    let merged = MergedResults {
        normalized: settled(Operation::Normalize)?,
        blur_hash: settled(Operation::DerivePlaceholder)?,
    };
    context.merged = Some(merged);
    Ok(())
}
