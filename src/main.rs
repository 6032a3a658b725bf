use anyhow::{Context, Result};
use log::{error, info};
use std::sync::Arc;
use std::time::Instant;

use miniinsta::api::{AppState, build_rocket};
use miniinsta::common::errors::handle_error;
use miniinsta::config::init_config;
use miniinsta::database::{ImageTable, InstanceTable, Tree};
use miniinsta::grant::GrantIssuer;
use miniinsta::storage::{LocalObjectStore, ObjectStore};
use miniinsta::workflow::Orchestrator;
use miniinsta::workflow::processors::image::ImageCrateCodec;
use miniinsta::workflow::processors::setup::{initialize_folder, initialize_logger};
use miniinsta::workflow::tasks::retry::RetryPolicy;
use miniinsta::workflow::tasks::transform::TransformWorker;

fn main() -> Result<()> {
    initialize_logger();
    let config = init_config()?;
    initialize_folder(config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async {
        let start_time = Instant::now();
        let tree = Arc::new(Tree::open(config.database_path())?);
        info!(duration = &*format!("{:?}", start_time.elapsed());
            "Opened database at {:?}", config.database_path()
        );

        let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(config.objects_dir()));
        let worker = TransformWorker::new(store.clone(), Arc::new(ImageCrateCodec::default()))
            .missing_source_is_error(config.missing_source_is_error);
        let orchestrator = Arc::new(Orchestrator::new(
            ImageTable::new(tree.clone()),
            InstanceTable::new(tree),
            worker,
            RetryPolicy::from_config(config),
        ));

        tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move {
                match orchestrator.resume_pending().await {
                    Ok(resumed) if !resumed.is_empty() => {
                        info!("Resumed {} pipeline instance(s)", resumed.len())
                    }
                    Ok(_) => {}
                    Err(err) => {
                        handle_error(err.context("failed to resume unfinished pipelines"));
                    }
                }
            }
        });

        let upload_dir = config.data_dir.join("upload");
        tokio::fs::create_dir_all(&upload_dir)
            .await
            .with_context(|| format!("failed to create {:?}", upload_dir))?;

        let state = AppState {
            issuer: GrantIssuer::from_config(config),
            orchestrator,
            store,
            bucket: config.bucket.clone(),
            upload_dir,
        };

        if let Err(err) = build_rocket(state).launch().await {
            error!("Rocket server failed: {}", err);
            return Err(anyhow::Error::from(err));
        }
        Ok(())
    })
}
