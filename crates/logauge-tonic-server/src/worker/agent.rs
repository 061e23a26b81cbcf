//! Phase bodies run on a worker.
//!
//! [`WorkerAgent`] keeps what must survive between phases: the assigned id,
//! the event sequence and the files produced by the last `gendata`.
//! Generation and forwarding block on file and network I/O and run on the
//! blocking thread pool.

use crate::telemetry::record_generation;
use logauge_tonic_core::{
    Error, Result,
    logauge::{DataGenerator, Forwarder, GeneratorConfig, IoContext, Workload, forwarder},
    types::WorkerId,
};
use std::{fs::File, path::PathBuf, sync::Arc};

/// Output path placeholder replaced by the worker id.
pub const WORKER_PLACEHOLDER: &str = "{worker}";

pub struct WorkerAgent {
    worker_id: Option<WorkerId>,
    workload: Arc<Workload>,
    forwarder: Arc<dyn Forwarder>,
    next_event: u64,
    files: Vec<PathBuf>,
}

impl WorkerAgent {
    /// # Errors
    ///
    /// Fails when the workload's forward destination cannot be resolved.
    pub fn new(workload: Arc<Workload>) -> Result<Self> {
        let forwarder: Arc<dyn Forwarder> = forwarder(&workload.forward)?.into();
        Ok(Self {
            worker_id: None,
            next_event: workload.datagen.start_event,
            workload,
            forwarder,
            files: Vec::new(),
        })
    }

    pub fn set_id(&mut self, worker_id: WorkerId) {
        if let Some(previous) = self.worker_id.replace(worker_id) {
            tracing::warn!("Worker id changed from {previous} to {worker_id}");
        } else {
            tracing::info!("Assigned worker={worker_id}");
        }
    }

    /// Phases need an id for their reports.
    fn id(&self) -> Result<WorkerId> {
        self.worker_id.ok_or_else(|| Error::InvalidRequest {
            reason: "no worker id assigned yet".to_string(),
        })
    }

    /// Generator configuration for this worker: the workload parameters with
    /// the placeholder resolved and the event sequence continued.
    pub fn generator_config(&self) -> Result<GeneratorConfig> {
        let worker_id = self.id()?;
        let mut config = self.workload.datagen.to_generator_config()?;
        let output = config.output_path.to_string_lossy();
        if output.contains(WORKER_PLACEHOLDER) {
            config.output_path =
                PathBuf::from(output.replace(WORKER_PLACEHOLDER, &worker_id.to_string()));
        }
        config.start_event = self.next_event;
        Ok(config)
    }

    /// Checks the template is readable and creates the output directory.
    pub fn initialize(&mut self) -> Result<String> {
        let worker_id = self.id()?;
        let config = self.generator_config()?;
        File::open(&config.input_path).with_path(&config.input_path)?;
        if let Some(dir) = config
            .output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(dir).with_path(dir)?;
        }
        Ok(format!("worker={worker_id} initialized"))
    }

    pub async fn gendata(&mut self) -> Result<String> {
        let worker_id = self.id()?;
        let config = self.generator_config()?;
        let generation = tokio::task::spawn_blocking(move || {
            DataGenerator::new(config)
                .with_progress(|p| {
                    tracing::info!(
                        "Generating {}: size {:?}%, events {:?}%",
                        p.file.display(),
                        p.by_size,
                        p.by_events
                    );
                })
                .generate()
        })
        .await
        .map_err(|e| Error::ChannelError {
            context: format!("generation task failed: {e}"),
        })??;

        record_generation(generation.events, generation.bytes);
        self.next_event = generation.next_event;
        self.files = generation.files;
        Ok(format!(
            "worker={worker_id} events={} bytes={} files={} last_event={}",
            generation.events,
            generation.bytes,
            self.files.len(),
            generation.last_event
        ))
    }

    pub async fn forward(&mut self) -> Result<String> {
        let worker_id = self.id()?;
        let forwarder = Arc::clone(&self.forwarder);
        let files = self.files.clone();
        let shipment = tokio::task::spawn_blocking(move || forwarder.forward(&files))
            .await
            .map_err(|e| Error::ChannelError {
                context: format!("forward task failed: {e}"),
            })??;
        Ok(format!(
            "worker={worker_id} destination={} files={} bytes={}",
            self.forwarder.name(),
            shipment.files,
            shipment.bytes
        ))
    }

    pub fn terminate(&self) -> String {
        match self.worker_id {
            Some(worker_id) => format!("worker={worker_id} terminated"),
            None => "worker=unassigned terminated".to_string(),
        }
    }
}
