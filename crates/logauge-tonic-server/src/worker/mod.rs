//! Worker side of a run.
//!
//! A worker fetches the run description from the controller, starts its own
//! gRPC endpoint and registers it. From then on it only answers the
//! controller's phase calls until told to terminate.
//!
//! ## Structure
//!
//! - [`agent`]: phase bodies and state kept between phases.
//! - [`request`]: messages sent from the service to the worker task.
//! - [`service`]: gRPC `Worker` service.
//! - [`task`]: the worker task running one request at a time.

pub mod agent;
pub mod request;
pub mod service;
pub mod task;

use crate::config::WorkerConfig;
use agent::WorkerAgent;
use anyhow::{Context, bail};
use logauge_tonic_core::{
    logauge::{System, Workload},
    proto::{
        AcceptWorkerRequest, InfoRequest, controller_client::ControllerClient,
        worker_server::WorkerServer,
    },
};
use service::WorkerService;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::mpsc};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::{codec::CompressionEncoding, transport::Server};

/// Joins the controller at `config.controller_addr` and serves phase calls
/// on `listener` until terminated or `shutdown` is cancelled.
///
/// # Errors
///
/// Fails when the controller cannot be reached, hands out a workload this
/// worker cannot run, or refuses the registration.
pub async fn run_worker(
    config: WorkerConfig,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let mut controller = ControllerClient::connect(config.controller_addr.clone())
        .await
        .with_context(|| format!("failed to reach controller {}", config.controller_addr))?
        .send_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Zstd);

    let info = controller.info(InfoRequest {}).await?.into_inner();
    let system: System = info.system.parse()?;
    let workload = Workload::from_json(&info.workload_json)?;
    workload.validate()?;
    tracing::info!("Joined controller {} for system={system}", config.controller_addr);

    let agent = WorkerAgent::new(Arc::new(workload))?;
    let (requests_tx, requests_rx) = mpsc::channel(1);
    let worker = tokio::spawn(task::worker_loop(
        requests_rx,
        agent,
        shutdown.clone(),
        config.shutdown_grace,
    ));

    let local_addr = listener.local_addr()?;
    let endpoint = config
        .advertise_addr
        .clone()
        .unwrap_or_else(|| format!("http://{local_addr}"));
    tracing::info!("Worker listening on {local_addr}, advertised as {endpoint}");

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<WorkerServer<WorkerService>>()
        .await;

    let server = {
        let shutdown = shutdown.clone();
        tokio::spawn(
            Server::builder()
                .http2_adaptive_window(Some(true))
                .add_service(health_service)
                .add_service(build_worker_service(WorkerService::new(requests_tx)))
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                    shutdown.cancelled().await;
                    health_reporter
                        .set_not_serving::<WorkerServer<WorkerService>>()
                        .await;
                }),
        )
    };

    let accepted = match controller
        .accept_worker(AcceptWorkerRequest {
            endpoint: endpoint.clone(),
        })
        .await
    {
        Ok(reply) => reply.into_inner().accepted,
        Err(status) => {
            shutdown.cancel();
            return Err(status).context("registration failed");
        }
    };
    if !accepted {
        shutdown.cancel();
        bail!("Controller refused registration of {endpoint}");
    }
    tracing::info!("Registered {endpoint} with controller");

    server.await??;
    worker.await?;
    tracing::info!("Worker shut down");
    Ok(())
}

fn build_worker_service(service: WorkerService) -> WorkerServer<WorkerService> {
    WorkerServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}
