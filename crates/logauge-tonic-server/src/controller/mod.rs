//! Controller side of a run.
//!
//! ## Structure
//!
//! - [`orchestrator`]: run state machine, broadcast and gather.
//! - [`registry`]: append-only worker registry.
//! - [`remote`]: handles used to call into workers.
//! - [`results`]: persistence of successful results.
//! - [`service`]: gRPC `Controller` service.

pub mod orchestrator;
pub mod registry;
pub mod remote;
pub mod results;
pub mod service;

use crate::config::ControllerConfig;
use futures::Stream;
use logauge_tonic_core::proto::{FILE_DESCRIPTOR_SET, controller_server::ControllerServer};
use orchestrator::Orchestrator;
use remote::GrpcWorker;
use results::ResultsSink;
use service::ControllerService;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tonic::{
    codec::CompressionEncoding,
    transport::{Server, server::Connected},
};
use tonic_reflection::server::Builder;

/// Serves the controller on `incoming` and drives one run to completion.
///
/// Returns the results sink once the run is done. Cancelling `shutdown` from
/// outside (e.g. on SIGTERM) stops the server; a run still in progress after
/// the shutdown grace delay is abandoned with an error.
pub async fn run_controller<I, IO, IE, S>(
    config: ControllerConfig,
    incoming: I,
    sink: S,
    shutdown: CancellationToken,
) -> anyhow::Result<S>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
    S: ResultsSink,
{
    log_startup_info(&config);

    let (registrations_tx, registrations_rx) = mpsc::channel(config.num_workers.max(1) as usize);
    let service = ControllerService::new(&config, registrations_tx)?;
    let orchestrator = Orchestrator::<GrpcWorker, S>::new(&config, sink, shutdown.clone());
    let mut run = tokio::spawn(orchestrator.run(registrations_rx));

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<ControllerServer<ControllerService>>()
        .await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let stopped = {
        let shutdown = shutdown.clone();
        async move {
            shutdown.cancelled().await;
            health_reporter
                .set_not_serving::<ControllerServer<ControllerService>>()
                .await;
        }
    };

    Server::builder()
        .http2_adaptive_window(Some(true))
        .add_service(health_service)
        .add_service(reflection)
        .add_service(build_controller_service(service))
        .serve_with_incoming_shutdown(incoming, stopped)
        .await?;

    let sink = tokio::select! {
        joined = &mut run => joined??,
        () = tokio::time::sleep(config.shutdown_grace) => {
            run.abort();
            anyhow::bail!("Controller stopped before the run completed");
        }
    };
    tracing::info!("Run complete, controller shut down");
    Ok(sink)
}

fn build_controller_service(service: ControllerService) -> ControllerServer<ControllerService> {
    ControllerServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

fn log_startup_info(config: &ControllerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting controller on {} with full config: {:#?}",
            config.listen_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting controller on {} for {} worker(s), system={}",
            config.listen_addr,
            config.num_workers,
            config.system
        );
    }
}
