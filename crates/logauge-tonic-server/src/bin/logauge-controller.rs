use clap::Parser;
use logauge_tonic_server::{
    config::{ControllerArgs, ControllerConfig},
    controller::{results::FileResultsSink, run_controller},
    shutdown::cancel_on_signal,
    telemetry::init_telemetry,
};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = ControllerArgs::parse();
    let config = ControllerConfig::try_from(args)?;

    let providers = init_telemetry("logauge-controller")?;

    let sink = FileResultsSink::open(&config.results_file)?;
    let listener = TcpListener::bind(&config.listen_addr).await?;
    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let res = run_controller(config, TcpListenerStream::new(listener), sink, shutdown).await;
    if let Ok(sink) = &res {
        tracing::info!("Results written to {}", sink.path().display());
    }
    providers.shutdown();
    res.map(drop)
}
