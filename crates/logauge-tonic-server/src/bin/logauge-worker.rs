use clap::Parser;
use logauge_tonic_server::{
    config::{WorkerArgs, WorkerConfig},
    shutdown::cancel_on_signal,
    telemetry::init_telemetry,
    worker::run_worker,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = WorkerArgs::parse();
    let config = WorkerConfig::try_from(args)?;

    let providers = init_telemetry("logauge-worker")?;

    let listener = TcpListener::bind(&config.listen_addr).await?;
    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let res = run_worker(config, listener, shutdown).await;
    providers.shutdown();
    res
}
