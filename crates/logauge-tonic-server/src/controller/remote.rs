use logauge_tonic_core::{
    Result,
    proto::{PhaseRequest, SetIdRequest, TerminateRequest, worker_client::WorkerClient},
    types::{Phase, WorkerId},
};
use tonic::{
    codec::CompressionEncoding,
    transport::{Channel, Endpoint},
};

/// Handle the controller uses to call into one worker.
///
/// Every call settles into a `Result`; the orchestrator never cancels one.
#[tonic::async_trait]
pub trait RemoteWorker: Send + Sync + 'static {
    /// Endpoint the worker registered with.
    fn endpoint(&self) -> &str;

    async fn set_id(&self, worker_id: WorkerId) -> Result<()>;

    /// Runs `phase` on the worker and returns its report.
    async fn run_phase(&self, phase: Phase, payload: &str) -> Result<String>;

    async fn terminate(&self) -> Result<String> {
        self.run_phase(Phase::Terminate, "").await
    }
}

/// [`RemoteWorker`] over a tonic channel.
#[derive(Debug, Clone)]
pub struct GrpcWorker {
    endpoint: String,
    client: WorkerClient<Channel>,
}

impl GrpcWorker {
    /// Builds a handle without connecting. The connection is made on the
    /// first call and re-established on later calls if it drops.
    pub fn connect_lazy(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let channel = Endpoint::from_shared(endpoint.clone())?.connect_lazy();
        let client = WorkerClient::new(channel)
            .send_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Deflate);
        Ok(Self { endpoint, client })
    }
}

#[tonic::async_trait]
impl RemoteWorker for GrpcWorker {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn set_id(&self, worker_id: WorkerId) -> Result<()> {
        self.client
            .clone()
            .set_id(SetIdRequest { worker_id })
            .await?;
        Ok(())
    }

    async fn run_phase(&self, phase: Phase, payload: &str) -> Result<String> {
        let request = PhaseRequest {
            phase: phase.as_str().to_string(),
            payload: payload.to_string(),
        };
        let mut client = self.client.clone();
        let reply = match phase {
            Phase::Initialize => client.initialize(request).await?,
            Phase::Gendata => client.gendata(request).await?,
            Phase::Forward => client.forward(request).await?,
            Phase::Terminate => client.terminate(TerminateRequest {}).await?,
        };
        Ok(reply.into_inner().report)
    }
}
