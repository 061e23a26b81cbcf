//! gRPC entry point of a worker.
//!
//! Every handler forwards its call to the worker task and waits for the
//! outcome, so the controller observes phases in the order the task ran
//! them.

use super::request::WorkRequest;
use logauge_tonic_core::{
    Error, Result,
    proto::{
        PhaseReply, PhaseRequest, SetIdRequest, SetIdResponse, TerminateRequest,
        worker_server::Worker,
    },
    types::Phase,
};
use tokio::sync::{mpsc, oneshot};
use tonic::{Request, Response, Status};

#[derive(Clone)]
pub struct WorkerService {
    requests: mpsc::Sender<WorkRequest>,
}

impl WorkerService {
    pub const fn new(requests: mpsc::Sender<WorkRequest>) -> Self {
        Self { requests }
    }

    async fn submit<T>(
        &self,
        request: WorkRequest,
        response: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        self.requests
            .send(request)
            .await
            .map_err(|_| Error::ServiceShutdown)?;
        response.await.map_err(|_| Error::ChannelError {
            context: "worker task dropped the request".to_string(),
        })?
    }

    async fn run_phase(&self, phase: Phase, payload: String) -> Result<Response<PhaseReply>, Status> {
        let (response, rx) = oneshot::channel();
        let report = self
            .submit(
                WorkRequest::Phase {
                    phase,
                    payload,
                    response,
                },
                rx,
            )
            .await?;
        Ok(Response::new(PhaseReply { report }))
    }
}

/// Rejects requests addressed to another phase than the method called.
fn payload_for(phase: Phase, req: Request<PhaseRequest>) -> Result<String> {
    let PhaseRequest {
        phase: requested,
        payload,
    } = req.into_inner();
    if !requested.is_empty() && requested.parse::<Phase>()? != phase {
        return Err(Error::InvalidRequest {
            reason: format!("{phase} called with phase={requested}"),
        });
    }
    Ok(payload)
}

#[tonic::async_trait]
impl Worker for WorkerService {
    async fn set_id(&self, req: Request<SetIdRequest>) -> Result<Response<SetIdResponse>, Status> {
        let worker_id = req.into_inner().worker_id;
        let (response, rx) = oneshot::channel();
        self.submit(
            WorkRequest::SetId {
                worker_id,
                response,
            },
            rx,
        )
        .await?;
        Ok(Response::new(SetIdResponse {}))
    }

    async fn initialize(&self, req: Request<PhaseRequest>) -> Result<Response<PhaseReply>, Status> {
        let payload = payload_for(Phase::Initialize, req)?;
        self.run_phase(Phase::Initialize, payload).await
    }

    async fn gendata(&self, req: Request<PhaseRequest>) -> Result<Response<PhaseReply>, Status> {
        let payload = payload_for(Phase::Gendata, req)?;
        self.run_phase(Phase::Gendata, payload).await
    }

    async fn forward(&self, req: Request<PhaseRequest>) -> Result<Response<PhaseReply>, Status> {
        let payload = payload_for(Phase::Forward, req)?;
        self.run_phase(Phase::Forward, payload).await
    }

    async fn terminate(
        &self,
        _req: Request<TerminateRequest>,
    ) -> Result<Response<PhaseReply>, Status> {
        self.run_phase(Phase::Terminate, String::new()).await
    }
}
