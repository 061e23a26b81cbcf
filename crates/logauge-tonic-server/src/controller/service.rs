//! gRPC entry point of the controller.
//!
//! [`ControllerService`] answers `Info` from the loaded workload and turns
//! every `AcceptWorker` call into a [`Registration`] for the orchestration
//! task, waiting for its verdict.

use super::{orchestrator::Registration, remote::GrpcWorker};
use crate::config::ControllerConfig;
use logauge_tonic_core::{
    Error,
    proto::{
        AcceptWorkerRequest, AcceptWorkerResponse, InfoRequest, InfoResponse,
        controller_server::Controller,
    },
};
use tokio::sync::{mpsc, oneshot};
use tonic::{Request, Response, Status};

#[derive(Clone)]
pub struct ControllerService {
    system: String,
    workload_json: String,
    registrations: mpsc::Sender<Registration<GrpcWorker>>,
}

impl ControllerService {
    pub fn new(
        config: &ControllerConfig,
        registrations: mpsc::Sender<Registration<GrpcWorker>>,
    ) -> Result<Self, Error> {
        Ok(Self {
            system: config.system.to_string(),
            workload_json: config.workload.to_json()?,
            registrations,
        })
    }
}

#[tonic::async_trait]
impl Controller for ControllerService {
    async fn info(&self, _req: Request<InfoRequest>) -> Result<Response<InfoResponse>, Status> {
        Ok(Response::new(InfoResponse {
            system: self.system.clone(),
            workload_json: self.workload_json.clone(),
        }))
    }

    #[tracing::instrument(skip_all, fields(endpoint = %req.get_ref().endpoint))]
    async fn accept_worker(
        &self,
        req: Request<AcceptWorkerRequest>,
    ) -> Result<Response<AcceptWorkerResponse>, Status> {
        let endpoint = req.into_inner().endpoint;
        if endpoint.trim().is_empty() {
            tracing::warn!("Ignoring registration with an empty endpoint");
            return Ok(Response::new(AcceptWorkerResponse { accepted: false }));
        }

        let handle = GrpcWorker::connect_lazy(endpoint.trim()).map_err(|e| Error::InvalidRequest {
            reason: format!("Invalid worker endpoint {endpoint:?}: {e}"),
        })?;
        let (reply, verdict) = oneshot::channel();
        self.registrations
            .send(Registration { handle, reply })
            .await
            .map_err(|_| Error::RegistrationClosed)?;
        let accepted = verdict.await.map_err(|_| Error::RegistrationClosed)?;

        Ok(Response::new(AcceptWorkerResponse { accepted }))
    }
}
