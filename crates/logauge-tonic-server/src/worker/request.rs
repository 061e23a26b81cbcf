use logauge_tonic_core::{
    Result,
    types::{Phase, WorkerId},
};
use tokio::sync::oneshot;

/// A message from the gRPC handlers to the worker task.
///
/// Requests travel over a channel of capacity 1, so at most one call waits
/// while another is being processed. Each carries a one-shot channel for the
/// outcome.
#[derive(Debug)]
pub enum WorkRequest {
    /// Store the id the controller assigned.
    SetId {
        worker_id: WorkerId,
        response: oneshot::Sender<Result<()>>,
    },

    /// Run one phase and report on it.
    Phase {
        phase: Phase,
        payload: String,
        response: oneshot::Sender<Result<String>>,
    },
}
