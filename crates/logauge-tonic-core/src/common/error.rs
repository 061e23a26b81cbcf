//! Error types for the controller and worker services.
//!
//! `From<Error>` for `tonic::Status` lets handlers return these errors with
//! `?`, and the controller turns a failed remote call back into an
//! [`Error::Remote`].
//!
//! ## Error Cases
//! - `ChannelError`: an internal channel between tasks closed.
//! - `Core`: workload, generation or forwarding failed in the core library.
//! - `Registration`: a worker registration was ignored.
//! - `RegistrationClosed`: the run no longer accepts workers.
//! - `PhaseFailed`: one or more workers failed a broadcast phase.
//! - `Timeout`: a remote call did not settle in time.
//! - `Remote`: a remote call returned an error status.
//! - `Transport`: a connection could not be set up.
//! - `InvalidRequest`: a request was malformed or arrived out of order.
//! - `ServiceShutdown`: a request arrived while the service was shutting down.

use crate::types::WorkerFailure;
use core::time::Duration;
use tonic::Status;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Internal channel send/receive failure.
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    #[error(transparent)]
    Core(#[from] logauge::Error),

    /// The registration was logged and ignored.
    #[error("Registration rejected: {reason}")]
    Registration { reason: String },

    #[error("Registration is closed")]
    RegistrationClosed,

    /// Every failing worker of one phase.
    #[error("Phase {phase} failed: {}", describe(.failures))]
    PhaseFailed {
        phase: String,
        failures: Vec<WorkerFailure>,
    },

    #[error("Call did not settle within {after:?}")]
    Timeout { after: Duration },

    #[error("Remote call failed: {}", .0.message())]
    Remote(#[from] Status),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Service is shutting down")]
    ServiceShutdown,
}

fn describe(failures: &[WorkerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::ChannelError { context } => Status::internal(format!("Channel error: {context}")),
            Error::Core(e) if e.is_config() => Status::failed_precondition(e.to_string()),
            Error::Core(e) => Status::internal(e.to_string()),
            Error::Registration { reason } => Status::invalid_argument(reason),
            Error::RegistrationClosed => Status::failed_precondition("Registration is closed"),
            e @ Error::PhaseFailed { .. } => Status::aborted(e.to_string()),
            e @ Error::Timeout { .. } => Status::deadline_exceeded(e.to_string()),
            Error::Remote(status) => status,
            Error::Transport(e) => Status::unavailable(e.to_string()),
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn phase_failure_names_every_worker() {
        let err = Error::PhaseFailed {
            phase: "gendata".to_string(),
            failures: vec![
                WorkerFailure {
                    worker_id: 1,
                    message: "disk full".to_string(),
                },
                WorkerFailure {
                    worker_id: 3,
                    message: "template missing".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Phase gendata failed: worker=1: disk full; worker=3: template missing"
        );
        assert_eq!(Status::from(err).code(), Code::Aborted);
    }

    #[test]
    fn config_errors_are_failed_preconditions() {
        let err = Error::Core(logauge::Error::UnsupportedSystem {
            name: "x".to_string(),
        });
        assert_eq!(Status::from(err).code(), Code::FailedPrecondition);
    }

    #[test]
    fn remote_status_passes_through() {
        let status = Status::not_found("gone");
        let back = Status::from(Error::from(status));
        assert_eq!(back.code(), Code::NotFound);
        assert_eq!(back.message(), "gone");
    }
}
