//! Types shared by the controller and the workers.
//!
//! - [`WorkerId`]: position of a worker in the controller's registry.
//! - [`Phase`]: the remote calls the controller broadcasts.
//! - [`WorkerFailure`]: one failed outcome of a broadcast.

use core::{fmt, str::FromStr};

/// Worker ids are assigned in registration order, starting at 0, and are
/// never reused within a run.
pub type WorkerId = u32;

/// A broadcast phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Initialize,
    Gendata,
    Forward,
    Terminate,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Gendata => "gendata",
            Self::Forward => "forward",
            Self::Terminate => "terminate",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = crate::Error;

    fn from_str(name: &str) -> crate::Result<Self> {
        match name {
            "initialize" => Ok(Self::Initialize),
            "gendata" => Ok(Self::Gendata),
            "forward" => Ok(Self::Forward),
            "terminate" => Ok(Self::Terminate),
            _ => Err(crate::Error::InvalidRequest {
                reason: format!("Unknown phase: {name}"),
            }),
        }
    }
}

/// A worker whose phase call failed, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    pub worker_id: WorkerId,
    pub message: String,
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker={}: {}", self.worker_id, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_parse_back() {
        for phase in [Phase::Initialize, Phase::Gendata, Phase::Forward, Phase::Terminate] {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
        assert!("collect".parse::<Phase>().is_err());
    }
}
