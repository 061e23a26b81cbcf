//! Error types for workload loading, data generation and forwarding.
//!
//! Configuration problems (`Config`, `UnsupportedSystem`,
//! `UnknownDestination`, `TimestampFormat`, `Yaml`, `Json`) are fatal at
//! startup. I/O failures during a run (`Io`, `EmptyTemplate`, `Forward`) are
//! reported back to the controller as a failed phase.

use std::path::{Path, PathBuf};

pub type Result<T> = core::result::Result<T, Error>;

/// All errors the `logauge` core can produce.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A workload or generator parameter is out of range.
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// The workload names a system this build does not know.
    #[error("system={name} is not supported")]
    UnsupportedSystem { name: String },

    /// The workload selects a forward destination that does not exist.
    #[error("Unknown forward destination: {name}")]
    UnknownDestination { name: String },

    /// The timestamp format contains an invalid strftime specifier.
    #[error("Invalid timestamp format: {format:?}")]
    TimestampFormat { format: String },

    /// Filesystem failure, tagged with the path being accessed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The template file has no lines to replay.
    #[error("Template {} contains no lines", path.display())]
    EmptyTemplate { path: PathBuf },

    /// Shipping generated files to the destination failed.
    #[error("Forwarding to {destination} failed: {source}")]
    Forward {
        destination: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to parse workload: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unable to encode workload: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` for errors caused by the configuration rather than by
    /// the environment the run executes in.
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::UnsupportedSystem { .. }
                | Self::UnknownDestination { .. }
                | Self::TimestampFormat { .. }
                | Self::Yaml(_)
                | Self::Json(_)
        )
    }
}

/// Attaches the offending path to an [`std::io::Error`].
pub trait IoContext<T> {
    fn with_path(self, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn with_path(self, path: &Path) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
