//! Forward destinations.
//!
//! The `forward` phase ships the files a worker generated to the destination
//! named by [`ForwardParams::destination`]. Destinations are resolved by
//! [`forwarder`] when the workload is validated, so an unknown name fails at
//! startup rather than mid-run.

use crate::{Error, ForwardParams, Result};
use core::time::Duration;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    net::{TcpStream, ToSocketAddrs},
    path::{Path, PathBuf},
};

/// Connect and write timeout of [`TcpForwarder`].
pub const TCP_TIMEOUT: Duration = Duration::from_secs(30);

/// What a [`Forwarder`] shipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shipment {
    pub files: usize,
    pub bytes: u64,
}

/// Ships generated files somewhere.
pub trait Forwarder: Send + Sync {
    /// Destination name as written in the workload.
    fn name(&self) -> &str;

    /// Ships `files` in order. Shipping stops at the first failure; files
    /// already shipped stay shipped.
    fn forward(&self, files: &[PathBuf]) -> Result<Shipment>;
}

/// Resolves the destination selected by `params`.
///
/// # Errors
///
/// Returns [`Error::UnknownDestination`] for names other than `none`,
/// `directory` and `tcp`, and [`Error::Config`] when the destination's
/// required key is missing.
pub fn forwarder(params: &ForwardParams) -> Result<Box<dyn Forwarder>> {
    match params.destination.as_str() {
        "none" => Ok(Box::new(NullForwarder)),
        "directory" => {
            let dir = params.path.clone().ok_or_else(|| missing("path", "directory"))?;
            Ok(Box::new(DirectoryForwarder::new(dir)))
        }
        "tcp" => {
            let address = params
                .address
                .clone()
                .ok_or_else(|| missing("address", "tcp"))?;
            let forwarder = match params.timeout_s {
                Some(0) => {
                    return Err(Error::Config {
                        reason: "forward.timeout_s must be greater than 0".to_string(),
                    });
                }
                Some(secs) => TcpForwarder::new(address).with_timeout(Duration::from_secs(secs)),
                None => TcpForwarder::new(address),
            };
            Ok(Box::new(forwarder))
        }
        other => Err(Error::UnknownDestination {
            name: other.to_string(),
        }),
    }
}

fn missing(key: &str, destination: &str) -> Error {
    Error::Config {
        reason: format!("forward.{key} is required for destination {destination}"),
    }
}

/// Leaves files where they are and only accounts for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullForwarder;

impl Forwarder for NullForwarder {
    fn name(&self) -> &str {
        "none"
    }

    fn forward(&self, files: &[PathBuf]) -> Result<Shipment> {
        let mut shipment = Shipment::default();
        for file in files {
            shipment.files += 1;
            shipment.bytes += file_len(file, self.name())?;
        }
        Ok(shipment)
    }
}

/// Copies files into a directory, keeping their names.
#[derive(Debug, Clone)]
pub struct DirectoryForwarder {
    dir: PathBuf,
}

impl DirectoryForwarder {
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl Forwarder for DirectoryForwarder {
    fn name(&self) -> &str {
        "directory"
    }

    fn forward(&self, files: &[PathBuf]) -> Result<Shipment> {
        std::fs::create_dir_all(&self.dir).map_err(|e| self.failed(e))?;
        let mut shipment = Shipment::default();
        for file in files {
            let Some(name) = file.file_name() else {
                continue;
            };
            let target = self.dir.join(name);
            let bytes = std::fs::copy(file, &target).map_err(|e| self.failed(e))?;
            tracing::debug!("Copied {} to {}", file.display(), target.display());
            shipment.files += 1;
            shipment.bytes += bytes;
        }
        Ok(shipment)
    }
}

impl DirectoryForwarder {
    fn failed(&self, source: io::Error) -> Error {
        Error::Forward {
            destination: format!("directory {}", self.dir.display()),
            source,
        }
    }
}

/// Streams file contents to a TCP listener, one connection per call.
///
/// Connecting and every write give up after the configured timeout, so an
/// unresponsive destination fails the shipment instead of stalling it.
#[derive(Debug, Clone)]
pub struct TcpForwarder {
    address: String,
    timeout: Duration,
}

impl TcpForwarder {
    pub const fn new(address: String) -> Self {
        Self {
            address,
            timeout: TCP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Tries every resolved address in turn.
    fn connect(&self) -> io::Result<TcpStream> {
        let mut last = None;
        for addr in self.address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_write_timeout(Some(self.timeout))?;
                    return Ok(stream);
                }
                Err(e) => last = Some(e),
            }
        }
        Err(last.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
        }))
    }

    fn failed(&self, source: io::Error) -> Error {
        Error::Forward {
            destination: format!("tcp {}", self.address),
            source,
        }
    }
}

impl Forwarder for TcpForwarder {
    fn name(&self) -> &str {
        "tcp"
    }

    fn forward(&self, files: &[PathBuf]) -> Result<Shipment> {
        let stream = self.connect().map_err(|e| self.failed(e))?;
        let mut out = BufWriter::new(stream);
        let mut shipment = Shipment::default();
        for file in files {
            let mut input = File::open(file).map_err(|e| self.failed(e))?;
            let bytes = io::copy(&mut input, &mut out).map_err(|e| self.failed(e))?;
            shipment.files += 1;
            shipment.bytes += bytes;
        }
        out.flush().map_err(|e| self.failed(e))?;
        Ok(shipment)
    }
}

fn file_len(path: &Path, destination: &str) -> Result<u64> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|source| Error::Forward {
            destination: destination.to_string(),
            source,
        })
}
