pub mod error;
pub mod types;

pub use error::{Error, Result};

/// Generated protobuf messages, clients and servers.
pub mod proto {
    tonic::include_proto!("logauge");

    /// Encoded descriptor set, served through gRPC reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("logauge_descriptor");
}
