//! Builds the gRPC client and server code for `proto/logauge.proto`.
//!
//! Both the `Controller` and the `Worker` services are generated with clients
//! and servers: workers call the controller to register, and the controller
//! calls back into every worker to drive the phases.
//!
//! A file descriptor set is written next to the generated code so the binaries
//! can serve gRPC reflection:
//!
//! ```rust,ignore
//! pub mod proto {
//!     tonic::include_proto!("logauge");
//!     pub const FILE_DESCRIPTOR_SET: &[u8] =
//!         tonic::include_file_descriptor_set!("logauge_descriptor");
//! }
//! ```
use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=proto/logauge.proto");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("logauge_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/logauge.proto"], &["proto"])
        .unwrap();
}
