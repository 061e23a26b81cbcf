#![doc = include_str!("../README.md")]

mod common;
pub use common::*;
// Public re-export so downstream crates can reach the core library via
// `logauge_tonic_core::logauge`
pub use logauge;
