#![doc = include_str!("../README.md")]

pub mod config;
pub mod controller;
pub mod shutdown;
pub mod telemetry;
pub mod worker;
