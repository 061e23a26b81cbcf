#![doc = include_str!("../README.md")]

mod datagen;
mod error;
mod forward;
mod marker;
mod workload;

pub use crate::datagen::*;
pub use crate::error::*;
pub use crate::forward::*;
pub use crate::marker::*;
pub use crate::workload::*;
