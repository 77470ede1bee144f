//! Host Compute Service documents
//!
//! Serializes resource controls into the HCS schema used when a container
//! compute system is created.

pub mod config;

pub use config::{ComputeSystemConfig, ContainerConfig};
