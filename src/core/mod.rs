//! Core types shared across Waymark.
//!
//! Currently just configuration.

mod config;

pub use config::{Config, VerifyConfig, WorkflowConfig};
