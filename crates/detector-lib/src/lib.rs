//! Detector library for SDN DoS detection
//!
//! This crate provides the core functionality for:
//! - Flow statistics collection from switches
//! - Flow-removal reconciliation across polling epochs
//! - Linear classification of per-port traffic features
//! - Detection history for the control API
//! - Health checks and observability

pub mod classifier;
pub mod engine;
pub mod health;
pub mod history;
pub mod models;
pub mod observability;
pub mod removal;
pub mod southbound;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{DetectorLogger, DetectorMetrics};
