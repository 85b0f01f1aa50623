//! CLI command implementations

pub mod debug;
pub mod detections;
pub mod status;
