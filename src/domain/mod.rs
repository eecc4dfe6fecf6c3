//! Domain layer for the coupling engine
//!
//! This module contains the graph vocabulary (ids, links, buffers), the
//! search vocabulary (parameters, solutions, populations) and the port trait
//! simulation components implement.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{CouplingError, CouplingResult};
