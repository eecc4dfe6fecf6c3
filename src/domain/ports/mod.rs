//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interface external simulation components must
//! implement to take part in a coupled graph:
//! - SimulationNode: pull-based value access plus state checkpointing
//!
//! Controllers in `services` only ever talk to collaborators through this
//! trait, which keeps the solvers independent of any concrete engine.

pub mod simulation_node;

pub use simulation_node::{SimulationNode, StateToken};
