//! Coupler - equilibration and calibration for coupled simulation graphs
//!
//! A supervisory controller sits in a graph of simulation nodes that pull
//! values from one another through links. Two controllers are provided:
//!
//! - [`Equilibrator`] drives its upstream nodes to a self-consistent state at
//!   one time step by damped fixed-point iteration.
//! - [`Evolver`] calibrates free parameters against a cost pulled back
//!   through the graph, using a steady-state genetic search.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): ids, links, buffers, solutions and the
//!   [`SimulationNode`] port
//! - **Service Layer** (`services`): the controllers, the genetic search and
//!   graph composition
//! - **Adapters** (`adapters`): reference nodes
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```
//! use coupler::adapters::nodes::AffineNode;
//! use coupler::domain::models::{EquilibratorConfig, Link, SimTime};
//! use coupler::{Composition, Equilibrator};
//!
//! let mut graph = Composition::new();
//! let ctl = graph.add(Equilibrator::new("ctl", EquilibratorConfig::default())?)?;
//! graph.add(AffineNode::new("a", 0.5, 0.0))?;
//! ctl.connect_input(graph.bind(Link::new("a.out", "a", "out", "ctl", "a"))?)?;
//!
//! let report = ctl.solve(SimTime(0.0))?;
//! assert!(report.converged);
//! # Ok::<(), coupler::CouplingError>(())
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Config, EquilibratorConfig, EvolverConfig, ExchangeId, Link, LinkId, NodeId, SimTime,
};
pub use domain::ports::{SimulationNode, StateToken};
pub use domain::{CouplingError, CouplingResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{Composition, Equilibrator, EvolutionReport, Evolver, SolveReport};
