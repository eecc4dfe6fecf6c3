pub mod config;
pub mod ids;
pub mod link;
pub mod parameter;
pub mod population;
pub mod solution;
pub mod solve_state;
pub mod value_buffer;

pub use config::{
    AffineNodeConfig, CalibrationConfig, Config, EquilibratorConfig, EvolverConfig,
    LoggingConfig, NetworkConfig,
};
pub use ids::{ExchangeId, LinkId, NodeId, SimTime};
pub use link::{Link, UpstreamLink};
pub use parameter::ParameterDescriptor;
pub use population::Population;
pub use solution::{SearchBounds, Solution};
pub use solve_state::{Demand, SolveGuard, SolveState};
pub use value_buffer::ValueBuffer;
