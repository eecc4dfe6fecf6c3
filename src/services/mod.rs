pub mod composition;
pub mod controller;
pub mod equilibrator;
pub mod evolver;
pub mod genetic;
pub mod wiring;

pub use composition::Composition;
pub use controller::{Checkpoint, ControllerCore};
pub use equilibrator::{Equilibrator, SolveReport};
pub use evolver::{EvolutionReport, Evolver};
pub use genetic::{SearchOutcome, SteadyStateSearch};
pub use wiring::{CalibrationRig, NetworkOutcome, NetworkRig, NodeValue};
