//! Reference simulation nodes used by the CLI rigs and the test-suite.

pub mod affine;
pub mod quadratic_cost;

pub use affine::AffineNode;
pub use quadratic_cost::QuadraticCostNode;
