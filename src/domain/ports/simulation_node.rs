use crate::domain::errors::CouplingResult;
use crate::domain::models::ids::{ExchangeId, NodeId, SimTime};

/// Opaque handle to a node state captured by [`SimulationNode::keep_state`].
///
/// Only the node that issued a token knows what it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateToken(pub u64);

impl std::fmt::Display for StateToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Port for a pull-driven simulation component.
///
/// Evaluation is demand-driven: a downstream node calls [`get_value`] on its
/// upstream nodes, which may in turn pull from theirs, including from the
/// caller itself when the graph has a feedback loop. All methods take `&self`;
/// implementations mutate through interior mutability and must never hold a
/// borrow across a call into another node.
///
/// # Examples
///
/// ```no_run
/// use coupler::domain::ports::SimulationNode;
/// use coupler::domain::models::ids::{ExchangeId, SimTime};
///
/// fn sample(node: &dyn SimulationNode) -> coupler::CouplingResult<f64> {
///     let values = node.get_value(SimTime(0.0), &ExchangeId::from("out"))?;
///     Ok(values.iter().sum())
/// }
/// ```
///
/// [`get_value`]: SimulationNode::get_value
pub trait SimulationNode {
    /// Identifier of this node within its composition
    fn id(&self) -> &NodeId;

    /// Pull the value of an output at the given time
    ///
    /// Pulling may advance the node's internal computation, so two pulls at
    /// the same time are not guaranteed to agree unless state was restored in
    /// between.
    ///
    /// # Arguments
    ///
    /// * `time` - Simulation time of the query
    /// * `output` - Output exchange item to read
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<f64>)` - One scalar per spatial element of the output
    /// * `Err(CouplingError)` - Unknown output, a failed upstream pull, or a
    ///   recoverable [`NotYetAvailable`](crate::CouplingError::NotYetAvailable)
    fn get_value(&self, time: SimTime, output: &ExchangeId) -> CouplingResult<Vec<f64>>;

    /// Capture everything that affects the next `get_value`
    fn keep_state(&self) -> CouplingResult<StateToken>;

    /// Roll the node back to a state captured by `keep_state`
    fn restore_state(&self, token: &StateToken) -> CouplingResult<()>;

    /// Release a captured state; the token is not used again
    fn clear_state(&self, token: StateToken) -> CouplingResult<()> {
        let _ = token;
        Ok(())
    }
}
