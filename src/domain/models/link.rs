//! Directed connections between node outputs and node inputs.

use serde::{Deserialize, Serialize};
use std::rc::{Rc, Weak};

use super::ids::{ExchangeId, LinkId, NodeId, SimTime};
use crate::domain::errors::{CouplingError, CouplingResult};
use crate::domain::ports::SimulationNode;

/// A directed edge `(source, source_output) -> (target, target_input)`.
///
/// Immutable once constructed. A link only names its endpoints; pulling
/// through it requires an [`UpstreamLink`], which also holds the source node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    id: LinkId,
    source: NodeId,
    source_output: ExchangeId,
    target: NodeId,
    target_input: ExchangeId,
}

impl Link {
    pub fn new(
        id: impl Into<LinkId>,
        source: impl Into<NodeId>,
        source_output: impl Into<ExchangeId>,
        target: impl Into<NodeId>,
        target_input: impl Into<ExchangeId>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            source_output: source_output.into(),
            target: target.into(),
            target_input: target_input.into(),
        }
    }

    pub const fn id(&self) -> &LinkId {
        &self.id
    }

    pub const fn source(&self) -> &NodeId {
        &self.source
    }

    pub const fn source_output(&self) -> &ExchangeId {
        &self.source_output
    }

    pub const fn target(&self) -> &NodeId {
        &self.target
    }

    pub const fn target_input(&self) -> &ExchangeId {
        &self.target_input
    }
}

/// A link together with a handle on its source node, ready to be pulled.
///
/// The source is held weakly: the composition owns every node, so feedback
/// loops between a controller and its upstream nodes never keep each other
/// alive.
#[derive(Clone)]
pub struct UpstreamLink {
    link: Link,
    node: Weak<dyn SimulationNode>,
}

impl UpstreamLink {
    /// Bind a link to its source node.
    ///
    /// Fails when the node's id does not match the link's declared source.
    pub fn new(link: Link, node: &Rc<dyn SimulationNode>) -> CouplingResult<Self> {
        if node.id() != link.source() {
            return Err(CouplingError::InvalidConfig(format!(
                "link {} declares source {} but was bound to node {}",
                link.id(),
                link.source(),
                node.id()
            )));
        }
        Ok(Self {
            link,
            node: Rc::downgrade(node),
        })
    }

    /// Bind a link to a concretely typed source node.
    pub fn from_node<N: SimulationNode + 'static>(link: Link, node: &Rc<N>) -> CouplingResult<Self> {
        let node: Rc<dyn SimulationNode> = node.clone();
        Self::new(link, &node)
    }

    pub const fn link(&self) -> &Link {
        &self.link
    }

    /// Upgrade the source handle.
    pub fn node(&self) -> CouplingResult<Rc<dyn SimulationNode>> {
        self.node
            .upgrade()
            .ok_or_else(|| CouplingError::NodeDropped(self.link.source().clone()))
    }

    /// Pull the source output at `time`.
    pub fn pull(&self, time: SimTime) -> CouplingResult<Vec<f64>> {
        self.node()?.get_value(time, self.link.source_output())
    }
}

impl std::fmt::Debug for UpstreamLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamLink")
            .field("link", &self.link)
            .field("alive", &(self.node.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::StateToken;

    struct Fixed {
        id: NodeId,
    }

    impl SimulationNode for Fixed {
        fn id(&self) -> &NodeId {
            &self.id
        }

        fn get_value(&self, _time: SimTime, _output: &ExchangeId) -> CouplingResult<Vec<f64>> {
            Ok(vec![1.5, 2.5])
        }

        fn keep_state(&self) -> CouplingResult<StateToken> {
            Ok(StateToken(0))
        }

        fn restore_state(&self, _token: &StateToken) -> CouplingResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_pull_reads_source_output() {
        let node = Rc::new(Fixed { id: "a".into() });
        let upstream =
            UpstreamLink::from_node(Link::new("l1", "a", "out", "ctl", "a_in"), &node).unwrap();
        assert_eq!(upstream.pull(SimTime(0.0)).unwrap(), vec![1.5, 2.5]);
    }

    #[test]
    fn test_binding_rejects_wrong_source() {
        let node = Rc::new(Fixed { id: "a".into() });
        let result = UpstreamLink::from_node(Link::new("l1", "b", "out", "ctl", "b_in"), &node);
        assert!(matches!(result, Err(CouplingError::InvalidConfig(_))));
    }

    #[test]
    fn test_pull_after_drop_reports_node() {
        let node = Rc::new(Fixed { id: "a".into() });
        let upstream =
            UpstreamLink::from_node(Link::new("l1", "a", "out", "ctl", "a_in"), &node).unwrap();
        drop(node);
        match upstream.pull(SimTime(0.0)) {
            Err(CouplingError::NodeDropped(id)) => assert_eq!(id.as_str(), "a"),
            other => panic!("expected NodeDropped, got {other:?}"),
        }
    }
}
