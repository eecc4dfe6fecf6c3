//! Owner of every node in a coupled graph.

use std::rc::Rc;

use tracing::debug;

use crate::domain::errors::{CouplingError, CouplingResult};
use crate::domain::models::{Link, NodeId, UpstreamLink};
use crate::domain::ports::SimulationNode;

/// Holds the strong references to a graph's nodes.
///
/// Links only keep weak handles, so the composition must outlive every solve
/// that pulls through them.
#[derive(Default)]
pub struct Composition {
    nodes: Vec<Rc<dyn SimulationNode>>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `node` and hand back a typed shared handle.
    pub fn add<N: SimulationNode + 'static>(&mut self, node: N) -> CouplingResult<Rc<N>> {
        let node = Rc::new(node);
        let shared: Rc<dyn SimulationNode> = node.clone();
        self.insert(shared)?;
        Ok(node)
    }

    pub fn insert(&mut self, node: Rc<dyn SimulationNode>) -> CouplingResult<()> {
        if self.nodes.iter().any(|n| n.id() == node.id()) {
            return Err(CouplingError::InvalidConfig(format!(
                "node {} is already part of the composition",
                node.id()
            )));
        }
        debug!(node = %node.id(), "node added");
        self.nodes.push(node);
        Ok(())
    }

    pub fn node(&self, id: &NodeId) -> CouplingResult<Rc<dyn SimulationNode>> {
        self.nodes
            .iter()
            .find(|n| n.id() == id)
            .cloned()
            .ok_or_else(|| CouplingError::UnknownNode(id.clone()))
    }

    /// Resolve a link's source node.
    pub fn bind(&self, link: Link) -> CouplingResult<UpstreamLink> {
        let source = self.node(link.source())?;
        UpstreamLink::new(link, &source)
    }

    /// Node ids in insertion order.
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl std::fmt::Debug for Composition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composition")
            .field("nodes", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::nodes::AffineNode;
    use crate::domain::models::SimTime;

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut composition = Composition::new();
        composition.add(AffineNode::new("a", 1.0, 0.0)).unwrap();
        assert!(composition.add(AffineNode::new("a", 2.0, 0.0)).is_err());
        assert_eq!(composition.ids(), vec![NodeId::from("a")]);
    }

    #[test]
    fn test_bind_resolves_source() {
        let mut composition = Composition::new();
        composition.add(AffineNode::new("a", 3.0, 0.0)).unwrap();
        let upstream = composition
            .bind(Link::new("a.out", "a", AffineNode::OUTPUT, "ctl", "a"))
            .unwrap();
        assert_eq!(upstream.pull(SimTime(0.0)).unwrap(), vec![3.0]);

        let err = composition
            .bind(Link::new("z.out", "z", "out", "ctl", "z"))
            .unwrap_err();
        assert!(matches!(err, CouplingError::UnknownNode(_)));
    }

    #[test]
    fn test_links_die_with_the_composition() {
        let upstream = {
            let mut composition = Composition::new();
            composition.add(AffineNode::new("a", 1.0, 0.0)).unwrap();
            composition
                .bind(Link::new("a.out", "a", AffineNode::OUTPUT, "ctl", "a"))
                .unwrap()
        };
        assert!(matches!(
            upstream.pull(SimTime(0.0)),
            Err(CouplingError::NodeDropped(_))
        ));
    }
}
