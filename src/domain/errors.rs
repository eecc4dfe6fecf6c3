//! Domain errors for the coupling engine.

use thiserror::Error;

use super::models::ids::{ExchangeId, LinkId, NodeId};

/// Format an exchange-item list as `a, b, c`.
fn format_ids(ids: &[ExchangeId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Domain-level errors raised while wiring or solving a coupled graph.
///
/// Topology and configuration variants are fatal and surface before any
/// solve starts. [`CouplingError::NotYetAvailable`] is the only recoverable
/// variant: it answers a nested query that arrived before the controller
/// had written the requested key.
#[derive(Debug, Error)]
pub enum CouplingError {
    #[error("Link {0} is already registered on this controller")]
    DuplicateLink(LinkId),

    #[error("Link not found: {0}")]
    UnknownLink(LinkId),

    #[error("Node {node} has no output {output}")]
    UnknownOutput { node: NodeId, output: ExchangeId },

    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    #[error("Node {0} was dropped while still linked")]
    NodeDropped(NodeId),

    #[error("Controller {0} cannot be rewired while a solve is in progress")]
    TopologyLocked(NodeId),

    #[error("Controller {0} is already solving")]
    AlreadySolving(NodeId),

    #[error("Controller {0} has no cost-producing link")]
    MissingCostLink(NodeId),

    #[error("Cost link {0} produced no scalar")]
    EmptyCost(LinkId),

    #[error("Value for {id} on node {node} is not yet available")]
    NotYetAvailable { node: NodeId, id: ExchangeId },

    #[error("Outgoing link {link} reads unknown key {key}; known keys: {}", format_ids(.known))]
    UnboundOutput {
        link: LinkId,
        key: ExchangeId,
        known: Vec<ExchangeId>,
    },

    #[error("Length mismatch for {id}: buffered {expected} values, pulled {actual}")]
    LengthMismatch {
        id: ExchangeId,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid parameter descriptor '{input}': {reason}")]
    InvalidParameter { input: String, reason: String },

    #[error("Degenerate bounds for parameter {id}: min {min} must be below max {max}")]
    DegenerateBounds { id: ExchangeId, min: f64, max: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown state token {token} on node {node}")]
    UnknownStateToken { node: NodeId, token: u64 },

    #[error("Node {node} failed: {message}")]
    Node { node: NodeId, message: String },
}

impl CouplingError {
    /// Whether the caller can carry on with a fallback value.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotYetAvailable { .. })
    }
}

pub type CouplingResult<T> = Result<T, CouplingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_reentrant_miss_is_recoverable() {
        let miss = CouplingError::NotYetAvailable {
            node: NodeId::from("ctl"),
            id: ExchangeId::from("x"),
        };
        assert!(miss.is_recoverable());
        assert!(!CouplingError::MissingCostLink(NodeId::from("ctl")).is_recoverable());
    }

    #[test]
    fn test_unbound_output_lists_known_keys() {
        let err = CouplingError::UnboundOutput {
            link: LinkId::from("out"),
            key: ExchangeId::from("z"),
            known: vec![ExchangeId::from("a"), ExchangeId::from("b")],
        };
        assert_eq!(
            err.to_string(),
            "Outgoing link out reads unknown key z; known keys: a, b"
        );
    }
}
