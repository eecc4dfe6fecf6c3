//! Adapters: concrete simulation nodes.

pub mod nodes;
