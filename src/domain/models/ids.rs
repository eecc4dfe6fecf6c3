//! Typed identifiers used across a coupled graph.
//!
//! Nodes, links and exchange items are all named by free text in composition
//! files. Wrapping each in its own newtype keeps a link id from being used
//! where a buffer key is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifies a simulation node within a composition.
    NodeId
);

string_id!(
    /// Identifies a link; unique within the controller that owns it.
    LinkId
);

string_id!(
    /// Names an exchange item: a node output, a node input, or a buffer key.
    ExchangeId
);

/// Simulation time of a query.
///
/// Controllers settle once per distinct time, so equality is exact.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(pub f64);

impl SimTime {
    /// Raw time value.
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<f64> for SimTime {
    fn from(t: f64) -> Self {
        Self(t)
    }
}
