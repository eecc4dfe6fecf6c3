//! Per-controller solve state machine.
//!
//! ```text
//!            begin             settle(t)
//!   Idle ───────────▶ Solving ───────────▶ Settled { t }
//!    ▲                  │                       │
//!    └── guard dropped ─┘◀──── begin (t' ≠ t) ──┘
//! ```
//!
//! A solve is entered only through [`SolveGuard::begin`]. Dropping the guard
//! without settling returns the controller to `Idle`, so an error propagated
//! with `?` or a panic in an upstream node never leaves it stuck in `Solving`.

use serde::{Deserialize, Serialize};
use std::cell::Cell;

use super::ids::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SolveState {
    /// Nothing buffered is known to be current.
    #[default]
    Idle,
    /// A solve is running; nested queries read the buffer.
    Solving,
    /// The buffer holds the settled result for `time`.
    Settled { time: SimTime },
}

/// What a controller should do with an incoming query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demand {
    /// Run a full solve before answering.
    Solve,
    /// Answer from the buffer as it stands.
    ReadBuffer,
}

impl SolveState {
    pub fn on_query(self, time: SimTime) -> Demand {
        match self {
            Self::Idle => Demand::Solve,
            Self::Solving => Demand::ReadBuffer,
            Self::Settled { time: settled } if settled == time => Demand::ReadBuffer,
            Self::Settled { .. } => Demand::Solve,
        }
    }

    pub const fn is_solving(self) -> bool {
        matches!(self, Self::Solving)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Solving => "solving",
            Self::Settled { .. } => "settled",
        }
    }
}

/// Holds a controller in `Solving` for the lifetime of one solve.
#[derive(Debug)]
pub struct SolveGuard<'a> {
    state: &'a Cell<SolveState>,
    armed: bool,
}

impl<'a> SolveGuard<'a> {
    /// Enter `Solving`. Returns `None` if a solve is already running.
    pub fn begin(state: &'a Cell<SolveState>) -> Option<Self> {
        if state.get().is_solving() {
            return None;
        }
        state.set(SolveState::Solving);
        Some(Self { state, armed: true })
    }

    /// Leave `Solving` for `Settled { time }`.
    pub fn settle(mut self, time: SimTime) {
        self.state.set(SolveState::Settled { time });
        self.armed = false;
    }
}

impl Drop for SolveGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.set(SolveState::Idle);
        }
    }
}
