//! Node lifecycle state machine.
//!
//! ```text
//!  Booting ─▶ Configuring ─▶ Connecting ─▶ Initializing ─▶ Polling ─┐
//!                               ▲   │                        ▲  │   │
//!                               │   ▼                        └──┘   │
//!                               └─ Portal ◀──────────────────────────┘
//! ```
//!
//! The table below is the single source of truth for legal transitions.
//! Each row lists the successors of one state; [`Lifecycle::advance`]
//! rejects anything else with [`Error::Lifecycle`].  There is no terminal
//! state: a fatal Connecting failure is handled by restarting the chip,
//! which re-enters `Booting`.

use log::info;

use crate::error::{Error, Result};

/// Every state the node can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeState {
    Booting = 0,
    Configuring = 1,
    Connecting = 2,
    Initializing = 3,
    Polling = 4,
    /// External provisioning portal (entered via the physical button).
    Portal = 5,
}

impl NodeState {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 6;
}

/// Static descriptor for a single lifecycle state.
pub struct StateDescriptor {
    pub id: NodeState,
    pub name: &'static str,
    pub successors: &'static [NodeState],
}

const TABLE: [StateDescriptor; NodeState::COUNT] = [
    StateDescriptor {
        id: NodeState::Booting,
        name: "BOOTING",
        successors: &[NodeState::Configuring],
    },
    StateDescriptor {
        id: NodeState::Configuring,
        name: "CONFIGURING",
        successors: &[NodeState::Connecting],
    },
    StateDescriptor {
        id: NodeState::Connecting,
        name: "CONNECTING",
        successors: &[NodeState::Initializing, NodeState::Portal],
    },
    StateDescriptor {
        id: NodeState::Initializing,
        name: "INITIALIZING",
        successors: &[NodeState::Polling],
    },
    StateDescriptor {
        id: NodeState::Polling,
        // Polling -> Polling is a normal cycle boundary, not a transition.
        name: "POLLING",
        successors: &[NodeState::Portal],
    },
    StateDescriptor {
        id: NodeState::Portal,
        name: "PORTAL",
        successors: &[NodeState::Connecting],
    },
];

/// Tracks the current state and enforces the transition table.
#[derive(Debug)]
pub struct Lifecycle {
    current: NodeState,
    transitions: u32,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            current: NodeState::Booting,
            transitions: 0,
        }
    }

    pub fn current(&self) -> NodeState {
        self.current
    }

    /// Number of transitions taken since boot.
    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    /// Whether `next` is a legal successor of the current state.
    pub fn can_advance(&self, next: NodeState) -> bool {
        descriptor(self.current).successors.contains(&next)
    }

    /// Move to `next`, or fail without changing state.
    pub fn advance(&mut self, next: NodeState) -> Result<NodeState> {
        if !self.can_advance(next) {
            return Err(Error::Lifecycle {
                from: self.current,
                to: next,
            });
        }
        let prev = self.current;
        info!(
            "Lifecycle: {} -> {}",
            descriptor(prev).name,
            descriptor(next).name
        );
        self.current = next;
        self.transitions += 1;
        Ok(prev)
    }
}

fn descriptor(state: NodeState) -> &'static StateDescriptor {
    let d = &TABLE[state as usize];
    debug_assert_eq!(d.id, state, "lifecycle table out of order");
    d
}
