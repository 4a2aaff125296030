//! One-shot activation gate.
//!
//! The gate flips from `Inactive` to `Active` exactly once. Activation
//! setup runs only for the caller that wins the flip; every later caller
//! observes "already active" and does nothing. If setup fails after the
//! flip, the gate moves to `Incomplete`, which still counts as active so a
//! retry remains a no-op.

use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

const INACTIVE: u8 = 0;
const ACTIVE: u8 = 1;
const INCOMPLETE: u8 = 2;

static GLOBAL_GATE: ActivationGate = ActivationGate::new();

/// Observable state of an [`ActivationGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    /// No activation has been attempted
    Inactive,
    /// Activation was claimed and setup has not failed
    Active,
    /// Activation was claimed but setup failed part-way
    Incomplete,
}

/// Options recorded by the activation that won the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationSummary {
    /// Domains the first activation was scoped to
    pub domains: Vec<String>,
    /// Emission mode of the first activation
    pub development_mode: bool,
}

/// Process-wide guard against duplicate measurement start.
#[derive(Debug)]
pub struct ActivationGate {
    state: AtomicU8,
    first: OnceLock<ActivationSummary>,
}

impl ActivationGate {
    /// Create a gate in the `Inactive` state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(INACTIVE),
            first: OnceLock::new(),
        }
    }

    /// The gate shared by the whole process.
    #[must_use]
    pub fn global() -> &'static ActivationGate {
        &GLOBAL_GATE
    }

    /// Claim the activation. Returns `true` for exactly one caller.
    pub fn try_activate(&self, summary: ActivationSummary) -> bool {
        let won = self
            .state
            .compare_exchange(INACTIVE, ACTIVE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            let _ = self.first.set(summary);
        }
        won
    }

    /// Record that setup failed after the gate was claimed.
    pub fn mark_incomplete(&self) {
        let _ = self
            .state
            .compare_exchange(ACTIVE, INCOMPLETE, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Current state of the gate.
    #[must_use]
    pub fn state(&self) -> ActivationState {
        match self.state.load(Ordering::Acquire) {
            INACTIVE => ActivationState::Inactive,
            ACTIVE => ActivationState::Active,
            _ => ActivationState::Incomplete,
        }
    }

    /// Whether an activation has already been claimed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() != ActivationState::Inactive
    }

    /// Options of the activation that claimed the gate.
    #[must_use]
    pub fn first_activation(&self) -> Option<&ActivationSummary> {
        self.first.get()
    }
}

impl Default for ActivationGate {
    fn default() -> Self {
        Self::new()
    }
}
