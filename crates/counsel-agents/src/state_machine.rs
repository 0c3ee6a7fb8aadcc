//! Research loop state machine — explicit states and legal transition
//! guards.
//!
//! Provides a typed state model for the research loop so that:
//! 1. Every state transition is auditable and logged.
//! 2. Illegal transitions are caught by `advance()` guards.
//! 3. Offline replay can reconstruct the exact sequence of states.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// The set of research loop states.
///
/// Every run starts at `Planning` and terminates at either `Passed` or
/// `FailedExhausted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Decomposing the question into facet sub-questions.
    Planning,
    /// Fanning the plan out across the retrieval backend.
    Retrieving,
    /// Drafting evidence-grounded sections.
    Analyzing,
    /// Running the deterministic critic gates over the draft.
    Critiquing,
    /// Critic found violations and a refinement budget remains.
    Refining,
    /// Critic passed — terminal state, synthesis follows.
    Passed,
    /// Refinement budget exhausted or retrieval dead — terminal state.
    FailedExhausted,
}

impl LoopState {
    /// Whether this is a terminal state (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::FailedExhausted)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planning => write!(f, "Planning"),
            Self::Retrieving => write!(f, "Retrieving"),
            Self::Analyzing => write!(f, "Analyzing"),
            Self::Critiquing => write!(f, "Critiquing"),
            Self::Refining => write!(f, "Refining"),
            Self::Passed => write!(f, "Passed"),
            Self::FailedExhausted => write!(f, "FailedExhausted"),
        }
    }
}

/// The final status of a run, derived from the terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Passed,
    FailedExhausted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Passed => write!(f, "passed"),
            Self::FailedExhausted => write!(f, "failed_exhausted"),
        }
    }
}

/// Legal transitions between loop states.
///
/// The transition table encodes the valid edges in the state graph:
/// ```text
/// Planning → Retrieving | FailedExhausted
/// Retrieving → Analyzing | FailedExhausted
/// Analyzing → Critiquing | FailedExhausted
/// Critiquing → Passed | Refining | FailedExhausted
/// Refining → Planning | FailedExhausted
/// ```
fn is_legal_transition(from: LoopState, to: LoopState) -> bool {
    use LoopState::*;

    // Any non-terminal state can transition to FailedExhausted.
    if to == FailedExhausted && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Planning, Retrieving)
            | (Retrieving, Analyzing)
            | (Analyzing, Critiquing)
            | (Critiquing, Passed)
            | (Critiquing, Refining)
            // Refinement re-enters planning with the critic's directive
            | (Refining, Planning)
    )
}

/// A single recorded state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// The state transitioned from.
    pub from: LoopState,
    /// The state transitioned to.
    pub to: LoopState,
    /// Iteration number at the time of transition (1-based).
    pub iteration: u32,
    /// Milliseconds since the state machine was created.
    pub elapsed_ms: u64,
    /// Optional context about why this transition happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone)]
pub struct IllegalTransition {
    pub from: LoopState,
    pub to: LoopState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal state transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// The research loop state machine.
///
/// Tracks the current state, enforces legal transitions, and maintains
/// a complete log of all transitions for replay and diagnostics.
pub struct StateMachine {
    current: LoopState,
    iteration: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    /// Create a new state machine starting at `Planning`.
    pub fn new() -> Self {
        Self {
            current: LoopState::Planning,
            iteration: 1,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    /// Get the current state.
    pub fn current(&self) -> LoopState {
        self.current
    }

    /// Get the current iteration number.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Set the iteration counter (called by the research loop).
    pub fn set_iteration(&mut self, iteration: u32) {
        self.iteration = iteration;
    }

    /// Attempt to advance to the next state.
    ///
    /// Returns `Ok(())` if the transition is legal, or
    /// `Err(IllegalTransition)` if it would violate the state graph.
    pub fn advance(&mut self, to: LoopState, reason: Option<&str>) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        let record = TransitionRecord {
            from: self.current,
            to,
            iteration: self.iteration,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        };

        tracing::debug!(
            from = %self.current,
            to = %to,
            iteration = self.iteration,
            "State transition"
        );

        self.transitions.push(record);
        self.current = to;
        Ok(())
    }

    /// Transition to `FailedExhausted` from any non-terminal state.
    pub fn fail(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(LoopState::FailedExhausted, Some(reason))
    }

    /// Whether the state machine is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    /// Get the full transition log.
    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Get a summary string of the state machine's history.
    pub fn summary(&self) -> String {
        let states: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
        format!(
            "{} → {} ({}ms, {} transitions)",
            LoopState::Planning,
            self.current,
            self.created_at.elapsed().as_millis(),
            self.transitions.len(),
        ) + if states.is_empty() {
            String::new()
        } else {
            format!(" [{}]", states.join(" → "))
        }
        .as_str()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
