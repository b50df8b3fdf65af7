//! Scan cycle state machine.
//!
//! # States
//!
//! - `Idle`: between cycles
//! - `Sensing`: discovery request in flight
//! - `Activating`: handshake with the sensed tag
//! - `Classifying`: extracting identifier and metadata
//! - `Reading`: reading the tag's memory
//! - `AwaitingRemoval`: polling until the tag leaves the field
//! - `Stopped`: terminal, after cancellation or a fatal reader error
//!
//! # Valid Transitions
//!
//! - Idle → Sensing → Activating → Classifying → Reading → AwaitingRemoval → Idle
//! - Sensing → Idle (nothing answered)
//! - Activating → Idle (activation failed, cycle skipped)
//! - any state except Stopped → Stopped
//!
//! # Examples
//!
//! ```
//! use tagscan_scanner::{ScanState, ScanStateMachine};
//!
//! let mut machine = ScanStateMachine::new();
//! machine.transition_to(ScanState::Sensing).unwrap();
//! machine.transition_to(ScanState::Idle).unwrap();
//!
//! assert!(machine.transition_to(ScanState::Reading).is_err());
//! assert_eq!(machine.history().len(), 2);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tagscan_core::{Error, Result};

/// Maximum number of state transitions to keep in history.
///
/// A full cycle is six transitions, so this covers the last sixteen cycles.
const MAX_HISTORY_SIZE: usize = 100;

/// Phases of a scan cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// Between cycles.
    Idle,

    /// Offering the configured profiles to the reader.
    Sensing,

    /// Running the activation handshake.
    Activating,

    /// Extracting identifier and family metadata.
    Classifying,

    /// Reading addressable memory.
    Reading,

    /// Waiting for the tag to leave the field.
    AwaitingRemoval,

    /// Run has ended.
    Stopped,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            ScanState::Idle => "Idle",
            ScanState::Sensing => "Sensing",
            ScanState::Activating => "Activating",
            ScanState::Classifying => "Classifying",
            ScanState::Reading => "Reading",
            ScanState::AwaitingRemoval => "AwaitingRemoval",
            ScanState::Stopped => "Stopped",
        };
        write!(f, "{}", state_str)
    }
}

impl ScanState {
    /// Check if transition to `target` is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagscan_scanner::ScanState;
    ///
    /// assert!(ScanState::Idle.can_transition_to(&ScanState::Sensing));
    /// assert!(ScanState::Reading.can_transition_to(&ScanState::Stopped));
    /// assert!(!ScanState::Stopped.can_transition_to(&ScanState::Idle));
    /// ```
    pub fn can_transition_to(&self, target: &ScanState) -> bool {
        matches!(
            (self, target),
            // From Idle
            (ScanState::Idle, ScanState::Sensing)
            // From Sensing
            | (ScanState::Sensing, ScanState::Activating | ScanState::Idle)
            // From Activating
            | (ScanState::Activating, ScanState::Classifying | ScanState::Idle)
            // From Classifying
            | (ScanState::Classifying, ScanState::Reading)
            // From Reading
            | (ScanState::Reading, ScanState::AwaitingRemoval)
            // From AwaitingRemoval
            | (ScanState::AwaitingRemoval, ScanState::Idle)
        ) || (*self != ScanState::Stopped && *target == ScanState::Stopped)
    }

    /// Whether the state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanState::Stopped)
    }
}

/// A single state transition with timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: ScanState,
    pub to: ScanState,

    /// Not serialized; set to the time of deserialization.
    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: ScanState, to: ScanState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }

    /// Time since the transition occurred.
    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// State machine driving one scan run.
///
/// Enforces valid transitions and keeps a bounded history for diagnostics.
/// Not thread-safe; owned by the scan loop's single worker.
#[derive(Debug)]
pub struct ScanStateMachine {
    current_state: ScanState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
}

impl ScanStateMachine {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self {
            current_state: ScanState::Idle,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current_state(&self) -> &ScanState {
        &self.current_state
    }

    /// Time spent in the current state.
    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// The last `count` transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Transition to a new state, validating the transition.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the transition is not
    /// allowed from the current state. The machine is left unchanged.
    pub fn transition_to(&mut self, new_state: ScanState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state, new_state);
        self.current_state = new_state;
        self.state_entered_at = transition.timestamp;

        self.history.push_back(transition.clone());
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }

        Ok(transition)
    }
}

impl Default for ScanStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const CYCLE: [ScanState; 6] = [
        ScanState::Sensing,
        ScanState::Activating,
        ScanState::Classifying,
        ScanState::Reading,
        ScanState::AwaitingRemoval,
        ScanState::Idle,
    ];

    #[test]
    fn test_new_machine_starts_idle() {
        let machine = ScanStateMachine::new();
        assert_eq!(machine.current_state(), &ScanState::Idle);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn test_full_cycle() {
        let mut machine = ScanStateMachine::new();
        for state in CYCLE {
            machine.transition_to(state).unwrap();
        }

        assert_eq!(machine.current_state(), &ScanState::Idle);
        assert_eq!(machine.history().len(), 6);
        assert_eq!(machine.history()[0].from, ScanState::Idle);
        assert_eq!(machine.history()[0].to, ScanState::Sensing);
    }

    #[rstest]
    #[case(ScanState::Idle, ScanState::Sensing, true)]
    #[case(ScanState::Sensing, ScanState::Idle, true)]
    #[case(ScanState::Activating, ScanState::Idle, true)]
    #[case(ScanState::Idle, ScanState::Stopped, true)]
    #[case(ScanState::AwaitingRemoval, ScanState::Stopped, true)]
    #[case(ScanState::Idle, ScanState::Reading, false)]
    #[case(ScanState::Classifying, ScanState::Idle, false)]
    #[case(ScanState::Reading, ScanState::Idle, false)]
    #[case(ScanState::Stopped, ScanState::Idle, false)]
    #[case(ScanState::Stopped, ScanState::Stopped, false)]
    fn test_transition_rules(
        #[case] from: ScanState,
        #[case] to: ScanState,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(&to), allowed);
    }

    #[test]
    fn test_invalid_transition_leaves_state_unchanged() {
        let mut machine = ScanStateMachine::new();
        let result = machine.transition_to(ScanState::Reading);

        assert_eq!(
            result.unwrap_err(),
            Error::InvalidStateTransition {
                from: "Idle".into(),
                to: "Reading".into(),
            }
        );
        assert_eq!(machine.current_state(), &ScanState::Idle);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut machine = ScanStateMachine::new();
        machine.transition_to(ScanState::Stopped).unwrap();

        assert!(machine.current_state().is_terminal());
        assert!(machine.transition_to(ScanState::Sensing).is_err());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut machine = ScanStateMachine::new();
        for _ in 0..40 {
            for state in CYCLE {
                machine.transition_to(state).unwrap();
            }
        }

        assert_eq!(machine.history().len(), MAX_HISTORY_SIZE);
        let last = machine.last_transitions(2);
        assert_eq!(last.len(), 2);
        assert_eq!(last[1].to, ScanState::Idle);
        assert_eq!(last[0].to, ScanState::AwaitingRemoval);
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&ScanState::AwaitingRemoval).unwrap();
        assert_eq!(json, "\"awaiting_removal\"");
    }
}
