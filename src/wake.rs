use std::time::{Duration, Instant};

use crate::transcript::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeState {
    Dormant,
    Active { since: Instant },
}

/// What the gate decided for one final transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Transcript was the wake word; do not treat it as a command
    Woke,
    /// Dormant and not the wake word
    Ignored,
    /// Evaluate the transcript as a command
    Evaluate,
}

/// Wake word state machine: DORMANT until the wake word is heard, then
/// ACTIVE for at most `timeout` or until one command has been dispatched.
/// A disabled gate passes every transcript straight through.
#[derive(Debug, Clone)]
pub struct WakeGate {
    enabled: bool,
    wake_word: String,
    timeout: Duration,
    state: WakeState,
}

impl WakeGate {
    pub fn new(enabled: bool, wake_word: &str, timeout: Duration) -> Self {
        Self {
            enabled,
            wake_word: normalize(wake_word),
            timeout,
            state: WakeState::Dormant,
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, "", Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> WakeState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, WakeState::Active { .. })
    }

    pub fn wake_word(&self) -> &str {
        &self.wake_word
    }

    /// Returns true when an ACTIVE session has outlived the timeout; the gate
    /// is then DORMANT again.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        match self.state {
            WakeState::Active { since }
                if self.enabled && now.saturating_duration_since(since) > self.timeout =>
            {
                self.state = WakeState::Dormant;
                true
            }
            _ => false,
        }
    }

    /// Feed one final, normalized transcript.
    ///
    /// The wake word check runs on the raw transcript regardless of its
    /// length; only exact equality wakes the gate.
    pub fn observe(&mut self, transcript: &str, now: Instant) -> GateDecision {
        if !self.enabled {
            return GateDecision::Evaluate;
        }
        match self.state {
            WakeState::Dormant => {
                if normalize(transcript) == self.wake_word {
                    self.state = WakeState::Active { since: now };
                    GateDecision::Woke
                } else {
                    GateDecision::Ignored
                }
            }
            WakeState::Active { .. } => GateDecision::Evaluate,
        }
    }

    /// One command per wake
    pub fn command_dispatched(&mut self) {
        if self.enabled {
            self.state = WakeState::Dormant;
        }
    }
}
