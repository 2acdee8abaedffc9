use std::time::Duration;

use crate::types::{WaterError, WaterMode};

/// Solenoid-facing state of the reservoir fill system.
///
/// Invariants: `fill_start_ms` is `Some` exactly while the solenoid is on;
/// `error` clears on the off-to-on edge of the solenoid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaterState {
    pub solenoid_on: bool,
    pub fill_start_ms: Option<u64>,
    pub error: Option<WaterError>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterInput {
    pub mode: WaterMode,
    /// True iff every float switch reports water present.
    pub level_ok: bool,
    pub overflow: bool,
    pub max_fill: Duration,
    pub now_ms: u64,
}

/// Side effects the decision requires but must not perform itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterCommand {
    /// Manual fill is a one-shot trigger: write `waterSystemMode = auto`
    /// back to the settings store.
    ResetModeToAuto,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterDecision {
    pub solenoid_on: bool,
    pub commands: Vec<WaterCommand>,
}

impl WaterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates one tick of the fill state machine, in strict priority
    /// order: overflow interlock, fill timeout, continue-filling, auto or
    /// manual fill start, idle.
    pub fn tick(&mut self, input: &WaterInput) -> WaterDecision {
        let mut commands = Vec::new();

        let desired = if input.overflow {
            // Interlock wins from any state, even over an existing fault.
            self.error = Some(WaterError::Overflow);
            false
        } else if self.solenoid_on {
            let started = self.fill_start_ms.unwrap_or(input.now_ms);
            if input.now_ms.saturating_sub(started) > input.max_fill.as_millis() as u64 {
                self.error = Some(if input.level_ok {
                    // Floats say full but the fill never ended: stuck switch.
                    WaterError::Timeout
                } else {
                    WaterError::ReservoirEmpty
                });
                false
            } else {
                // Within the timeout the level is deliberately not re-read;
                // float bounce while water is moving must not chatter the
                // solenoid.
                true
            }
        } else {
            match input.mode {
                WaterMode::Fill => {
                    commands.push(WaterCommand::ResetModeToAuto);
                    true
                }
                WaterMode::Auto => {
                    // A latched reservoir_empty fault blocks auto refill until
                    // a manual fill or restart clears it.
                    !input.level_ok && self.error != Some(WaterError::ReservoirEmpty)
                }
            }
        };

        if desired && !self.solenoid_on {
            self.fill_start_ms = Some(input.now_ms);
            self.error = None;
        } else if !desired && self.solenoid_on {
            self.fill_start_ms = None;
        }
        self.solenoid_on = desired;

        WaterDecision {
            solenoid_on: desired,
            commands,
        }
    }

    /// Called when the relay write for the solenoid failed: the hardware is
    /// assumed off, so the bookkeeping must match.
    pub fn force_off(&mut self) {
        self.solenoid_on = false;
        self.fill_start_ms = None;
    }
}
