use std::time::Duration;

/// Timed on/off duty cycle for a single actuator (pump or circulation fan).
///
/// Phase durations come from settings on every tick, so a live change takes
/// effect on the next elapsed-time comparison without resetting the phase.
/// `last_toggle_ms` moves exactly when `is_on` transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleState {
    pub is_on: bool,
    pub last_toggle_ms: u64,
}

impl CycleState {
    pub fn new(now_ms: u64) -> Self {
        Self {
            is_on: false,
            last_toggle_ms: now_ms,
        }
    }

    /// Advances the cycle and returns the desired output for this tick.
    pub fn tick(&mut self, on_for: Duration, off_for: Duration, now_ms: u64) -> bool {
        let phase_ms = if self.is_on {
            on_for.as_millis() as u64
        } else {
            off_for.as_millis() as u64
        };

        if now_ms.saturating_sub(self.last_toggle_ms) >= phase_ms {
            self.is_on = !self.is_on;
            self.last_toggle_ms = now_ms;
        }

        self.is_on
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ON: Duration = Duration::from_secs(900);
    const OFF: Duration = Duration::from_secs(2700);

    #[test]
    fn holds_until_off_phase_elapses() {
        let mut state = CycleState::new(0);

        assert!(!state.tick(ON, OFF, 2_699_999));
        assert_eq!(state.last_toggle_ms, 0);

        assert!(state.tick(ON, OFF, 2_700_000));
        assert_eq!(state.last_toggle_ms, 2_700_000);
    }

    #[test]
    fn repeated_ticks_with_no_elapsed_time_are_idempotent() {
        let mut state = CycleState::new(1_000);
        let before = state;

        for _ in 0..5 {
            state.tick(ON, OFF, 1_000);
        }

        assert_eq!(state, before);
    }

    #[test]
    fn on_phase_runs_full_duration() {
        let mut state = CycleState {
            is_on: true,
            last_toggle_ms: 10_000,
        };

        assert!(state.tick(ON, OFF, 10_000 + 899_999));
        assert!(!state.tick(ON, OFF, 10_000 + 900_000));
        assert_eq!(state.last_toggle_ms, 10_000 + 900_000);
    }

    #[test]
    fn duration_change_applies_without_phase_reset() {
        let mut state = CycleState::new(0);

        // Not yet due under the long duration.
        assert!(!state.tick(ON, OFF, 1_000_000));

        // Shortened off-duration makes the already-elapsed time sufficient.
        assert!(state.tick(ON, Duration::from_secs(600), 1_000_001));
    }

    #[test]
    fn zero_durations_flip_every_tick() {
        let mut state = CycleState::new(0);
        let zero = Duration::ZERO;

        assert!(state.tick(zero, zero, 1));
        assert!(!state.tick(zero, zero, 2));
        assert!(state.tick(zero, zero, 3));
    }
}
