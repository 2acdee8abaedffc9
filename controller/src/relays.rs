use std::collections::HashMap;

use tracing::{info, warn};

use crate::hardware::{Hardware, RelayId};

/// Tracks the last commanded state per relay so that repeated identical
/// commands never touch the hardware and every real transition logs exactly
/// one line.
#[derive(Debug, Default)]
pub struct RelayBank {
    known: HashMap<RelayId, bool>,
}

impl RelayBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drives a relay toward `desired` and returns the state the relay is
    /// assumed to be in afterwards. A failed write is logged and the relay
    /// is assumed OFF, the safe default; its physical state stays unknown,
    /// so the next call writes again instead of trusting the cache.
    pub fn apply<H: Hardware>(&mut self, hardware: &mut H, relay: RelayId, desired: bool) -> bool {
        let current = self.known.get(&relay).copied();
        if current == Some(desired) {
            return desired;
        }

        match hardware.set_relay(relay, desired) {
            Ok(()) => {
                info!(
                    "{} turned {}",
                    relay.label(),
                    if desired { "ON" } else { "OFF" }
                );
                self.known.insert(relay, desired);
                desired
            }
            Err(err) => {
                warn!("{}: {err}; assuming OFF", relay.label());
                self.known.remove(&relay);
                false
            }
        }
    }

    /// Shutdown sweep: every relay gets an OFF write, tracked state ignored.
    pub fn all_off<H: Hardware>(&mut self, hardware: &mut H, relays: &[RelayId]) {
        for &relay in relays {
            self.known.remove(&relay);
            self.apply(hardware, relay, false);
        }
    }
}
