use thiserror::Error;

use hydro_common::{ChannelCounts, ClimateReading, SensorFault};

/// Relay write failure. The affected actuator is assumed OFF afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("relay write failed: {0}")]
pub struct HardwareFault(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayId {
    Light(usize),
    Pump(usize),
    ExhaustFan(usize),
    CirculationFan(usize),
    Solenoid,
}

impl RelayId {
    pub fn label(self) -> String {
        match self {
            Self::Light(n) => format!("Light {}", n + 1),
            Self::Pump(n) => format!("Pump {}", n + 1),
            Self::ExhaustFan(n) => format!("Exhaust Fan {}", n + 1),
            Self::CirculationFan(n) => format!("Circulation Fan {}", n + 1),
            Self::Solenoid => "Water Solenoid".to_string(),
        }
    }
}

/// Every relay the wiring provides, used for the shutdown all-off sweep.
pub fn all_relays(counts: &ChannelCounts) -> Vec<RelayId> {
    let mut relays = Vec::new();
    relays.extend((0..counts.lights).map(RelayId::Light));
    relays.extend((0..counts.pumps).map(RelayId::Pump));
    relays.extend((0..counts.exhaust_fans).map(RelayId::ExhaustFan));
    relays.extend((0..counts.circulation_fans).map(RelayId::CirculationFan));
    relays.push(RelayId::Solenoid);
    relays
}

/// The GPIO seam. Implementations must bound each call: a sensor read that
/// hangs would stall the whole control loop.
pub trait Hardware: Send {
    fn read_climate(&mut self, index: usize) -> Result<ClimateReading, SensorFault>;
    /// True means water present at this float switch.
    fn read_float(&mut self, index: usize) -> bool;
    /// True means the overflow sensor is triggered.
    fn read_overflow(&mut self) -> bool;
    fn set_relay(&mut self, relay: RelayId, on: bool) -> Result<(), HardwareFault>;
}

/// Stand-in hardware for hosts without the enclosure wired up: a gentle
/// synthetic climate curve, a full reservoir, and relays that always accept.
pub struct SimulatedHardware {
    tick: u64,
}

impl SimulatedHardware {
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

impl Hardware for SimulatedHardware {
    fn read_climate(&mut self, index: usize) -> Result<ClimateReading, SensorFault> {
        self.tick = self.tick.wrapping_add(1);
        let phase = self.tick.wrapping_add(index as u64);
        Ok(ClimateReading {
            temperature_c: 24.0 + (phase % 8) as f32 * 0.2,
            humidity_pct: 56.0 + (phase % 6) as f32 * 0.5,
        })
    }

    fn read_float(&mut self, _index: usize) -> bool {
        true
    }

    fn read_overflow(&mut self) -> bool {
        false
    }

    fn set_relay(&mut self, _relay: RelayId, _on: bool) -> Result<(), HardwareFault> {
        Ok(())
    }
}
