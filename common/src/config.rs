use serde::{Deserialize, Serialize};

/// How many of each channel the enclosure wiring provides. Per-channel mode
/// settings (`lightsMode3`, `pumpMode5`, ...) are resolved against these counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCounts {
    pub lights: usize,
    pub pumps: usize,
    pub exhaust_fans: usize,
    pub circulation_fans: usize,
    pub climate_sensors: usize,
    pub float_switches: usize,
}

impl Default for ChannelCounts {
    fn default() -> Self {
        Self {
            lights: 6,
            pumps: 5,
            exhaust_fans: 2,
            circulation_fans: 2,
            climate_sensors: 2,
            float_switches: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub tick_interval_ms: u64,
    pub telemetry_interval_ms: u64,
    pub error_backoff_ms: u64,
    pub sensor_read_timeout_ms: u64,
    pub history_default_rows: usize,
    pub channels: ChannelCounts,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2_000,
            telemetry_interval_ms: 60_000,
            error_backoff_ms: 10_000,
            sensor_read_timeout_ms: 2_000,
            history_default_rows: 20,
            channels: ChannelCounts::default(),
        }
    }
}
