use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightMode {
    Schedule,
    On,
    Off,
}

impl LightMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::On => "on",
            Self::Off => "off",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "schedule" => Some(Self::Schedule),
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }
}

/// Mode for duty-cycled channels (pumps, circulation fans).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMode {
    Cycle,
    On,
    Off,
}

impl CycleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cycle => "cycle",
            Self::On => "on",
            Self::Off => "off",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "cycle" => Some(Self::Cycle),
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustMode {
    Auto,
    On,
    Off,
}

impl ExhaustMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::On => "on",
            Self::Off => "off",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "auto" => Some(Self::Auto),
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }
}

/// `Fill` is a one-shot manual trigger; the water engine emits a command to
/// reset the stored mode back to `auto` as soon as the fill starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterMode {
    Auto,
    Fill,
}

impl WaterMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Fill => "fill",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "auto" => Some(Self::Auto),
            "fill" => Some(Self::Fill),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterError {
    Overflow,
    ReservoirEmpty,
    Timeout,
}

impl WaterError {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overflow => "overflow",
            Self::ReservoirEmpty => "reservoir_empty",
            Self::Timeout => "timeout",
        }
    }
}

/// One persisted telemetry row. The same shape is appended to history and
/// upserted as the singleton "latest" record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Unix epoch seconds at write time.
    pub timestamp: i64,
    pub temperature: f32,
    pub humidity: f32,
    #[serde(rename = "waterLevelOk")]
    pub water_level_ok: bool,
    pub floaters: Vec<bool>,
}

/// Snapshot of live actuator state published by the control loop after every
/// tick. Read-only for everyone but the loop itself.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    pub lights_on: Vec<bool>,
    pub pumps_on: Vec<bool>,
    pub exhaust_fans_on: Vec<bool>,
    pub circulation_fans_on: Vec<bool>,
    pub solenoid_on: bool,
    pub water_level_ok: bool,
    pub overflow: bool,
    pub water_error: Option<WaterError>,
}
