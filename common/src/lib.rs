pub mod config;
pub mod cycle;
pub mod hysteresis;
pub mod schedule;
pub mod sensor;
pub mod settings;
pub mod types;
pub mod water;

pub use config::{ChannelCounts, ControllerConfig};
pub use cycle::CycleState;
pub use hysteresis::exhaust_should_run;
pub use schedule::is_scheduled_on;
pub use sensor::{aggregate, AggregatedReading, ClimateReading, SensorFault};
pub use settings::{ControlSettings, ExhaustThresholds, SettingWarning};
pub use types::{
    CycleMode, ExhaustMode, LightMode, LiveStatus, TelemetryRecord, WaterError, WaterMode,
};
pub use water::{WaterCommand, WaterDecision, WaterInput, WaterState};
