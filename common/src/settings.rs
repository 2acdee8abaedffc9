use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveTime;
use thiserror::Error;

use crate::config::ChannelCounts;
use crate::types::{CycleMode, ExhaustMode, LightMode, WaterMode};

pub const KEY_LIGHTS_ON_TIME: &str = "lightsOnTime";
pub const KEY_LIGHTS_OFF_TIME: &str = "lightsOffTime";
pub const KEY_PUMP_ON_DURATION: &str = "pumpOnDuration";
pub const KEY_PUMP_OFF_DURATION: &str = "pumpOffDuration";
pub const KEY_CIRCULATION_ON_DURATION: &str = "circulationFanOnDuration";
pub const KEY_CIRCULATION_OFF_DURATION: &str = "circulationFanOffDuration";
pub const KEY_EXHAUST_TEMP_HIGH: &str = "exhaustFanTempHigh";
pub const KEY_EXHAUST_TEMP_LOW: &str = "exhaustFanTempLow";
pub const KEY_EXHAUST_HUMID_HIGH: &str = "exhaustFanHumidHigh";
pub const KEY_EXHAUST_HUMID_LOW: &str = "exhaustFanHumidLow";
pub const KEY_WATER_SYSTEM_MODE: &str = "waterSystemMode";
pub const KEY_MAX_FILL_TIME: &str = "maxFillTime";

pub fn light_mode_key(index: usize) -> String {
    format!("lightsMode{}", index + 1)
}

pub fn pump_mode_key(index: usize) -> String {
    format!("pumpMode{}", index + 1)
}

pub fn exhaust_fan_mode_key(index: usize) -> String {
    format!("exhaustFanMode{}", index + 1)
}

pub fn circulation_fan_mode_key(index: usize) -> String {
    format!("circulationFanMode{}", index + 1)
}

/// A setting that was present but unparsable. The control loop logs these
/// and carries on with the default; a bad value must never stop the loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value {value:?} for setting {key}; using default")]
pub struct SettingWarning {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExhaustThresholds {
    pub temp_high: f32,
    pub temp_low: f32,
    pub hum_high: f32,
    pub hum_low: f32,
}

impl Default for ExhaustThresholds {
    fn default() -> Self {
        Self {
            temp_high: 27.0,
            temp_low: 23.0,
            hum_high: 65.0,
            hum_low: 55.0,
        }
    }
}

/// Fully typed snapshot of the settings store, rebuilt once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSettings {
    pub lights_on_time: NaiveTime,
    pub lights_off_time: NaiveTime,
    pub lights_mode: Vec<LightMode>,
    pub pump_on: Duration,
    pub pump_off: Duration,
    pub pump_mode: Vec<CycleMode>,
    pub circulation_on: Duration,
    pub circulation_off: Duration,
    pub circulation_mode: Vec<CycleMode>,
    pub exhaust: ExhaustThresholds,
    pub exhaust_mode: Vec<ExhaustMode>,
    pub water_mode: WaterMode,
    pub max_fill: Duration,
}

const DEFAULT_LIGHTS_ON: &str = "06:00";
const DEFAULT_LIGHTS_OFF: &str = "22:00";
const DEFAULT_PUMP_ON_SECS: u64 = 900;
const DEFAULT_PUMP_OFF_SECS: u64 = 2_700;
const DEFAULT_CIRCULATION_ON_SECS: u64 = 1_800;
const DEFAULT_CIRCULATION_OFF_SECS: u64 = 1_800;
const DEFAULT_MAX_FILL_SECS: u64 = 600;

impl ControlSettings {
    /// Parses the raw key/value store into a typed snapshot. Absent keys take
    /// their documented defaults silently; present-but-malformed values take
    /// the default and are reported as warnings.
    pub fn from_map(
        map: &BTreeMap<String, String>,
        counts: &ChannelCounts,
    ) -> (Self, Vec<SettingWarning>) {
        let mut warnings = Vec::new();

        let lights_on_time = parse_field(
            map,
            KEY_LIGHTS_ON_TIME,
            parse_time(DEFAULT_LIGHTS_ON).unwrap(),
            parse_time,
            &mut warnings,
        );
        let lights_off_time = parse_field(
            map,
            KEY_LIGHTS_OFF_TIME,
            parse_time(DEFAULT_LIGHTS_OFF).unwrap(),
            parse_time,
            &mut warnings,
        );

        let lights_mode = (0..counts.lights)
            .map(|i| {
                parse_field(
                    map,
                    &light_mode_key(i),
                    LightMode::Schedule,
                    LightMode::parse,
                    &mut warnings,
                )
            })
            .collect();

        let pump_on = parse_field(
            map,
            KEY_PUMP_ON_DURATION,
            Duration::from_secs(DEFAULT_PUMP_ON_SECS),
            parse_duration_secs,
            &mut warnings,
        );
        let pump_off = parse_field(
            map,
            KEY_PUMP_OFF_DURATION,
            Duration::from_secs(DEFAULT_PUMP_OFF_SECS),
            parse_duration_secs,
            &mut warnings,
        );
        let pump_mode = (0..counts.pumps)
            .map(|i| {
                parse_field(
                    map,
                    &pump_mode_key(i),
                    CycleMode::Cycle,
                    CycleMode::parse,
                    &mut warnings,
                )
            })
            .collect();

        let circulation_on = parse_field(
            map,
            KEY_CIRCULATION_ON_DURATION,
            Duration::from_secs(DEFAULT_CIRCULATION_ON_SECS),
            parse_duration_secs,
            &mut warnings,
        );
        let circulation_off = parse_field(
            map,
            KEY_CIRCULATION_OFF_DURATION,
            Duration::from_secs(DEFAULT_CIRCULATION_OFF_SECS),
            parse_duration_secs,
            &mut warnings,
        );
        let circulation_mode = (0..counts.circulation_fans)
            .map(|i| {
                parse_field(
                    map,
                    &circulation_fan_mode_key(i),
                    CycleMode::Cycle,
                    CycleMode::parse,
                    &mut warnings,
                )
            })
            .collect();

        let defaults = ExhaustThresholds::default();
        let exhaust = ExhaustThresholds {
            temp_high: parse_field(
                map,
                KEY_EXHAUST_TEMP_HIGH,
                defaults.temp_high,
                parse_finite,
                &mut warnings,
            ),
            temp_low: parse_field(
                map,
                KEY_EXHAUST_TEMP_LOW,
                defaults.temp_low,
                parse_finite,
                &mut warnings,
            ),
            hum_high: parse_field(
                map,
                KEY_EXHAUST_HUMID_HIGH,
                defaults.hum_high,
                parse_finite,
                &mut warnings,
            ),
            hum_low: parse_field(
                map,
                KEY_EXHAUST_HUMID_LOW,
                defaults.hum_low,
                parse_finite,
                &mut warnings,
            ),
        };
        let exhaust_mode = (0..counts.exhaust_fans)
            .map(|i| {
                parse_field(
                    map,
                    &exhaust_fan_mode_key(i),
                    ExhaustMode::Auto,
                    ExhaustMode::parse,
                    &mut warnings,
                )
            })
            .collect();

        let water_mode = parse_field(
            map,
            KEY_WATER_SYSTEM_MODE,
            WaterMode::Auto,
            WaterMode::parse,
            &mut warnings,
        );
        let max_fill = parse_field(
            map,
            KEY_MAX_FILL_TIME,
            Duration::from_secs(DEFAULT_MAX_FILL_SECS),
            parse_duration_secs,
            &mut warnings,
        );

        let settings = Self {
            lights_on_time,
            lights_off_time,
            lights_mode,
            pump_on,
            pump_off,
            pump_mode,
            circulation_on,
            circulation_off,
            circulation_mode,
            exhaust,
            exhaust_mode,
            water_mode,
            max_fill,
        };

        (settings, warnings)
    }

    pub fn default_for(counts: &ChannelCounts) -> Self {
        Self::from_map(&BTreeMap::new(), counts).0
    }

    /// The full set of recognized keys with their default string values,
    /// used to seed a fresh settings store.
    pub fn default_map(counts: &ChannelCounts) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(KEY_LIGHTS_ON_TIME.to_string(), DEFAULT_LIGHTS_ON.to_string());
        map.insert(
            KEY_LIGHTS_OFF_TIME.to_string(),
            DEFAULT_LIGHTS_OFF.to_string(),
        );
        map.insert(
            KEY_PUMP_ON_DURATION.to_string(),
            DEFAULT_PUMP_ON_SECS.to_string(),
        );
        map.insert(
            KEY_PUMP_OFF_DURATION.to_string(),
            DEFAULT_PUMP_OFF_SECS.to_string(),
        );
        map.insert(
            KEY_CIRCULATION_ON_DURATION.to_string(),
            DEFAULT_CIRCULATION_ON_SECS.to_string(),
        );
        map.insert(
            KEY_CIRCULATION_OFF_DURATION.to_string(),
            DEFAULT_CIRCULATION_OFF_SECS.to_string(),
        );
        map.insert(KEY_EXHAUST_TEMP_HIGH.to_string(), "27.0".to_string());
        map.insert(KEY_EXHAUST_TEMP_LOW.to_string(), "23.0".to_string());
        map.insert(KEY_EXHAUST_HUMID_HIGH.to_string(), "65.0".to_string());
        map.insert(KEY_EXHAUST_HUMID_LOW.to_string(), "55.0".to_string());
        map.insert(
            KEY_WATER_SYSTEM_MODE.to_string(),
            WaterMode::Auto.as_str().to_string(),
        );
        map.insert(
            KEY_MAX_FILL_TIME.to_string(),
            DEFAULT_MAX_FILL_SECS.to_string(),
        );

        for i in 0..counts.lights {
            map.insert(light_mode_key(i), LightMode::Schedule.as_str().to_string());
        }
        for i in 0..counts.pumps {
            map.insert(pump_mode_key(i), CycleMode::Cycle.as_str().to_string());
        }
        for i in 0..counts.exhaust_fans {
            map.insert(
                exhaust_fan_mode_key(i),
                ExhaustMode::Auto.as_str().to_string(),
            );
        }
        for i in 0..counts.circulation_fans {
            map.insert(
                circulation_fan_mode_key(i),
                CycleMode::Cycle.as_str().to_string(),
            );
        }

        map
    }
}

fn parse_field<T>(
    map: &BTreeMap<String, String>,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
    warnings: &mut Vec<SettingWarning>,
) -> T {
    match map.get(key) {
        None => default,
        Some(raw) => match parse(raw.trim()) {
            Some(value) => value,
            None => {
                warnings.push(SettingWarning {
                    key: key.to_string(),
                    value: raw.clone(),
                });
                default
            }
        },
    }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M").ok()
}

fn parse_duration_secs(raw: &str) -> Option<Duration> {
    // try_from rejects negative, non-finite, and Duration-overflowing values.
    let secs = raw.parse::<f64>().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

fn parse_finite(raw: &str) -> Option<f32> {
    raw.parse::<f32>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn counts() -> ChannelCounts {
        ChannelCounts::default()
    }

    #[test]
    fn empty_map_yields_defaults_without_warnings() {
        let (settings, warnings) = ControlSettings::from_map(&BTreeMap::new(), &counts());

        assert!(warnings.is_empty());
        assert_eq!(settings.lights_on_time, parse_time("06:00").unwrap());
        assert_eq!(settings.lights_off_time, parse_time("22:00").unwrap());
        assert_eq!(settings.pump_on, Duration::from_secs(900));
        assert_eq!(settings.pump_off, Duration::from_secs(2_700));
        assert_eq!(settings.lights_mode.len(), 6);
        assert_eq!(settings.pump_mode.len(), 5);
        assert_eq!(settings.exhaust_mode, vec![ExhaustMode::Auto; 2]);
        assert_eq!(settings.water_mode, WaterMode::Auto);
        assert_eq!(settings.max_fill, Duration::from_secs(600));
    }

    #[test]
    fn valid_overrides_are_applied() {
        let mut map = BTreeMap::new();
        map.insert(KEY_LIGHTS_ON_TIME.to_string(), "20:00".to_string());
        map.insert(KEY_LIGHTS_OFF_TIME.to_string(), "08:00".to_string());
        map.insert(KEY_PUMP_ON_DURATION.to_string(), "120".to_string());
        map.insert(pump_mode_key(2), "on".to_string());
        map.insert(KEY_WATER_SYSTEM_MODE.to_string(), "fill".to_string());
        map.insert(KEY_EXHAUST_TEMP_HIGH.to_string(), "29.5".to_string());

        let (settings, warnings) = ControlSettings::from_map(&map, &counts());

        assert!(warnings.is_empty());
        assert_eq!(settings.lights_on_time, parse_time("20:00").unwrap());
        assert_eq!(settings.pump_on, Duration::from_secs(120));
        assert_eq!(settings.pump_mode[2], CycleMode::On);
        assert_eq!(settings.pump_mode[0], CycleMode::Cycle);
        assert_eq!(settings.water_mode, WaterMode::Fill);
        assert_eq!(settings.exhaust.temp_high, 29.5);
    }

    #[test]
    fn malformed_values_fall_back_with_warnings() {
        let mut map = BTreeMap::new();
        map.insert(KEY_LIGHTS_ON_TIME.to_string(), "sunrise".to_string());
        map.insert(KEY_PUMP_ON_DURATION.to_string(), "-5".to_string());
        map.insert(KEY_MAX_FILL_TIME.to_string(), "NaN".to_string());
        map.insert(light_mode_key(0), "disco".to_string());

        let (settings, warnings) = ControlSettings::from_map(&map, &counts());

        assert_eq!(settings.lights_on_time, parse_time("06:00").unwrap());
        assert_eq!(settings.pump_on, Duration::from_secs(900));
        assert_eq!(settings.max_fill, Duration::from_secs(600));
        assert_eq!(settings.lights_mode[0], LightMode::Schedule);

        let mut warned: Vec<&str> = warnings.iter().map(|w| w.key.as_str()).collect();
        warned.sort_unstable();
        assert_eq!(
            warned,
            vec![
                "lightsMode1",
                KEY_LIGHTS_ON_TIME,
                KEY_MAX_FILL_TIME,
                KEY_PUMP_ON_DURATION,
            ]
        );
    }

    #[test]
    fn overlarge_duration_falls_back_with_warning() {
        let mut map = BTreeMap::new();
        map.insert(KEY_PUMP_ON_DURATION.to_string(), "1e20".to_string());
        map.insert(KEY_MAX_FILL_TIME.to_string(), "inf".to_string());

        let (settings, warnings) = ControlSettings::from_map(&map, &counts());

        assert_eq!(settings.pump_on, Duration::from_secs(900));
        assert_eq!(settings.max_fill, Duration::from_secs(600));
        let mut warned: Vec<&str> = warnings.iter().map(|w| w.key.as_str()).collect();
        warned.sort_unstable();
        assert_eq!(warned, vec![KEY_MAX_FILL_TIME, KEY_PUMP_ON_DURATION]);
    }

    #[test]
    fn default_map_round_trips_cleanly() {
        let defaults = ControlSettings::default_map(&counts());

        let (settings, warnings) = ControlSettings::from_map(&defaults, &counts());

        assert!(warnings.is_empty());
        assert_eq!(settings, ControlSettings::default_for(&counts()));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut map = BTreeMap::new();
        map.insert("legacyDimmerLevel".to_string(), "11".to_string());

        let (_, warnings) = ControlSettings::from_map(&map, &counts());

        assert!(warnings.is_empty());
    }
}
