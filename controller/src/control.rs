use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{Local, NaiveTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use hydro_common::settings::KEY_WATER_SYSTEM_MODE;
use hydro_common::{
    aggregate, exhaust_should_run, is_scheduled_on, ControlSettings, ControllerConfig, CycleMode,
    CycleState, ExhaustMode, LightMode, LiveStatus, TelemetryRecord, WaterCommand, WaterInput,
    WaterState,
};

use crate::hardware::{all_relays, Hardware, RelayId};
use crate::relays::RelayBank;
use crate::store::{SettingsStore, TelemetryStore};

/// The per-tick decision engine. Sole writer of all actuator state; the
/// dashboard only ever sees the `LiveStatus` snapshots published after each
/// tick.
pub struct ControlLoop<H: Hardware> {
    config: ControllerConfig,
    settings: SettingsStore,
    telemetry: TelemetryStore,
    hardware: H,
    relays: RelayBank,

    pump_states: Vec<CycleState>,
    circulation_states: Vec<CycleState>,
    exhaust_on: Vec<bool>,
    water: WaterState,
    last_log_ms: Option<u64>,

    status_tx: watch::Sender<LiveStatus>,
}

impl<H: Hardware> ControlLoop<H> {
    pub fn new(
        config: ControllerConfig,
        settings: SettingsStore,
        telemetry: TelemetryStore,
        hardware: H,
        status_tx: watch::Sender<LiveStatus>,
    ) -> Self {
        let now_ms = monotonic_ms();
        let counts = config.channels;

        Self {
            settings,
            telemetry,
            hardware,
            relays: RelayBank::new(),
            pump_states: vec![CycleState::new(now_ms); counts.pumps],
            circulation_states: vec![CycleState::new(now_ms); counts.circulation_fans],
            exhaust_on: vec![false; counts.exhaust_fans],
            water: WaterState::new(),
            last_log_ms: None,
            status_tx,
            config,
        }
    }

    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) {
        info!("hardware control loop starting");
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = cancel.changed() => {}
            }
            if *cancel.borrow() {
                break;
            }

            let now_ms = monotonic_ms();
            let now_time = Local::now().time();
            if let Err(err) = self.run_tick(now_ms, now_time).await {
                // A transient fault (store contention, sensor bus glitch)
                // gets a bounded backoff, never a dead process.
                error!("control tick failed: {err:#}");
                tokio::time::sleep(Duration::from_millis(self.config.error_backoff_ms)).await;
            }
        }

        info!("control loop stopping; driving all relays off");
        let relays = all_relays(&self.config.channels);
        self.relays.all_off(&mut self.hardware, &relays);
    }

    /// One full pass: settings, lights, pumps, circulation, climate and
    /// exhaust, water safety, telemetry, status snapshot. Time is injected
    /// so tests run without real delays.
    pub async fn run_tick(&mut self, now_ms: u64, now_time: NaiveTime) -> anyhow::Result<()> {
        let raw = self
            .settings
            .load_all()
            .await
            .context("load settings store")?;
        let (settings, warnings) = ControlSettings::from_map(&raw, &self.config.channels);
        for warning in &warnings {
            warn!("{warning}");
        }

        let mut status = LiveStatus::default();

        // Lights: shared schedule window, per-channel manual override.
        let schedule_on = is_scheduled_on(now_time, settings.lights_on_time, settings.lights_off_time);
        for (i, mode) in settings.lights_mode.iter().enumerate() {
            let desired = match mode {
                LightMode::Schedule => schedule_on,
                LightMode::On => true,
                LightMode::Off => false,
            };
            let actual = self.relays.apply(&mut self.hardware, RelayId::Light(i), desired);
            status.lights_on.push(actual);
        }

        // Pumps: duty cycle unless manually overridden. Manual modes leave
        // the cycle phase untouched so switching back resumes where it was.
        for (i, mode) in settings.pump_mode.iter().enumerate() {
            let desired = match mode {
                CycleMode::Cycle => {
                    self.pump_states[i].tick(settings.pump_on, settings.pump_off, now_ms)
                }
                CycleMode::On => true,
                CycleMode::Off => false,
            };
            let actual = self.relays.apply(&mut self.hardware, RelayId::Pump(i), desired);
            status.pumps_on.push(actual);
        }

        for (i, mode) in settings.circulation_mode.iter().enumerate() {
            let desired = match mode {
                CycleMode::Cycle => self.circulation_states[i].tick(
                    settings.circulation_on,
                    settings.circulation_off,
                    now_ms,
                ),
                CycleMode::On => true,
                CycleMode::Off => false,
            };
            let actual = self
                .relays
                .apply(&mut self.hardware, RelayId::CirculationFan(i), desired);
            status.circulation_fans_on.push(actual);
        }

        // Climate: each sensor fails independently; survivors are averaged.
        let mut readings = Vec::with_capacity(self.config.channels.climate_sensors);
        for i in 0..self.config.channels.climate_sensors {
            let result = self.hardware.read_climate(i);
            if let Err(err) = &result {
                warn!("climate sensor {}: {err}", i + 1);
            }
            readings.push(result);
        }
        let aggregated = aggregate(&readings);

        // Exhaust fans: hysteresis on the averaged reading. With no data this
        // tick the fans hold their last state untouched.
        if let (Some(temperature), Some(humidity)) =
            (aggregated.temperature_c, aggregated.humidity_pct)
        {
            let group_prev = self.exhaust_on.iter().any(|&on| on);
            let auto_on = exhaust_should_run(group_prev, temperature, humidity, &settings.exhaust);

            for (i, mode) in settings.exhaust_mode.iter().enumerate() {
                let desired = match mode {
                    ExhaustMode::Auto => auto_on,
                    ExhaustMode::On => true,
                    ExhaustMode::Off => false,
                };
                let actual =
                    self.relays
                        .apply(&mut self.hardware, RelayId::ExhaustFan(i), desired);
                self.exhaust_on[i] = actual;
            }
        } else {
            warn!("no valid climate readings this tick");
        }
        status.exhaust_fans_on = self.exhaust_on.clone();

        // Water safety: floats and the overflow interlock are read fresh
        // every tick, never cached.
        let floats: Vec<bool> = (0..self.config.channels.float_switches)
            .map(|i| self.hardware.read_float(i))
            .collect();
        let level_ok = floats.iter().all(|&present| present);
        let overflow = self.hardware.read_overflow();
        if overflow {
            warn!("OVERFLOW DETECTED; forcing solenoid off");
        }

        let previous_error = self.water.error;
        let decision = self.water.tick(&WaterInput {
            mode: settings.water_mode,
            level_ok,
            overflow,
            max_fill: settings.max_fill,
            now_ms,
        });
        if self.water.error != previous_error {
            if let Some(error) = self.water.error {
                warn!("water system fault: {}", error.as_str());
            }
        }

        let solenoid_actual =
            self.relays
                .apply(&mut self.hardware, RelayId::Solenoid, decision.solenoid_on);
        if decision.solenoid_on && !solenoid_actual {
            self.water.force_off();
        }

        for command in &decision.commands {
            match command {
                WaterCommand::ResetModeToAuto => {
                    info!("manual fill started; resetting {KEY_WATER_SYSTEM_MODE} to auto");
                    if let Err(err) = self.settings.set(KEY_WATER_SYSTEM_MODE, "auto").await {
                        warn!("failed to reset {KEY_WATER_SYSTEM_MODE}: {err:#}");
                    }
                }
            }
        }

        // Telemetry, throttled. A failed write leaves the throttle clock
        // alone so the next tick retries.
        let due = self
            .last_log_ms
            .map(|last| now_ms.saturating_sub(last) >= self.config.telemetry_interval_ms)
            .unwrap_or(true);
        if due {
            if let (Some(temperature), Some(humidity)) =
                (aggregated.temperature_c, aggregated.humidity_pct)
            {
                let record = TelemetryRecord {
                    timestamp: Utc::now().timestamp(),
                    temperature,
                    humidity,
                    water_level_ok: level_ok,
                    floaters: floats.clone(),
                };
                match self.telemetry.append(&record).await {
                    Ok(()) => {
                        self.last_log_ms = Some(now_ms);
                        debug!("telemetry row persisted");
                    }
                    Err(err) => warn!("telemetry write failed: {err:#}"),
                }
            } else {
                debug!("skipping telemetry, no sensor data");
            }
        }

        status.solenoid_on = solenoid_actual;
        status.water_level_ok = level_ok;
        status.overflow = overflow;
        status.water_error = self.water.error;
        let _ = self.status_tx.send(status);

        Ok(())
    }
}

pub fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use hydro_common::{ClimateReading, SensorFault, WaterError};

    use crate::hardware::HardwareFault;

    /// Scriptable hardware double for full-tick tests.
    struct TestHardware {
        temperature_c: f32,
        humidity_pct: f32,
        climate_fails: bool,
        floats: Vec<bool>,
        overflow: bool,
        writes: Vec<(RelayId, bool)>,
    }

    impl TestHardware {
        fn new() -> Self {
            Self {
                temperature_c: 25.0,
                humidity_pct: 60.0,
                climate_fails: false,
                floats: vec![true, true, true],
                overflow: false,
                writes: Vec::new(),
            }
        }
    }

    impl Hardware for TestHardware {
        fn read_climate(&mut self, _index: usize) -> Result<ClimateReading, SensorFault> {
            if self.climate_fails {
                Err(SensorFault::NoData)
            } else {
                Ok(ClimateReading {
                    temperature_c: self.temperature_c,
                    humidity_pct: self.humidity_pct,
                })
            }
        }

        fn read_float(&mut self, index: usize) -> bool {
            self.floats[index]
        }

        fn read_overflow(&mut self) -> bool {
            self.overflow
        }

        fn set_relay(&mut self, relay: RelayId, on: bool) -> Result<(), HardwareFault> {
            self.writes.push((relay, on));
            Ok(())
        }
    }

    struct Fixture {
        control: ControlLoop<TestHardware>,
        status_rx: watch::Receiver<LiveStatus>,
        data_dir: PathBuf,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.data_dir);
        }
    }

    async fn fixture(tag: &str) -> Fixture {
        let data_dir = std::env::temp_dir().join(format!(
            "hydro-control-test-{}-{tag}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&data_dir);

        let config = ControllerConfig::default();
        let settings = SettingsStore::new(&data_dir);
        settings
            .seed_defaults(&ControlSettings::default_map(&config.channels))
            .await
            .unwrap();
        let telemetry = TelemetryStore::new(&data_dir);
        let (status_tx, status_rx) = watch::channel(LiveStatus::default());

        let control = ControlLoop::new(config, settings, telemetry, TestHardware::new(), status_tx);
        Fixture {
            control,
            status_rx,
            data_dir,
        }
    }

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn default_tick_at_noon_lights_on_pumps_off() {
        let mut fx = fixture("noon").await;

        fx.control.run_tick(1_000, noon()).await.unwrap();

        let status = fx.status_rx.borrow().clone();
        assert_eq!(status.lights_on, vec![true; 6]);
        assert_eq!(status.pumps_on, vec![false; 5]);
        assert_eq!(status.circulation_fans_on, vec![false; 2]);
        // Test climate values sit in the dead-band; fans start off and hold.
        assert_eq!(status.exhaust_fans_on, vec![false; 2]);
        assert!(!status.solenoid_on);
        assert!(status.water_level_ok);
        assert_eq!(status.water_error, None);
    }

    #[tokio::test]
    async fn lights_off_outside_schedule() {
        let mut fx = fixture("night").await;

        fx.control
            .run_tick(1_000, NaiveTime::from_hms_opt(23, 0, 0).unwrap())
            .await
            .unwrap();

        assert_eq!(fx.status_rx.borrow().lights_on, vec![false; 6]);
    }

    #[tokio::test]
    async fn pump_cycle_turns_on_after_off_duration() {
        let mut fx = fixture("cycle").await;

        // Engine states were created at process start; pin them to zero so
        // the injected tick times line up.
        for state in &mut fx.control.pump_states {
            *state = CycleState::new(0);
        }

        fx.control.run_tick(2_699_000, noon()).await.unwrap();
        assert_eq!(fx.status_rx.borrow().pumps_on, vec![false; 5]);

        fx.control.run_tick(2_700_000, noon()).await.unwrap();
        assert_eq!(fx.status_rx.borrow().pumps_on, vec![true; 5]);
    }

    #[tokio::test]
    async fn low_float_starts_fill_and_overflow_stops_it() {
        let mut fx = fixture("water").await;

        fx.control.hardware.floats = vec![true, false, true];
        fx.control.run_tick(1_000, noon()).await.unwrap();
        {
            let status = fx.status_rx.borrow();
            assert!(status.solenoid_on);
            assert!(!status.water_level_ok);
        }

        fx.control.hardware.overflow = true;
        fx.control.run_tick(3_000, noon()).await.unwrap();
        {
            let status = fx.status_rx.borrow();
            assert!(!status.solenoid_on);
            assert!(status.overflow);
            assert_eq!(status.water_error, Some(WaterError::Overflow));
        }
    }

    #[tokio::test]
    async fn manual_fill_resets_mode_in_store() {
        let mut fx = fixture("fill").await;

        fx.control
            .settings
            .set(KEY_WATER_SYSTEM_MODE, "fill")
            .await
            .unwrap();
        fx.control.run_tick(1_000, noon()).await.unwrap();

        assert!(fx.status_rx.borrow().solenoid_on);
        let map = fx.control.settings.load_all().await.unwrap();
        assert_eq!(
            map.get(KEY_WATER_SYSTEM_MODE).map(String::as_str),
            Some("auto")
        );
    }

    #[tokio::test]
    async fn all_sensors_failing_skips_telemetry_and_holds_fans() {
        let mut fx = fixture("nodata").await;

        // Push the fans on with hot air first.
        fx.control.hardware.temperature_c = 30.0;
        fx.control.run_tick(1_000, noon()).await.unwrap();
        assert_eq!(fx.status_rx.borrow().exhaust_fans_on, vec![true; 2]);

        fx.control.hardware.climate_fails = true;
        fx.control.run_tick(61_000, noon()).await.unwrap();

        // Fans hold, and the 60s-due telemetry write was skipped.
        assert_eq!(fx.status_rx.borrow().exhaust_fans_on, vec![true; 2]);
        let recent = fx.control.telemetry.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn telemetry_respects_throttle() {
        let mut fx = fixture("throttle").await;

        fx.control.run_tick(1_000, noon()).await.unwrap();
        fx.control.run_tick(11_000, noon()).await.unwrap();
        assert_eq!(fx.control.telemetry.recent(10).await.unwrap().len(), 1);

        fx.control.run_tick(61_000, noon()).await.unwrap();
        assert_eq!(fx.control.telemetry.recent(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn manual_override_modes_apply_instantly() {
        let mut fx = fixture("manual").await;

        let mut entries = BTreeMap::new();
        entries.insert("lightsMode1".to_string(), "off".to_string());
        entries.insert("pumpMode1".to_string(), "on".to_string());
        fx.control.settings.update(&entries).await.unwrap();

        fx.control.run_tick(1_000, noon()).await.unwrap();

        let status = fx.status_rx.borrow().clone();
        assert!(!status.lights_on[0]);
        assert!(status.lights_on[1]);
        assert!(status.pumps_on[0]);
        assert!(!status.pumps_on[1]);
    }
}
