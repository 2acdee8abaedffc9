use crate::settings::ExhaustThresholds;

/// Two-threshold hold logic for the exhaust fan group.
///
/// Turn-on is an OR: either metric above its high threshold alone is enough
/// to start venting. Turn-off is an AND: both metrics must drop below their
/// low thresholds, so a single recovered metric cannot chatter the fans.
/// In the dead-band between, the previous state holds. The first tick of a
/// process starts from `prev_on = false`.
pub fn exhaust_should_run(
    prev_on: bool,
    temperature_c: f32,
    humidity_pct: f32,
    thresholds: &ExhaustThresholds,
) -> bool {
    if temperature_c > thresholds.temp_high || humidity_pct > thresholds.hum_high {
        true
    } else if temperature_c < thresholds.temp_low && humidity_pct < thresholds.hum_low {
        false
    } else {
        prev_on
    }
}
