use thiserror::Error;

/// Per-sensor read failure. Isolated to the sensor that produced it; the
/// tick continues with whatever the other sensors returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorFault {
    #[error("sensor read failed: {0}")]
    ReadError(String),
    #[error("sensor returned no data")]
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Average of the surviving readings for one tick. Both fields are `None`
/// when every sensor failed; downstream treats that tick as "no data".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AggregatedReading {
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
}

impl AggregatedReading {
    pub fn is_empty(&self) -> bool {
        self.temperature_c.is_none() || self.humidity_pct.is_none()
    }
}

pub fn aggregate(results: &[Result<ClimateReading, SensorFault>]) -> AggregatedReading {
    let valid: Vec<&ClimateReading> = results.iter().filter_map(|r| r.as_ref().ok()).collect();

    if valid.is_empty() {
        return AggregatedReading::default();
    }

    let count = valid.len() as f32;
    let temperature_c = valid.iter().map(|r| r.temperature_c).sum::<f32>() / count;
    let humidity_pct = valid.iter().map(|r| r.humidity_pct).sum::<f32>() / count;

    AggregatedReading {
        temperature_c: Some(temperature_c),
        humidity_pct: Some(humidity_pct),
    }
}
