//! Configuration management for Chronoflux.
//!
//! Every section has defaults matching the protocol constants, so an empty
//! TOML document yields a working configuration.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Minimum vorticity a message must carry to be considered at all
pub const QUALITY_FLOOR: f64 = 0.7;

/// Maximum population variance of a TMR triad
pub const TMR_VARIANCE_THRESHOLD: f64 = 0.000032;

/// Minimum coherence a neighbor needs to receive gossip
pub const PHI_CARDINAL: f64 = 0.72;

/// Noise amplitude of the default sensor
pub const DEFAULT_NOISE_AMPLITUDE: f64 = 0.00001;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChronofluxConfig {
    pub gate: GateConfig,
    pub tmr: TmrConfig,
    pub gossip: GossipConfig,
    pub sensor: SensorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub quality_floor: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            quality_floor: QUALITY_FLOOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TmrConfig {
    pub variance_threshold: f64,
    /// Metric re-measured by the triad on receive
    pub metric: String,
}

impl Default for TmrConfig {
    fn default() -> Self {
        Self {
            variance_threshold: TMR_VARIANCE_THRESHOLD,
            metric: "vorticity".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    pub cardinal_threshold: f64,
    /// Pending forwards buffered before `submit` applies backpressure
    pub queue_capacity: usize,
    /// Forwards delivered concurrently
    pub max_in_flight: usize,
    /// Message ids remembered per node for flood control
    pub seen_capacity: usize,
    /// Re-gossip messages accepted on the receive path
    pub relay_accepted: bool,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            cardinal_threshold: PHI_CARDINAL,
            queue_capacity: 1024,
            max_in_flight: 16,
            seen_capacity: 4096,
            relay_accepted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub noise_amplitude: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            noise_amplitude: DEFAULT_NOISE_AMPLITUDE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ChronofluxConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> CoreResult<String> {
        toml::to_string(self).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Reject thresholds and capacities the protocol cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        check_unit_interval("gate.quality_floor", self.gate.quality_floor)?;
        check_unit_interval("gossip.cardinal_threshold", self.gossip.cardinal_threshold)?;

        if !self.tmr.variance_threshold.is_finite() || self.tmr.variance_threshold < 0.0 {
            return Err(CoreError::Config(format!(
                "tmr.variance_threshold must be a non-negative finite number, got {}",
                self.tmr.variance_threshold
            )));
        }
        if self.tmr.metric.is_empty() {
            return Err(CoreError::Config("tmr.metric must not be empty".to_string()));
        }
        if !self.sensor.noise_amplitude.is_finite() || self.sensor.noise_amplitude < 0.0 {
            return Err(CoreError::Config(format!(
                "sensor.noise_amplitude must be a non-negative finite number, got {}",
                self.sensor.noise_amplitude
            )));
        }

        for (name, value) in [
            ("gossip.queue_capacity", self.gossip.queue_capacity),
            ("gossip.max_in_flight", self.gossip.max_in_flight),
            ("gossip.seen_capacity", self.gossip.seen_capacity),
        ] {
            if value == 0 {
                return Err(CoreError::Config(format!("{name} must be greater than zero")));
            }
        }

        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f64) -> CoreResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::Config(format!(
            "{name} must lie in [0, 1], got {value}"
        )))
    }
}
