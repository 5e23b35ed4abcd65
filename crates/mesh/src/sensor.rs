//! Measurement sources.
//!
//! A node measures a named metric through its [`Sensor`]. Readings are taken
//! blind: a sensor only ever sees its own node's context.

use rand::Rng;

/// What a sensor may look at when measuring: its own node and nothing else.
#[derive(Debug, Clone, Copy)]
pub struct SensorContext<'a> {
    pub node_id: &'a str,
    pub coherence: f64,
}

/// Produces a scalar reading of a named metric.
pub trait Sensor: Send + Sync {
    fn measure(&self, context: &SensorContext<'_>, metric: &str) -> f64;
}

impl<F> Sensor for F
where
    F: Fn(&SensorContext<'_>, &str) -> f64 + Send + Sync,
{
    fn measure(&self, context: &SensorContext<'_>, metric: &str) -> f64 {
        self(context, metric)
    }
}

/// Coherence perturbed by uniform zero-mean noise in `[-amplitude, amplitude]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoisySensor {
    amplitude: f64,
}

impl NoisySensor {
    pub fn new(amplitude: f64) -> Self {
        Self {
            amplitude: amplitude.abs(),
        }
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }
}

impl Default for NoisySensor {
    fn default() -> Self {
        Self::new(chronoflux_core::DEFAULT_NOISE_AMPLITUDE)
    }
}

impl Sensor for NoisySensor {
    fn measure(&self, context: &SensorContext<'_>, _metric: &str) -> f64 {
        if self.amplitude == 0.0 {
            return context.coherence;
        }
        let noise = rand::thread_rng().gen_range(-self.amplitude..=self.amplitude);
        context.coherence + noise
    }
}

/// Always reports the same value. Used to model stuck or adversarial sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSensor(pub f64);

impl Sensor for FixedSensor {
    fn measure(&self, _context: &SensorContext<'_>, _metric: &str) -> f64 {
        self.0
    }
}
