//! Triple Modular Redundancy validator.
//!
//! Three nodes measure the same metric independently. Their readings are
//! snapshotted before any comparison happens, then accepted only if the
//! population variance stays within the configured bound.

use crate::node::MeshNode;
use chronoflux_core::TMR_VARIANCE_THRESHOLD;
use serde::Serialize;
use tracing::warn;

/// Readings of one triad, captured before they are compared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TriadSnapshot {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl TriadSnapshot {
    pub fn from_readings(readings: [f64; 3]) -> Self {
        let [alpha, beta, gamma] = readings;
        Self { alpha, beta, gamma }
    }

    pub fn readings(&self) -> [f64; 3] {
        [self.alpha, self.beta, self.gamma]
    }

    pub fn mean(&self) -> f64 {
        (self.alpha + self.beta + self.gamma) / 3.0
    }

    /// Population variance (divisor 3).
    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        self.readings()
            .iter()
            .map(|r| (r - mean).powi(2))
            .sum::<f64>()
            / 3.0
    }
}

/// Outcome of one TMR round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TmrReport {
    pub snapshot: TriadSnapshot,
    pub mean: f64,
    pub variance: f64,
    pub threshold: f64,
    pub passed: bool,
}

impl TmrReport {
    /// `(mean, true)` on consensus, `(0.0, false)` otherwise.
    pub fn verdict(&self) -> (f64, bool) {
        if self.passed {
            (self.mean, true)
        } else {
            (0.0, false)
        }
    }
}

/// Pure consensus arithmetic over a snapshot.
///
/// A NaN variance never passes.
pub fn evaluate_readings(snapshot: TriadSnapshot, threshold: f64) -> TmrReport {
    let mean = snapshot.mean();
    let variance = snapshot.variance();
    TmrReport {
        snapshot,
        mean,
        variance,
        threshold,
        passed: variance <= threshold,
    }
}

/// Validator over a fixed triad of nodes. Built per validation call.
#[derive(Debug)]
pub struct TmrValidator<'a> {
    alpha: &'a MeshNode,
    beta: &'a MeshNode,
    gamma: &'a MeshNode,
    threshold: f64,
}

impl<'a> TmrValidator<'a> {
    pub fn new(alpha: &'a MeshNode, beta: &'a MeshNode, gamma: &'a MeshNode) -> Self {
        Self::with_threshold(alpha, beta, gamma, TMR_VARIANCE_THRESHOLD)
    }

    pub fn with_threshold(
        alpha: &'a MeshNode,
        beta: &'a MeshNode,
        gamma: &'a MeshNode,
        threshold: f64,
    ) -> Self {
        Self {
            alpha,
            beta,
            gamma,
            threshold,
        }
    }

    /// True when all three members are distinct nodes.
    pub fn is_distinct(&self) -> bool {
        self.alpha.id() != self.beta.id()
            && self.alpha.id() != self.gamma.id()
            && self.beta.id() != self.gamma.id()
    }

    /// Each member measures on its own; no reading is visible to the others.
    pub fn snapshot(&self, metric: &str) -> TriadSnapshot {
        TriadSnapshot::from_readings([self.alpha, self.beta, self.gamma].map(|n| n.measure(metric)))
    }

    pub fn assess(&self, metric: &str) -> TmrReport {
        if !self.is_distinct() {
            warn!(
                alpha = self.alpha.id(),
                beta = self.beta.id(),
                gamma = self.gamma.id(),
                "TMR triad aliases a node; fewer than 3 independent sources"
            );
        }
        evaluate_readings(self.snapshot(metric), self.threshold)
    }

    pub fn validate_measurement(&self, metric: &str) -> (f64, bool) {
        self.assess(metric).verdict()
    }
}
