//! Detector noise model parameters exported with the calibration frame.

use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct NoiseStream {
    index: i64,
    freq: Vec<f64>,
    psd: Vec<f64>,
}

/// Precomputed noise model for one observation.
///
/// Holds a set of named noise streams (each with a frequency grid, a PSD,
/// and a stable integer index) and per-(detector, stream) mixing weights.
/// The exporter only reads from it; weights that are not positive are
/// omitted from the calibration frame.
#[derive(Debug, Clone, Default)]
pub struct NoiseModel {
    streams: BTreeMap<String, NoiseStream>,
    weights: BTreeMap<String, BTreeMap<String, f64>>,
}

impl NoiseModel {
    /// Create an empty noise model
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a noise stream under `key` with a stable `index`
    pub fn add_stream(
        &mut self,
        key: impl Into<String>,
        index: i64,
        freq: Vec<f64>,
        psd: Vec<f64>,
    ) {
        self.streams.insert(key.into(), NoiseStream { index, freq, psd });
    }

    /// Set the mixing weight of `key` for detector `det`
    pub fn set_weight(&mut self, det: impl Into<String>, key: impl Into<String>, weight: f64) {
        self.weights
            .entry(det.into())
            .or_default()
            .insert(key.into(), weight);
    }

    /// Detectors with at least one weight entry, in name order
    pub fn detectors(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    /// Stream keys in name order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    /// Frequency grid of a stream
    pub fn freq(&self, key: &str) -> Option<&[f64]> {
        self.streams.get(key).map(|s| s.freq.as_slice())
    }

    /// PSD values of a stream
    pub fn psd(&self, key: &str) -> Option<&[f64]> {
        self.streams.get(key).map(|s| s.psd.as_slice())
    }

    /// Stable integer index of a stream
    pub fn index(&self, key: &str) -> Option<i64> {
        self.streams.get(key).map(|s| s.index)
    }

    /// Mixing weight of `key` for detector `det`; zero when unset
    pub fn weight(&self, det: &str, key: &str) -> f64 {
        self.weights
            .get(det)
            .and_then(|m| m.get(key))
            .copied()
            .unwrap_or(0.0)
    }
}
