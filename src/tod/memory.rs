use std::collections::BTreeMap;

use super::cache::{Cache, CacheArray};
use super::{Scalar, Tod};

/// Fully in-memory TOD used by the demo generator and the tests.
///
/// [`MemoryTod::new`] builds a complete single-process observation with
/// deterministic streams: a 200 Hz time ramp, per-detector signal
/// `uid * 1000 + global_sample_index`, zeroed flags, an azimuth sweep and
/// constant elevation, and fixed site position/velocity. Individual streams
/// can be replaced afterwards, and [`local_view`](MemoryTod::local_view)
/// carves out one rank's sample slice for multi-rank runs.
#[derive(Debug, Clone)]
pub struct MemoryTod {
    nsamp_total: usize,
    local_offset: usize,
    local_n: usize,
    det_names: Vec<String>,
    local_dets: Vec<String>,
    uids: BTreeMap<String, i64>,
    offsets: BTreeMap<String, [f64; 4]>,
    meta: BTreeMap<String, Scalar>,
    grid: (usize, usize),
    chunks: Vec<usize>,
    times: Vec<f64>,
    signal: BTreeMap<String, Vec<f64>>,
    flags: BTreeMap<String, Vec<u8>>,
    common_flags: Vec<u8>,
    bore_radec: Vec<f64>,
    bore_azel: Vec<f64>,
    az: Vec<f64>,
    el: Vec<f64>,
    position: Vec<f64>,
    velocity: Vec<f64>,
    cache: Cache,
}

/// Sample rate of the generated time ramp, in Hz.
const SAMPLE_RATE: f64 = 200.0;

impl MemoryTod {
    /// Create a single-process observation with deterministic default streams
    pub fn new(nsamp: usize, detectors: &[&str]) -> Self {
        let det_names: Vec<String> = detectors.iter().map(|d| d.to_string()).collect();
        let mut uids = BTreeMap::new();
        let mut offsets = BTreeMap::new();
        let mut signal = BTreeMap::new();
        let mut flags = BTreeMap::new();
        for (i, det) in det_names.iter().enumerate() {
            let uid = i as i64;
            uids.insert(det.clone(), uid);
            offsets.insert(det.clone(), [0.01 * i as f64, 0.0, 0.0, 1.0]);
            signal.insert(
                det.clone(),
                (0..nsamp).map(|s| uid as f64 * 1000.0 + s as f64).collect(),
            );
            flags.insert(det.clone(), vec![0u8; nsamp]);
        }

        let times: Vec<f64> = (0..nsamp).map(|s| s as f64 / SAMPLE_RATE).collect();
        let az: Vec<f64> = (0..nsamp)
            .map(|s| 2.0 * std::f64::consts::PI * s as f64 / nsamp.max(1) as f64)
            .collect();
        let el = vec![0.9; nsamp];
        let mut bore_radec = Vec::with_capacity(4 * nsamp);
        let mut bore_azel = Vec::with_capacity(4 * nsamp);
        for s in 0..nsamp {
            let half = az[s] / 2.0;
            bore_radec.extend_from_slice(&[0.0, 0.0, half.sin(), half.cos()]);
            bore_azel.extend_from_slice(&[0.0, 0.0, half.sin(), half.cos()]);
        }
        let mut position = Vec::with_capacity(3 * nsamp);
        let mut velocity = Vec::with_capacity(3 * nsamp);
        for _ in 0..nsamp {
            position.extend_from_slice(&[6_378_137.0, 0.0, 0.0]);
            velocity.extend_from_slice(&[0.0, 460.0, 0.0]);
        }

        Self {
            nsamp_total: nsamp,
            local_offset: 0,
            local_n: nsamp,
            local_dets: det_names.clone(),
            det_names,
            uids,
            offsets,
            meta: BTreeMap::new(),
            grid: (1, 1),
            chunks: vec![nsamp],
            times,
            signal,
            flags,
            common_flags: vec![0u8; nsamp],
            bore_radec,
            bore_azel,
            az,
            el,
            position,
            velocity,
            cache: Cache::new(),
        }
    }

    /// Replace the native chunking of the sample axis
    pub fn set_chunks(&mut self, chunks: Vec<usize>) {
        self.chunks = chunks;
    }

    /// Attach a scalar metadata entry
    pub fn set_meta(&mut self, key: impl Into<String>, value: Scalar) {
        self.meta.insert(key.into(), value);
    }

    /// Replace a detector's signal timestream
    pub fn set_signal(&mut self, det: &str, samples: Vec<f64>) {
        self.signal.insert(det.to_string(), samples);
    }

    /// Replace a detector's flag bytes
    pub fn set_flags(&mut self, det: &str, flags: Vec<u8>) {
        self.flags.insert(det.to_string(), flags);
    }

    /// Replace the common flag bytes
    pub fn set_common_flags(&mut self, flags: Vec<u8>) {
        self.common_flags = flags;
    }

    /// Insert a named array into the cache
    pub fn insert_cache(&mut self, name: impl Into<String>, array: CacheArray) {
        self.cache.insert(name, array);
    }

    /// Carve out one rank's slice of the sample axis.
    ///
    /// Returns a TOD holding only samples `[offset, offset + n)` with the
    /// grid set to `(1, sample_ranks)`. Cache entries are sliced the same
    /// way, so per-detector cache streams stay aligned with the local range.
    pub fn local_view(&self, offset: usize, n: usize, sample_ranks: usize) -> Self {
        let mut view = self.clone();
        view.local_offset = offset;
        view.local_n = n;
        view.grid = (1, sample_ranks);
        view.times = self.times[offset..offset + n].to_vec();
        view.common_flags = self.common_flags[offset..offset + n].to_vec();
        view.az = self.az[offset..offset + n].to_vec();
        view.el = self.el[offset..offset + n].to_vec();
        view.bore_radec = self.bore_radec[4 * offset..4 * (offset + n)].to_vec();
        view.bore_azel = self.bore_azel[4 * offset..4 * (offset + n)].to_vec();
        view.position = self.position[3 * offset..3 * (offset + n)].to_vec();
        view.velocity = self.velocity[3 * offset..3 * (offset + n)].to_vec();
        for (det, samples) in &self.signal {
            view.signal
                .insert(det.clone(), samples[offset..offset + n].to_vec());
        }
        for (det, bytes) in &self.flags {
            view.flags
                .insert(det.clone(), bytes[offset..offset + n].to_vec());
        }
        let mut cache = Cache::new();
        for name in self.cache.keys() {
            if let Some(array) = self.cache.reference(name) {
                cache.insert(name, array.slice(offset, n));
            }
        }
        view.cache = cache;
        view
    }
}

impl Tod for MemoryTod {
    fn total_samples(&self) -> usize {
        self.nsamp_total
    }

    fn detectors(&self) -> Vec<String> {
        self.det_names.clone()
    }

    fn detector_offsets(&self) -> BTreeMap<String, [f64; 4]> {
        self.offsets.clone()
    }

    fn detector_uids(&self) -> BTreeMap<String, i64> {
        self.uids.clone()
    }

    fn meta(&self) -> BTreeMap<String, Scalar> {
        self.meta.clone()
    }

    fn grid_size(&self) -> (usize, usize) {
        self.grid
    }

    fn total_chunks(&self) -> Vec<usize> {
        self.chunks.clone()
    }

    fn local_samples(&self) -> (usize, usize) {
        (self.local_offset, self.local_n)
    }

    fn local_detectors(&self) -> Vec<String> {
        self.local_dets.clone()
    }

    fn cache(&self) -> &Cache {
        &self.cache
    }

    fn read_times(&self, start: usize, n: usize) -> Vec<f64> {
        self.times[start..start + n].to_vec()
    }

    fn read_signal(&self, det: &str, start: usize, n: usize) -> Vec<f64> {
        self.signal[det][start..start + n].to_vec()
    }

    fn read_flags(&self, det: &str, start: usize, n: usize) -> Vec<u8> {
        self.flags[det][start..start + n].to_vec()
    }

    fn read_common_flags(&self, start: usize, n: usize) -> Vec<u8> {
        self.common_flags[start..start + n].to_vec()
    }

    fn read_boresight_radec(&self, start: usize, n: usize) -> Vec<f64> {
        self.bore_radec[4 * start..4 * (start + n)].to_vec()
    }

    fn read_boresight_azel(&self, start: usize, n: usize) -> Vec<f64> {
        self.bore_azel[4 * start..4 * (start + n)].to_vec()
    }

    fn read_azel(&self, start: usize, n: usize) -> (Vec<f64>, Vec<f64>) {
        (
            self.az[start..start + n].to_vec(),
            self.el[start..start + n].to_vec(),
        )
    }

    fn read_position(&self, start: usize, n: usize) -> Vec<f64> {
        self.position[3 * start..3 * (start + n)].to_vec()
    }

    fn read_velocity(&self, start: usize, n: usize) -> Vec<f64> {
        self.velocity[3 * start..3 * (start + n)].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_view_slices_all_streams() {
        let mut tod = MemoryTod::new(100, &["det_a", "det_b"]);
        tod.insert_cache("corr_det_a", CacheArray::F64((0..100).map(|v| v as f64).collect()));

        let view = tod.local_view(40, 30, 2);
        assert_eq!(view.local_samples(), (40, 30));
        assert_eq!(view.grid_size(), (1, 2));
        assert_eq!(view.total_samples(), 100);
        assert_eq!(view.read_times(0, 1)[0], tod.read_times(40, 1)[0]);
        assert_eq!(view.read_signal("det_b", 0, 2), vec![1040.0, 1041.0]);
        assert_eq!(
            view.cache().reference("corr_det_a").and_then(|a| a.as_f64()).map(|s| s[0]),
            Some(40.0)
        );
    }
}
