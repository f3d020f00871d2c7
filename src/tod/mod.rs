//! # TOD module
//!
//! The read contract the exporter consumes: a distributed store of
//! time-ordered detector data plus a process-local cache of named arrays.
//!
//! Samples are distributed over a two-level process grid of
//! `detector_ranks x sample_ranks`. Each process holds a contiguous slice of
//! the sample axis for its subset of detectors; all read accessors take
//! offsets **local** to that slice. [`MemoryTod`] is the in-memory
//! implementation used by the demo generator and the tests.

mod cache;
mod memory;

pub use cache::{Cache, CacheArray, Dtype};
pub use memory::MemoryTod;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::frame::Value;

/// Scalar metadata value attached to an observation or TOD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// 64-bit float
    Double(f64),
    /// UTF-8 string
    String(String),
}

impl From<&Scalar> for Value {
    fn from(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Bool(v) => Value::Bool(*v),
            Scalar::Int(v) => Value::Int(*v),
            Scalar::Double(v) => Value::Double(*v),
            Scalar::String(v) => Value::String(v.clone()),
        }
    }
}

/// Read contract for a distributed TOD.
///
/// Accessor offsets are local: `start` indexes into this process's sample
/// slice as reported by [`local_samples`](Tod::local_samples), and callers
/// must stay within it. Per-detector accessors accept only detectors listed
/// by [`local_detectors`](Tod::local_detectors).
pub trait Tod: Send + Sync {
    /// Total number of samples in the observation, across all processes
    fn total_samples(&self) -> usize;

    /// All detector names in the observation, in a fixed order
    fn detectors(&self) -> Vec<String>;

    /// Per-detector pointing offset quaternions
    fn detector_offsets(&self) -> BTreeMap<String, [f64; 4]>;

    /// Per-detector unique integer IDs
    fn detector_uids(&self) -> BTreeMap<String, i64>;

    /// Scalar metadata attached to the TOD
    fn meta(&self) -> BTreeMap<String, Scalar>;

    /// Shape of the process grid as `(detector_ranks, sample_ranks)`
    fn grid_size(&self) -> (usize, usize);

    /// The native chunking of the sample axis across the whole observation
    fn total_chunks(&self) -> Vec<usize>;

    /// This process's sample slice as `(global offset, length)`
    fn local_samples(&self) -> (usize, usize);

    /// Detectors held by this process
    fn local_detectors(&self) -> Vec<String>;

    /// The process-local array cache
    fn cache(&self) -> &Cache;

    /// Timestamps in seconds
    fn read_times(&self, start: usize, n: usize) -> Vec<f64>;

    /// Detector signal timestream
    fn read_signal(&self, det: &str, start: usize, n: usize) -> Vec<f64>;

    /// Per-detector flag bytes
    fn read_flags(&self, det: &str, start: usize, n: usize) -> Vec<u8>;

    /// Common (all-detector) flag bytes
    fn read_common_flags(&self, start: usize, n: usize) -> Vec<u8>;

    /// Boresight pointing quaternions in RA/DEC, flattened `4 * n`
    fn read_boresight_radec(&self, start: usize, n: usize) -> Vec<f64>;

    /// Boresight pointing quaternions in Az/El, flattened `4 * n`
    fn read_boresight_azel(&self, start: usize, n: usize) -> Vec<f64>;

    /// Boresight azimuth and elevation angles in radians
    fn read_azel(&self, start: usize, n: usize) -> (Vec<f64>, Vec<f64>);

    /// Telescope position vectors, flattened `3 * n`
    fn read_position(&self, start: usize, n: usize) -> Vec<f64>;

    /// Telescope velocity vectors, flattened `3 * n`
    fn read_velocity(&self, start: usize, n: usize) -> Vec<f64>;
}
