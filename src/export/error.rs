use crate::comm::CommError;
use crate::frame::FrameError;
use crate::tod::Dtype;

/// Errors that can occur during export
///
/// Anything raised on the export path is unrecoverable for the whole
/// distributed job: errors propagate out of
/// [`Exporter::export`](super::Exporter::export) untranslated, and the job
/// driver is responsible for terminating every rank together.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Invalid exporter configuration, raised at construction
    #[error("invalid exporter configuration: {0}")]
    Config(String),

    /// Interval-based distribution requested for an observation without intervals
    #[error("observation {0:?} does not contain intervals, cannot distribute using them")]
    MissingIntervals(String),

    /// The frame-size sequence does not cover the observation
    #[error("frame sizes sum to {got} but the observation has {expected} samples")]
    FrameSizeMismatch {
        /// Sum of the frame-size sequence
        got: usize,
        /// The observation's total sample count
        expected: usize,
    },

    /// The process group does not match the TOD's distribution grid
    #[error("process group has {group} ranks but the TOD grid is {detector_ranks}x{sample_ranks}")]
    GridMismatch {
        /// Size of the observation's process group
        group: usize,
        /// Detector-axis ranks of the TOD grid
        detector_ranks: usize,
        /// Sample-axis ranks of the TOD grid
        sample_ranks: usize,
    },

    /// A configured cache entry is absent from the TOD cache
    #[error("cache entry {0:?} is missing")]
    MissingCache(String),

    /// A cache entry does not span this rank's local sample slice
    #[error("cache entry {name:?} has {got} samples, expected {expected}")]
    CacheShape {
        /// Name of the cache entry
        name: String,
        /// Number of samples found
        got: usize,
        /// Number of samples in the local slice
        expected: usize,
    },

    /// A cache entry has the wrong element type for its role
    #[error("cache entry {name:?} has dtype {got:?}, expected {expected:?}")]
    CacheDtype {
        /// Name of the cache entry
        name: String,
        /// Element type found
        got: Dtype,
        /// Element type required
        expected: Dtype,
    },

    /// A gathered sample slab does not fit its frame
    #[error("gathered slab of {n} samples at offset {offset} exceeds frame of {frame} samples")]
    SlabRange {
        /// Destination offset of the slab within the frame
        offset: usize,
        /// Length of the gathered slab
        n: usize,
        /// Destination buffer length
        frame: usize,
    },

    /// A gathered slab referenced a detector the observation does not have
    #[error("gathered slab for unknown detector {0:?}")]
    UnknownDetector(String),

    /// I/O error during directory or file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the frame codec
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Error from a collective operation
    #[error("communicator error: {0}")]
    Comm(#[from] CommError),
}
