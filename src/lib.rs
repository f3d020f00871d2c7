//! # todg3 - Distributed TOD to frame-file exporter
//!
//! `todg3` exports time-ordered detector data (TOD) held in a distributed
//! in-memory store into a directory tree of framed binary files. The top
//! level output directory contains one subdirectory per observation; each
//! observation directory contains frame files of approximately a configured
//! size, and a single frame file contains multiple frames. The size of each
//! frame is determined by either the TOD distribution chunks or the
//! observation's time intervals.
//!
//! ## Key Features
//!
//! - **Byte-budget file planning**: frames are grouped greedily into files
//!   against a target file size, computed once per process group and
//!   broadcast so all ranks agree on identical offsets.
//!
//! - **Distribution-aware serialization**: sample data is gathered from
//!   every rank's local slice into contiguous per-frame buffers without
//!   ever materializing a whole observation on one process.
//!
//! - **Designated-rank writing**: only rank 0 of a process group opens or
//!   writes files; all other ranks feed data through collective calls.
//!
//! - **Cache flavor export**: extra per-detector streams in the TOD cache
//!   are discovered by naming convention, classified by element type, and
//!   exported alongside the primary signal on request.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use todg3::export::{Exporter, ExporterConfig};
//! use todg3::obs::{DistributedData, Observation};
//! use todg3::tod::MemoryTod;
//!
//! let tod = MemoryTod::new(10_000, &["det_0a", "det_0b"]);
//! let obs = Observation::new("obs_demo", Box::new(tod));
//! let data = DistributedData::solo(vec![obs]);
//!
//! let exporter = Exporter::new(ExporterConfig::new("exported"))?;
//! let stats = exporter.export(&data)?;
//! println!("{stats}");
//! # Ok::<(), todg3::export::ExportError>(())
//! ```
//!
//! This creates a directory structure:
//! ```text
//! exported/
//! └── obs_demo/
//!     └── so_00000000.g3    # 1 Observation + 1 Calibration + N Scan frames
//! ```
//!
//! ## Architecture
//!
//! - [`export`]: layout planning and the collective export driver
//! - [`frame`]: frame model and the frame-file codec
//! - [`tod`]: the distributed TOD read contract and its in-memory impl
//! - [`comm`]: world/group communicator scopes (solo and thread-backed)
//! - [`intervals`]: time intervals and chunk-list conversion
//! - [`noise`]: noise model parameters for the calibration frame
//! - [`obs`]: observations and the distributed data container
//!
//! ## Process model
//!
//! Ranks execute in lock-step at synchronization points: the world barrier
//! around output-directory creation, the group barrier after each
//! observation directory, the layout broadcast, and one collective gather
//! per data frame. Errors on the export path are unrecoverable for the
//! whole job and propagate to the caller untranslated.

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![allow(clippy::too_many_arguments)]

pub mod comm;
pub mod export;
pub mod frame;
pub mod intervals;
pub mod noise;
pub mod obs;
pub mod tod;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::comm::{Comm, CommError, PipelineComm, ThreadedComm};
    pub use crate::export::{
        ExportError, ExportStats, Exporter, ExporterConfig, Flavor, FlavorKind,
    };
    pub use crate::frame::{
        Frame, FrameError, FrameFileReader, FrameFileWriter, FrameType, TimestreamUnits, Value,
    };
    pub use crate::intervals::{intervals_to_chunklist, Interval};
    pub use crate::noise::NoiseModel;
    pub use crate::obs::{DistributedData, Observation};
    pub use crate::tod::{Cache, CacheArray, Dtype, MemoryTod, Scalar, Tod};
}
