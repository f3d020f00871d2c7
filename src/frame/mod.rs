//! # Frame container module
//!
//! A minimal G3-style frame container: typed frames written sequentially to
//! a file. A frame is a string-keyed map of typed values tagged with a frame
//! category (Observation, Calibration, Scan). Files are a stream of frames
//! behind a 4-byte magic; values use a little-endian tagged binary encoding.
//!
//! The writer is opened per output file, fed frames in order, and released
//! with [`FrameFileWriter::finish`]. The reader streams frames back and is
//! also an [`Iterator`], which is what the `info` command and the tests use.

mod error;
mod reader;
mod types;
mod writer;


pub use error::FrameError;
pub use reader::FrameFileReader;
pub use types::{Frame, FrameType, TimestreamUnits, Value};
pub use writer::FrameFileWriter;

/// Magic bytes at the start of every frame file.
pub const FILE_MAGIC: &[u8; 4] = b"G3F1";
