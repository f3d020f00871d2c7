//! # Export module
//!
//! Writes distributed TOD observations into directory trees of frame files.
//!
//! The interesting part is not the I/O but the layout planning and the
//! collective control flow: [`layout`] decides how many samples go in each
//! file, [`Exporter`] walks the plan file by file with every rank of the
//! observation's process group in lock-step, and
//! [`frames::tod_to_frames`] gathers each rank's local sample slice into
//! the contiguous per-frame buffers that only the group's designated rank
//! writes. The plan is computed once on that rank and broadcast, so all
//! ranks agree on identical offsets without redundant computation.

mod driver;
mod error;
mod flavors;
pub mod frames;
pub mod layout;
mod stats;

#[cfg(test)]
mod tests;

pub use driver::{Exporter, ExporterConfig};
pub use error::ExportError;
pub use flavors::{Flavor, FlavorKind};
pub use stats::ExportStats;
