//! Observations and the distributed data container handed to the exporter.

use std::collections::BTreeMap;

use crate::comm::PipelineComm;
use crate::intervals::Interval;
use crate::noise::NoiseModel;
use crate::tod::{Scalar, Tod};

/// A named unit of data: scalar metadata, a TOD handle, and optional
/// intervals and noise model.
///
/// Read-only to the exporter; every derived structure (frame sizes, layout,
/// flavor set) is recomputed per observation and discarded afterwards.
pub struct Observation {
    /// Observation name; becomes the output subdirectory name
    pub name: String,
    /// Scalar properties written to the observation frame
    pub properties: BTreeMap<String, Scalar>,
    /// The distributed TOD holding this observation's samples
    pub tod: Box<dyn Tod>,
    /// Time intervals used for interval-based frame distribution
    pub intervals: Option<Vec<Interval>>,
    /// Precomputed noise model written to the calibration frame
    pub noise: Option<NoiseModel>,
}

impl Observation {
    /// Create an observation with no properties, intervals, or noise model
    pub fn new(name: impl Into<String>, tod: Box<dyn Tod>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
            tod,
            intervals: None,
            noise: None,
        }
    }

    /// Attach a scalar property
    pub fn with_property(mut self, key: impl Into<String>, value: Scalar) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Attach interval data
    pub fn with_intervals(mut self, intervals: Vec<Interval>) -> Self {
        self.intervals = Some(intervals);
        self
    }

    /// Attach a noise model
    pub fn with_noise(mut self, noise: NoiseModel) -> Self {
        self.noise = Some(noise);
        self
    }
}

/// The distributed data handed to [`Exporter::export`](crate::export::Exporter::export):
/// a communicator hierarchy plus this process's observations.
pub struct DistributedData {
    /// World and group communicator scopes
    pub comm: PipelineComm,
    /// Observations assigned to this process's group
    pub observations: Vec<Observation>,
}

impl DistributedData {
    /// Wrap observations for a single-process job
    pub fn solo(observations: Vec<Observation>) -> Self {
        Self {
            comm: PipelineComm::solo(),
            observations,
        }
    }

    /// Wrap observations with an explicit communicator hierarchy
    pub fn new(comm: PipelineComm, observations: Vec<Observation>) -> Self {
        Self { comm, observations }
    }
}
