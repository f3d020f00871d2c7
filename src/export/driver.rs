use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use log::{debug, info};

use crate::comm::Comm;
use crate::frame::{Frame, FrameFileWriter, FrameType, TimestreamUnits, Value};
use crate::intervals::intervals_to_chunklist;
use crate::noise::NoiseModel;
use crate::obs::{DistributedData, Observation};
use crate::tod::Scalar;

use super::error::ExportError;
use super::flavors::{discover_flavors, Flavor};
use super::frames::{tod_to_frames, StreamSources};
use super::layout::{bytes_per_sample, compute_file_frames};
use super::stats::ExportStats;

/// Configuration for [`Exporter`]
///
/// Validated eagerly by [`Exporter::new`]: requesting both chunk-based and
/// interval-based frame distribution is a configuration error raised before
/// any directory or file is touched.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Top-level output directory; created if absent
    pub outdir: PathBuf,

    /// File name prefix of each frame file
    pub prefix: String,

    /// Use the TOD's native distribution chunks for frame sizes
    pub use_tod_chunks: bool,

    /// Use the observation's intervals for frame sizes
    /// (mutually exclusive with `use_tod_chunks`)
    pub use_intervals: bool,

    /// Cache prefix to read the detector signal from instead of the
    /// TOD accessors
    pub signal_cache: Option<String>,

    /// Cache name to read common flags from instead of the TOD accessors
    pub common_flags_cache: Option<String>,

    /// Cache prefix to read per-detector flags from instead of the
    /// TOD accessors
    pub flags_cache: Option<String>,

    /// Extra cache flavors to export; empty exports none
    pub copy_cache: Vec<String>,

    /// Bitmask applied to common flags
    pub mask_flag_common: u8,

    /// Bitmask applied to per-detector flags
    pub mask_flag: u8,

    /// Approximate target size of each frame file, in bytes
    pub target_file_size: usize,

    /// Units tag attached to exported signal timestreams
    pub units: TimestreamUnits,
}

impl ExporterConfig {
    /// Default configuration writing under `outdir`
    pub fn new(outdir: impl Into<PathBuf>) -> Self {
        Self {
            outdir: outdir.into(),
            ..Default::default()
        }
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            outdir: PathBuf::from("."),
            prefix: "so".to_string(),
            use_tod_chunks: false,
            use_intervals: false,
            signal_cache: None,
            common_flags_cache: None,
            flags_cache: None,
            copy_cache: Vec::new(),
            mask_flag_common: 255,
            mask_flag: 255,
            // ~500 MB frame files
            target_file_size: 500_000_000,
            units: TimestreamUnits::None,
        }
    }
}

/// Writes distributed TOD observations to a directory tree of frame files
///
/// The top-level directory holds one subdirectory per observation; each
/// subdirectory holds frame files of approximately the configured size,
/// named `<prefix>_<8-digit starting sample offset>.g3`. Frame boundaries
/// follow the TOD chunking, the observation intervals, or a single frame
/// spanning the observation. Every rank of an observation's process group
/// must call [`export`](Self::export) collectively; only rank 0 of the
/// group touches the filesystem below the top-level directory.
pub struct Exporter {
    config: ExporterConfig,
}

impl Exporter {
    /// Validate a configuration and build an exporter
    pub fn new(config: ExporterConfig) -> Result<Self, ExportError> {
        if config.use_tod_chunks && config.use_intervals {
            return Err(ExportError::Config(
                "cannot use both TOD chunks and intervals for frame distribution".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// The validated configuration
    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    /// Export every observation in `data`
    ///
    /// Collective over both communicator scopes: the world designated rank
    /// creates the output directory, then each observation is written by
    /// its group. Any error is unrecoverable for the whole job and
    /// propagates to the caller, whose responsibility it is to terminate
    /// all ranks together.
    pub fn export(&self, data: &DistributedData) -> Result<ExportStats, ExportError> {
        let world = &data.comm.world;
        if world.rank() == 0 {
            fs::create_dir_all(&self.config.outdir)?;
        }
        world.barrier();

        let mut stats = ExportStats::default();
        for obs in &data.observations {
            self.export_observation(&data.comm.group, obs, &mut stats)?;
            stats.observations += 1;
        }
        Ok(stats)
    }

    /// Determine the frame-size sequence for one observation
    pub(super) fn frame_sizes(&self, obs: &Observation) -> Result<Vec<usize>, ExportError> {
        let nsamp = obs.tod.total_samples();
        let sizes = if self.config.use_tod_chunks {
            obs.tod.total_chunks()
        } else if self.config.use_intervals {
            let intervals = obs
                .intervals
                .as_deref()
                .ok_or_else(|| ExportError::MissingIntervals(obs.name.clone()))?;
            intervals_to_chunklist(intervals, nsamp)
        } else {
            vec![nsamp]
        };
        let total: usize = sizes.iter().sum();
        if total != nsamp {
            return Err(ExportError::FrameSizeMismatch {
                got: total,
                expected: nsamp,
            });
        }
        Ok(sizes)
    }

    fn export_observation(
        &self,
        group: &Comm,
        obs: &Observation,
        stats: &mut ExportStats,
    ) -> Result<(), ExportError> {
        let tod = obs.tod.as_ref();
        let nsamp = tod.total_samples();
        let detquat = tod.detector_offsets();
        let detindx = tod.detector_uids();
        let (detector_ranks, sample_ranks) = tod.grid_size();
        if group.size() != detector_ranks * sample_ranks {
            return Err(ExportError::GridMismatch {
                group: group.size(),
                detector_ranks,
                sample_ranks,
            });
        }

        // Scalar observation properties, with TOD metadata folded in.
        let mut props = obs.properties.clone();
        props.extend(tod.meta());

        let obsdir = self.config.outdir.join(&obs.name);
        if group.rank() == 0 {
            fs::create_dir_all(&obsdir)?;
        }
        group.barrier();

        // Frame sizes and flavors are derived deterministically, so every
        // rank computes them locally; only the file layout is broadcast.
        let framesizes = self.frame_sizes(obs)?;
        let exclude: Vec<&str> = [self.config.signal_cache.as_deref(), self.config.flags_cache.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        let flavors: Vec<Flavor> =
            discover_flavors(tod, &exclude, &self.config.copy_cache, group.rank() == 0);

        let layout = if group.rank() == 0 {
            let sample_bytes = bytes_per_sample(detquat.len(), flavors.len() + 1);
            Some(compute_file_frames(
                sample_bytes,
                &framesizes,
                self.config.target_file_size,
            ))
        } else {
            None
        };
        let layout = group.broadcast(0, layout)?;

        debug!(
            "{}: {} samples in {} frame(s) over {} file(s)",
            obs.name,
            nsamp,
            framesizes.len(),
            layout.n_files()
        );

        let sources = StreamSources {
            signal_cache: self.config.signal_cache.as_deref(),
            flags_cache: self.config.flags_cache.as_deref(),
            common_flags_cache: self.config.common_flags_cache.as_deref(),
        };

        for ifile in 0..layout.n_files() {
            let first_frame = layout.file_frame_offs[ifile];
            let nframes = layout.frames_in_file(ifile, framesizes.len());
            let path = obsdir.join(format!(
                "{}_{:08}.g3",
                self.config.prefix, layout.file_sample_offs[ifile]
            ));
            let frame_offsets = &layout.frame_sample_offs[first_frame..first_frame + nframes];
            let frame_sizes = &framesizes[first_frame..first_frame + nframes];

            let mut writer = None;
            if group.rank() == 0 {
                let mut file_writer = FrameFileWriter::create(&path)?;
                write_observation_frame(&mut file_writer, &props, &detindx)?;
                write_calibration_frame(&mut file_writer, &detquat, obs.noise.as_ref())?;
                info!(
                    "{}: file {} starts at frame {} ({} frame(s))",
                    path.display(),
                    ifile,
                    first_frame,
                    nframes
                );
                debug!("  frame offsets {frame_offsets:?}, sizes {frame_sizes:?}");
                writer = Some(file_writer);
            }

            // Collective: every rank feeds its slice of each frame.
            let frames = tod_to_frames(
                tod,
                group,
                frame_offsets,
                frame_sizes,
                &sources,
                &flavors,
                self.config.mask_flag,
                self.config.mask_flag_common,
                self.config.units,
            )?;

            if let Some(mut file_writer) = writer {
                for frame in &frames {
                    file_writer.write_frame(frame)?;
                }
                stats.frames_written += frames.len();
                file_writer.finish()?;
                stats.bytes_written += fs::metadata(&path)?.len();
                stats.files_written += 1;
            }
        }
        Ok(())
    }
}

/// Write the observation frame: scalar properties plus the detector UID map
fn write_observation_frame<W: std::io::Write>(
    writer: &mut FrameFileWriter<W>,
    props: &BTreeMap<String, Scalar>,
    detindx: &BTreeMap<String, i64>,
) -> Result<(), ExportError> {
    let mut frame = Frame::new(FrameType::Observation);
    for (key, value) in props {
        frame.insert(key.clone(), Value::from(value));
    }
    frame.insert("detector_uid", Value::MapInt(detindx.clone()));
    writer.write_frame(&frame)?;
    Ok(())
}

/// Write the calibration frame at the start of an observation file.
///
/// Nominally "preliminary" detector values: offset quaternions and, when a
/// noise model is present, per-stream frequency/PSD arrays, the stream
/// index map, and per-detector (index, weight) pairs restricted to positive
/// weights.
fn write_calibration_frame<W: std::io::Write>(
    writer: &mut FrameFileWriter<W>,
    detquat: &BTreeMap<String, [f64; 4]>,
    noise: Option<&NoiseModel>,
) -> Result<(), ExportError> {
    let mut frame = Frame::new(FrameType::Calibration);
    let quats: BTreeMap<String, Vec<f64>> = detquat
        .iter()
        .map(|(det, quat)| (det.clone(), quat.to_vec()))
        .collect();
    frame.insert("detector_offset", Value::MapVectorDouble(quats));

    if let Some(noise) = noise {
        let mut freqs = BTreeMap::new();
        let mut psds = BTreeMap::new();
        let mut indices = BTreeMap::new();
        let mut det_streams: BTreeMap<String, Vec<i32>> = BTreeMap::new();
        let mut det_weights: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for det in noise.detectors() {
            det_streams.insert(det.to_string(), Vec::new());
            det_weights.insert(det.to_string(), Vec::new());
        }
        for key in noise.keys() {
            let index = noise.index(key).unwrap_or(0);
            freqs.insert(key.to_string(), noise.freq(key).unwrap_or_default().to_vec());
            psds.insert(key.to_string(), noise.psd(key).unwrap_or_default().to_vec());
            indices.insert(key.to_string(), index);
            for det in noise.detectors() {
                let weight = noise.weight(det, key);
                if weight > 0.0 {
                    if let Some(streams) = det_streams.get_mut(det) {
                        streams.push(index as i32);
                    }
                    if let Some(weights) = det_weights.get_mut(det) {
                        weights.push(weight);
                    }
                }
            }
        }
        frame.insert("noise_stream_freq", Value::MapVectorDouble(freqs));
        frame.insert("noise_stream_psd", Value::MapVectorDouble(psds));
        frame.insert("noise_stream_index", Value::MapInt(indices));
        frame.insert("noise_detector_streams", Value::MapVectorInt(det_streams));
        frame.insert("noise_detector_weights", Value::MapVectorDouble(det_weights));
    }
    writer.write_frame(&frame)?;
    Ok(())
}
