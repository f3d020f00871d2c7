//! Gathering distributed samples into ready-to-write Scan frames.
//!
//! [`tod_to_frames`] is invoked collectively by every rank of the
//! observation's process group: each rank contributes the overlap of its
//! local sample slice with every frame in the file, and the designated rank
//! reassembles the slabs into contiguous per-frame buffers. Non-designated
//! ranks return an empty frame list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::comm::Comm;
use crate::frame::{Frame, FrameType, TimestreamUnits, Value};
use crate::intervals::mask_to_intervals;
use crate::tod::{Dtype, Tod};

use super::error::ExportError;
use super::flavors::{Flavor, FlavorKind};

/// Where the primary signal and flag streams are read from.
///
/// A `Some` entry names a cache prefix (per-detector streams are stored as
/// `<prefix>_<detector>`, common flags under the name itself); `None` falls
/// back to the TOD's read accessors.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamSources<'a> {
    /// Cache prefix for the detector signal
    pub signal_cache: Option<&'a str>,
    /// Cache prefix for per-detector flags
    pub flags_cache: Option<&'a str>,
    /// Cache name for common flags
    pub common_flags_cache: Option<&'a str>,
}

/// One rank's contribution to one frame.
#[derive(Debug, Serialize, Deserialize)]
struct RankSlab {
    /// Slab offset within the frame
    offset: usize,
    /// Slab length in samples
    n: usize,
    times: Vec<f64>,
    common_flags: Vec<u8>,
    bore_radec: Vec<f64>,
    bore_azel: Vec<f64>,
    az: Vec<f64>,
    el: Vec<f64>,
    position: Vec<f64>,
    velocity: Vec<f64>,
    dets: BTreeMap<String, DetSlab>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DetSlab {
    signal: Vec<f64>,
    flags: Vec<u8>,
    extras: BTreeMap<String, ExtraSlab>,
}

#[derive(Debug, Serialize, Deserialize)]
enum ExtraSlab {
    F64(Vec<f64>),
    I32(Vec<i32>),
    U8(Vec<u8>),
}

/// Build the Scan frames for one output file.
///
/// `frame_offsets` and `frame_sizes` describe the file's frames in global
/// sample coordinates. Every rank of `comm` must call this with identical
/// arguments; only rank 0 receives the assembled frames.
pub fn tod_to_frames(
    tod: &dyn Tod,
    comm: &Comm,
    frame_offsets: &[usize],
    frame_sizes: &[usize],
    sources: &StreamSources<'_>,
    flavors: &[Flavor],
    mask_flag: u8,
    mask_flag_common: u8,
    units: TimestreamUnits,
) -> Result<Vec<Frame>, ExportError> {
    let mut out = Vec::new();
    for (&frame_off, &frame_len) in frame_offsets.iter().zip(frame_sizes) {
        let slab = local_slab(
            tod,
            frame_off,
            frame_len,
            sources,
            flavors,
            mask_flag,
            mask_flag_common,
        )?;
        if let Some(slabs) = comm.gather(0, slab)? {
            out.push(assemble_frame(tod, frame_off, frame_len, slabs, flavors, units)?);
        }
    }
    Ok(out)
}

fn cache_f64(tod: &dyn Tod, name: &str, start: usize, n: usize) -> Result<Vec<f64>, ExportError> {
    let array = lookup(tod, name)?;
    let data = array
        .as_f64()
        .ok_or_else(|| ExportError::CacheDtype {
            name: name.to_string(),
            got: array.dtype(),
            expected: Dtype::F64,
        })?;
    Ok(data[start..start + n].to_vec())
}

fn cache_i32(tod: &dyn Tod, name: &str, start: usize, n: usize) -> Result<Vec<i32>, ExportError> {
    let array = lookup(tod, name)?;
    let data = array
        .as_i32()
        .ok_or_else(|| ExportError::CacheDtype {
            name: name.to_string(),
            got: array.dtype(),
            expected: Dtype::I32,
        })?;
    Ok(data[start..start + n].to_vec())
}

fn cache_u8(tod: &dyn Tod, name: &str, start: usize, n: usize) -> Result<Vec<u8>, ExportError> {
    let array = lookup(tod, name)?;
    let data = array
        .as_u8()
        .ok_or_else(|| ExportError::CacheDtype {
            name: name.to_string(),
            got: array.dtype(),
            expected: Dtype::U8,
        })?;
    Ok(data[start..start + n].to_vec())
}

fn lookup<'t>(tod: &'t dyn Tod, name: &str) -> Result<&'t crate::tod::CacheArray, ExportError> {
    let array = tod
        .cache()
        .reference(name)
        .ok_or_else(|| ExportError::MissingCache(name.to_string()))?;
    let (_, local_n) = tod.local_samples();
    if array.len() != local_n {
        return Err(ExportError::CacheShape {
            name: name.to_string(),
            got: array.len(),
            expected: local_n,
        });
    }
    Ok(array)
}

#[allow(clippy::too_many_arguments)]
fn local_slab(
    tod: &dyn Tod,
    frame_off: usize,
    frame_len: usize,
    sources: &StreamSources<'_>,
    flavors: &[Flavor],
    mask_flag: u8,
    mask_flag_common: u8,
) -> Result<RankSlab, ExportError> {
    let (local_off, local_n) = tod.local_samples();
    let begin = frame_off.max(local_off);
    let end = (frame_off + frame_len).min(local_off + local_n);
    if begin >= end {
        return Ok(RankSlab {
            offset: 0,
            n: 0,
            times: Vec::new(),
            common_flags: Vec::new(),
            bore_radec: Vec::new(),
            bore_azel: Vec::new(),
            az: Vec::new(),
            el: Vec::new(),
            position: Vec::new(),
            velocity: Vec::new(),
            dets: BTreeMap::new(),
        });
    }
    let start = begin - local_off;
    let n = end - begin;

    let mut common_flags = match sources.common_flags_cache {
        Some(name) => cache_u8(tod, name, start, n)?,
        None => tod.read_common_flags(start, n),
    };
    for byte in &mut common_flags {
        *byte &= mask_flag_common;
    }

    let (az, el) = tod.read_azel(start, n);

    let mut dets = BTreeMap::new();
    for det in tod.local_detectors() {
        let signal = match sources.signal_cache {
            Some(prefix) => cache_f64(tod, &format!("{prefix}_{det}"), start, n)?,
            None => tod.read_signal(&det, start, n),
        };
        let mut flags = match sources.flags_cache {
            Some(prefix) => cache_u8(tod, &format!("{prefix}_{det}"), start, n)?,
            None => tod.read_flags(&det, start, n),
        };
        for byte in &mut flags {
            *byte &= mask_flag;
        }

        let mut extras = BTreeMap::new();
        for flavor in flavors {
            let name = format!("{}_{}", flavor.prefix, det);
            let slab = match flavor.kind {
                FlavorKind::Timestream => ExtraSlab::F64(cache_f64(tod, &name, start, n)?),
                FlavorKind::VectorInt => ExtraSlab::I32(cache_i32(tod, &name, start, n)?),
                FlavorKind::IntervalMask => ExtraSlab::U8(cache_u8(tod, &name, start, n)?),
            };
            extras.insert(flavor.prefix.clone(), slab);
        }
        dets.insert(det, DetSlab { signal, flags, extras });
    }

    Ok(RankSlab {
        offset: begin - frame_off,
        n,
        times: tod.read_times(start, n),
        common_flags,
        bore_radec: tod.read_boresight_radec(start, n),
        bore_azel: tod.read_boresight_azel(start, n),
        az,
        el,
        position: tod.read_position(start, n),
        velocity: tod.read_velocity(start, n),
        dets,
    })
}

fn copy_slab<T: Copy>(
    dst: &mut [T],
    dst_off: usize,
    src: &[T],
    expect_len: usize,
) -> Result<(), ExportError> {
    if src.len() != expect_len || dst_off + expect_len > dst.len() {
        return Err(ExportError::SlabRange {
            offset: dst_off,
            n: src.len(),
            frame: dst.len(),
        });
    }
    dst[dst_off..dst_off + expect_len].copy_from_slice(src);
    Ok(())
}

fn assemble_frame(
    tod: &dyn Tod,
    frame_off: usize,
    frame_len: usize,
    slabs: Vec<RankSlab>,
    flavors: &[Flavor],
    units: TimestreamUnits,
) -> Result<Frame, ExportError> {
    let all_dets = tod.detectors();

    let mut times = vec![0.0; frame_len];
    let mut common_flags = vec![0u8; frame_len];
    let mut bore_radec = vec![0.0; 4 * frame_len];
    let mut bore_azel = vec![0.0; 4 * frame_len];
    let mut az = vec![0.0; frame_len];
    let mut el = vec![0.0; frame_len];
    let mut position = vec![0.0; 3 * frame_len];
    let mut velocity = vec![0.0; 3 * frame_len];

    let mut signal: BTreeMap<String, Vec<f64>> = all_dets
        .iter()
        .map(|d| (d.clone(), vec![0.0; frame_len]))
        .collect();
    let mut flag_bytes: BTreeMap<String, Vec<u8>> = all_dets
        .iter()
        .map(|d| (d.clone(), vec![0u8; frame_len]))
        .collect();
    let mut extras_f64: BTreeMap<String, BTreeMap<String, Vec<f64>>> = BTreeMap::new();
    let mut extras_i32: BTreeMap<String, BTreeMap<String, Vec<i32>>> = BTreeMap::new();
    let mut extras_u8: BTreeMap<String, BTreeMap<String, Vec<u8>>> = BTreeMap::new();
    for flavor in flavors {
        match flavor.kind {
            FlavorKind::Timestream => {
                extras_f64.insert(
                    flavor.prefix.clone(),
                    all_dets.iter().map(|d| (d.clone(), vec![0.0; frame_len])).collect(),
                );
            }
            FlavorKind::VectorInt => {
                extras_i32.insert(
                    flavor.prefix.clone(),
                    all_dets.iter().map(|d| (d.clone(), vec![0i32; frame_len])).collect(),
                );
            }
            FlavorKind::IntervalMask => {
                extras_u8.insert(
                    flavor.prefix.clone(),
                    all_dets.iter().map(|d| (d.clone(), vec![0u8; frame_len])).collect(),
                );
            }
        }
    }

    for slab in &slabs {
        if slab.n == 0 {
            continue;
        }
        let d = slab.offset;
        copy_slab(&mut times, d, &slab.times, slab.n)?;
        copy_slab(&mut common_flags, d, &slab.common_flags, slab.n)?;
        copy_slab(&mut bore_radec, 4 * d, &slab.bore_radec, 4 * slab.n)?;
        copy_slab(&mut bore_azel, 4 * d, &slab.bore_azel, 4 * slab.n)?;
        copy_slab(&mut az, d, &slab.az, slab.n)?;
        copy_slab(&mut el, d, &slab.el, slab.n)?;
        copy_slab(&mut position, 3 * d, &slab.position, 3 * slab.n)?;
        copy_slab(&mut velocity, 3 * d, &slab.velocity, 3 * slab.n)?;

        for (det, det_slab) in &slab.dets {
            let dst = signal
                .get_mut(det)
                .ok_or_else(|| ExportError::UnknownDetector(det.clone()))?;
            copy_slab(dst, d, &det_slab.signal, slab.n)?;
            if let Some(dst) = flag_bytes.get_mut(det) {
                copy_slab(dst, d, &det_slab.flags, slab.n)?;
            }
            for (prefix, extra) in &det_slab.extras {
                match extra {
                    ExtraSlab::F64(src) => {
                        if let Some(dst) =
                            extras_f64.get_mut(prefix).and_then(|m| m.get_mut(det))
                        {
                            copy_slab(dst, d, src, slab.n)?;
                        }
                    }
                    ExtraSlab::I32(src) => {
                        if let Some(dst) =
                            extras_i32.get_mut(prefix).and_then(|m| m.get_mut(det))
                        {
                            copy_slab(dst, d, src, slab.n)?;
                        }
                    }
                    ExtraSlab::U8(src) => {
                        if let Some(dst) =
                            extras_u8.get_mut(prefix).and_then(|m| m.get_mut(det))
                        {
                            copy_slab(dst, d, src, slab.n)?;
                        }
                    }
                }
            }
        }
    }

    let flags: BTreeMap<String, Vec<(i64, i64)>> = flag_bytes
        .iter()
        .map(|(det, bytes)| (det.clone(), mask_to_intervals(bytes)))
        .collect();

    let mut frame = Frame::new(FrameType::Scan);
    frame.insert("sample_offset", Value::Int(frame_off as i64));
    frame.insert("times", Value::VectorDouble(times));
    frame.insert("flags_common", Value::Intervals(mask_to_intervals(&common_flags)));
    frame.insert("boresight_radec", Value::VectorDouble(bore_radec));
    frame.insert("boresight_azel", Value::VectorDouble(bore_azel));
    frame.insert("boresight_az", Value::VectorDouble(az));
    frame.insert("boresight_el", Value::VectorDouble(el));
    frame.insert("site_position", Value::VectorDouble(position));
    frame.insert("site_velocity", Value::VectorDouble(velocity));
    frame.insert("signal", Value::TimestreamMap { units, streams: signal });
    frame.insert("flags", Value::MapIntervals(flags));

    for flavor in flavors {
        let field = flavor.frame_field();
        match flavor.kind {
            FlavorKind::Timestream => {
                if let Some(streams) = extras_f64.remove(&flavor.prefix) {
                    frame.insert(
                        field,
                        Value::TimestreamMap {
                            units: TimestreamUnits::None,
                            streams,
                        },
                    );
                }
            }
            FlavorKind::VectorInt => {
                if let Some(streams) = extras_i32.remove(&flavor.prefix) {
                    frame.insert(field, Value::MapVectorInt(streams));
                }
            }
            FlavorKind::IntervalMask => {
                if let Some(masks) = extras_u8.remove(&flavor.prefix) {
                    let ranges: BTreeMap<String, Vec<(i64, i64)>> = masks
                        .iter()
                        .map(|(det, bytes)| (det.clone(), mask_to_intervals(bytes)))
                        .collect();
                    frame.insert(field, Value::MapIntervals(ranges));
                }
            }
        }
    }

    Ok(frame)
}
