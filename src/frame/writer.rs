use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use super::error::FrameError;
use super::types::{Frame, SampleRange, Value};
use super::FILE_MAGIC;

// Value type tags on the wire. Stable across releases.
pub(super) const TAG_BOOL: u8 = 1;
pub(super) const TAG_INT: u8 = 2;
pub(super) const TAG_DOUBLE: u8 = 3;
pub(super) const TAG_STRING: u8 = 4;
pub(super) const TAG_VECTOR_INT: u8 = 5;
pub(super) const TAG_VECTOR_DOUBLE: u8 = 6;
pub(super) const TAG_MAP_INT: u8 = 7;
pub(super) const TAG_MAP_VECTOR_INT: u8 = 8;
pub(super) const TAG_MAP_VECTOR_DOUBLE: u8 = 9;
pub(super) const TAG_TIMESTREAM: u8 = 10;
pub(super) const TAG_TIMESTREAM_MAP: u8 = 11;
pub(super) const TAG_INTERVALS: u8 = 12;
pub(super) const TAG_MAP_INTERVALS: u8 = 13;

/// Streaming writer for frame files
///
/// Frames are encoded directly into the underlying writer in call order.
/// Call [`finish`](Self::finish) to flush and release the sink.
pub struct FrameFileWriter<W: Write> {
    inner: W,
    frames_written: usize,
}

impl FrameFileWriter<BufWriter<File>> {
    /// Create a new frame file at the given path, truncating any existing file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, FrameError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> FrameFileWriter<W> {
    /// Create a new writer over any `Write` implementation
    pub fn new(mut inner: W) -> Result<Self, FrameError> {
        inner.write_all(FILE_MAGIC)?;
        Ok(Self {
            inner,
            frames_written: 0,
        })
    }

    /// Number of frames written so far
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Append one frame to the file
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), FrameError> {
        self.inner.write_u8(frame.frame_type().tag())?;
        self.inner.write_u32::<LittleEndian>(frame.len() as u32)?;
        for (key, value) in frame.iter() {
            write_string(&mut self.inner, key)?;
            write_value(&mut self.inner, value)?;
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Flush and release the underlying sink
    pub fn finish(mut self) -> Result<W, FrameError> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn write_string<W: Write>(w: &mut W, s: &str) -> Result<(), FrameError> {
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn write_f64_slice<W: Write>(w: &mut W, data: &[f64]) -> Result<(), FrameError> {
    w.write_u64::<LittleEndian>(data.len() as u64)?;
    for &v in data {
        w.write_f64::<LittleEndian>(v)?;
    }
    Ok(())
}

fn write_i32_slice<W: Write>(w: &mut W, data: &[i32]) -> Result<(), FrameError> {
    w.write_u64::<LittleEndian>(data.len() as u64)?;
    for &v in data {
        w.write_i32::<LittleEndian>(v)?;
    }
    Ok(())
}

fn write_ranges<W: Write>(w: &mut W, ranges: &[SampleRange]) -> Result<(), FrameError> {
    w.write_u64::<LittleEndian>(ranges.len() as u64)?;
    for &(start, stop) in ranges {
        w.write_i64::<LittleEndian>(start)?;
        w.write_i64::<LittleEndian>(stop)?;
    }
    Ok(())
}

fn write_map<W: Write, V, F>(w: &mut W, map: &BTreeMap<String, V>, mut emit: F) -> Result<(), FrameError>
where
    F: FnMut(&mut W, &V) -> Result<(), FrameError>,
{
    w.write_u64::<LittleEndian>(map.len() as u64)?;
    for (key, value) in map {
        write_string(w, key)?;
        emit(w, value)?;
    }
    Ok(())
}

fn write_value<W: Write>(w: &mut W, value: &Value) -> Result<(), FrameError> {
    match value {
        Value::Bool(v) => {
            w.write_u8(TAG_BOOL)?;
            w.write_u8(u8::from(*v))?;
        }
        Value::Int(v) => {
            w.write_u8(TAG_INT)?;
            w.write_i64::<LittleEndian>(*v)?;
        }
        Value::Double(v) => {
            w.write_u8(TAG_DOUBLE)?;
            w.write_f64::<LittleEndian>(*v)?;
        }
        Value::String(v) => {
            w.write_u8(TAG_STRING)?;
            write_string(w, v)?;
        }
        Value::VectorInt(v) => {
            w.write_u8(TAG_VECTOR_INT)?;
            write_i32_slice(w, v)?;
        }
        Value::VectorDouble(v) => {
            w.write_u8(TAG_VECTOR_DOUBLE)?;
            write_f64_slice(w, v)?;
        }
        Value::MapInt(m) => {
            w.write_u8(TAG_MAP_INT)?;
            write_map(w, m, |w, v| {
                w.write_i64::<LittleEndian>(*v)?;
                Ok(())
            })?;
        }
        Value::MapVectorInt(m) => {
            w.write_u8(TAG_MAP_VECTOR_INT)?;
            write_map(w, m, |w, v| write_i32_slice(w, v))?;
        }
        Value::MapVectorDouble(m) => {
            w.write_u8(TAG_MAP_VECTOR_DOUBLE)?;
            write_map(w, m, |w, v| write_f64_slice(w, v))?;
        }
        Value::Timestream { units, samples } => {
            w.write_u8(TAG_TIMESTREAM)?;
            w.write_u8(units.tag())?;
            write_f64_slice(w, samples)?;
        }
        Value::TimestreamMap { units, streams } => {
            w.write_u8(TAG_TIMESTREAM_MAP)?;
            w.write_u8(units.tag())?;
            write_map(w, streams, |w, v| write_f64_slice(w, v))?;
        }
        Value::Intervals(ranges) => {
            w.write_u8(TAG_INTERVALS)?;
            write_ranges(w, ranges)?;
        }
        Value::MapIntervals(m) => {
            w.write_u8(TAG_MAP_INTERVALS)?;
            write_map(w, m, |w, v| write_ranges(w, v))?;
        }
    }
    Ok(())
}
