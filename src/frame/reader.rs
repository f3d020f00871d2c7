use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use super::error::FrameError;
use super::types::{Frame, FrameType, SampleRange, TimestreamUnits, Value};
use super::writer::{
    TAG_BOOL, TAG_DOUBLE, TAG_INT, TAG_INTERVALS, TAG_MAP_INT, TAG_MAP_INTERVALS,
    TAG_MAP_VECTOR_DOUBLE, TAG_MAP_VECTOR_INT, TAG_STRING, TAG_TIMESTREAM, TAG_TIMESTREAM_MAP,
    TAG_VECTOR_DOUBLE, TAG_VECTOR_INT,
};
use super::FILE_MAGIC;

// Decoding limits: strings and map/vector counts beyond these are treated as
// corruption rather than allocation requests.
const MAX_STRING_LEN: u32 = 16 * 1024 * 1024;
const MAX_PREALLOC: usize = 64 * 1024;

/// Streaming reader for frame files
///
/// Yields frames in file order; also usable as an [`Iterator`] over
/// `Result<Frame, FrameError>`.
#[derive(Debug)]
pub struct FrameFileReader<R: Read> {
    inner: R,
}

impl FrameFileReader<BufReader<File>> {
    /// Open a frame file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FrameError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> FrameFileReader<R> {
    /// Create a reader over any `Read` implementation
    pub fn new(mut inner: R) -> Result<Self, FrameError> {
        let mut magic = [0u8; 4];
        inner.read_exact(&mut magic)?;
        if &magic != FILE_MAGIC {
            return Err(FrameError::BadMagic);
        }
        Ok(Self { inner })
    }

    /// Read the next frame, or `None` at a clean end of file
    pub fn read_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        let tag = match self.inner.read_u8() {
            Ok(tag) => tag,
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let frame_type = FrameType::from_tag(tag).ok_or(FrameError::UnknownFrameType(tag))?;
        let n_entries = self.inner.read_u32::<LittleEndian>()?;
        let mut frame = Frame::new(frame_type);
        for _ in 0..n_entries {
            let key = read_string(&mut self.inner)?;
            let value = read_value(&mut self.inner)?;
            frame.insert(key, value);
        }
        Ok(Some(frame))
    }
}

impl<R: Read> Iterator for FrameFileReader<R> {
    type Item = Result<Frame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}

fn read_string<R: Read>(r: &mut R) -> Result<String, FrameError> {
    let len = r.read_u32::<LittleEndian>()?;
    if len > MAX_STRING_LEN {
        return Err(FrameError::Corrupt(format!("string length {len} too large")));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

fn read_count<R: Read>(r: &mut R) -> Result<usize, FrameError> {
    let count = r.read_u64::<LittleEndian>()?;
    usize::try_from(count).map_err(|_| FrameError::Corrupt(format!("count {count} too large")))
}

fn read_f64_vec<R: Read>(r: &mut R) -> Result<Vec<f64>, FrameError> {
    let count = read_count(r)?;
    let mut out = Vec::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        out.push(r.read_f64::<LittleEndian>()?);
    }
    Ok(out)
}

fn read_i32_vec<R: Read>(r: &mut R) -> Result<Vec<i32>, FrameError> {
    let count = read_count(r)?;
    let mut out = Vec::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        out.push(r.read_i32::<LittleEndian>()?);
    }
    Ok(out)
}

fn read_ranges<R: Read>(r: &mut R) -> Result<Vec<SampleRange>, FrameError> {
    let count = read_count(r)?;
    let mut out = Vec::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        let start = r.read_i64::<LittleEndian>()?;
        let stop = r.read_i64::<LittleEndian>()?;
        out.push((start, stop));
    }
    Ok(out)
}

fn read_map<R: Read, V, F>(r: &mut R, mut parse: F) -> Result<BTreeMap<String, V>, FrameError>
where
    F: FnMut(&mut R) -> Result<V, FrameError>,
{
    let count = read_count(r)?;
    let mut out = BTreeMap::new();
    for _ in 0..count {
        let key = read_string(r)?;
        let value = parse(r)?;
        out.insert(key, value);
    }
    Ok(out)
}

fn read_units<R: Read>(r: &mut R) -> Result<TimestreamUnits, FrameError> {
    let tag = r.read_u8()?;
    TimestreamUnits::from_tag(tag).ok_or(FrameError::UnknownUnits(tag))
}

fn read_value<R: Read>(r: &mut R) -> Result<Value, FrameError> {
    let tag = r.read_u8()?;
    let value = match tag {
        TAG_BOOL => Value::Bool(r.read_u8()? != 0),
        TAG_INT => Value::Int(r.read_i64::<LittleEndian>()?),
        TAG_DOUBLE => Value::Double(r.read_f64::<LittleEndian>()?),
        TAG_STRING => Value::String(read_string(r)?),
        TAG_VECTOR_INT => Value::VectorInt(read_i32_vec(r)?),
        TAG_VECTOR_DOUBLE => Value::VectorDouble(read_f64_vec(r)?),
        TAG_MAP_INT => Value::MapInt(read_map(r, |r| Ok(r.read_i64::<LittleEndian>()?))?),
        TAG_MAP_VECTOR_INT => Value::MapVectorInt(read_map(r, read_i32_vec)?),
        TAG_MAP_VECTOR_DOUBLE => Value::MapVectorDouble(read_map(r, read_f64_vec)?),
        TAG_TIMESTREAM => {
            let units = read_units(r)?;
            Value::Timestream {
                units,
                samples: read_f64_vec(r)?,
            }
        }
        TAG_TIMESTREAM_MAP => {
            let units = read_units(r)?;
            Value::TimestreamMap {
                units,
                streams: read_map(r, read_f64_vec)?,
            }
        }
        TAG_INTERVALS => Value::Intervals(read_ranges(r)?),
        TAG_MAP_INTERVALS => Value::MapIntervals(read_map(r, read_ranges)?),
        other => return Err(FrameError::UnknownValueTag(other)),
    };
    Ok(value)
}
