use std::collections::BTreeMap;

/// Category of a frame within an observation file.
///
/// Every output file starts with one `Observation` and one `Calibration`
/// frame followed by the `Scan` frames holding the sample data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Scalar observation metadata plus the detector UID mapping
    Observation,
    /// Detector offsets and (optionally) noise model parameters
    Calibration,
    /// A contiguous slice of sample data
    Scan,
}

impl FrameType {
    pub(crate) fn tag(self) -> u8 {
        match self {
            FrameType::Observation => 1,
            FrameType::Calibration => 2,
            FrameType::Scan => 3,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(FrameType::Observation),
            2 => Some(FrameType::Calibration),
            3 => Some(FrameType::Scan),
            _ => None,
        }
    }

    /// Human-readable name of the frame category
    pub fn name(self) -> &'static str {
        match self {
            FrameType::Observation => "Observation",
            FrameType::Calibration => "Calibration",
            FrameType::Scan => "Scan",
        }
    }
}

/// Units tag attached to exported timestream values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum TimestreamUnits {
    /// Unitless / unspecified
    #[default]
    None,
    /// Raw ADC counts
    Counts,
    /// Volts
    Volts,
    /// Watts
    Watts,
    /// Kelvin (CMB temperature units)
    Kelvin,
}

impl TimestreamUnits {
    pub(crate) fn tag(self) -> u8 {
        match self {
            TimestreamUnits::None => 0,
            TimestreamUnits::Counts => 1,
            TimestreamUnits::Volts => 2,
            TimestreamUnits::Watts => 3,
            TimestreamUnits::Kelvin => 4,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(TimestreamUnits::None),
            1 => Some(TimestreamUnits::Counts),
            2 => Some(TimestreamUnits::Volts),
            3 => Some(TimestreamUnits::Watts),
            4 => Some(TimestreamUnits::Kelvin),
            _ => None,
        }
    }

    /// Short unit label used by the CLI
    pub fn label(self) -> &'static str {
        match self {
            TimestreamUnits::None => "none",
            TimestreamUnits::Counts => "counts",
            TimestreamUnits::Volts => "V",
            TimestreamUnits::Watts => "W",
            TimestreamUnits::Kelvin => "K",
        }
    }
}

/// A half-open `[start, stop)` sample range, used by interval-mask values.
pub type SampleRange = (i64, i64);

/// A typed value stored under a key in a [`Frame`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean scalar
    Bool(bool),
    /// 64-bit integer scalar
    Int(i64),
    /// 64-bit float scalar
    Double(f64),
    /// UTF-8 string scalar
    String(String),
    /// Vector of 32-bit integers
    VectorInt(Vec<i32>),
    /// Vector of 64-bit floats
    VectorDouble(Vec<f64>),
    /// Map of string to integer scalar
    MapInt(BTreeMap<String, i64>),
    /// Map of string to integer vector
    MapVectorInt(BTreeMap<String, Vec<i32>>),
    /// Map of string to float vector
    MapVectorDouble(BTreeMap<String, Vec<f64>>),
    /// A single sampled data stream with a units tag
    Timestream {
        /// Units of the samples
        units: TimestreamUnits,
        /// The sample values
        samples: Vec<f64>,
    },
    /// A per-detector collection of sampled data streams sharing one units tag
    TimestreamMap {
        /// Units shared by all streams
        units: TimestreamUnits,
        /// Stream values keyed by detector name
        streams: BTreeMap<String, Vec<f64>>,
    },
    /// A list of half-open sample ranges
    Intervals(Vec<SampleRange>),
    /// Per-detector lists of half-open sample ranges
    MapIntervals(BTreeMap<String, Vec<SampleRange>>),
}

impl Value {
    /// Name of this value's type, as shown by the `info` command
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Double(_) => "Double",
            Value::String(_) => "String",
            Value::VectorInt(_) => "VectorInt",
            Value::VectorDouble(_) => "VectorDouble",
            Value::MapInt(_) => "MapInt",
            Value::MapVectorInt(_) => "MapVectorInt",
            Value::MapVectorDouble(_) => "MapVectorDouble",
            Value::Timestream { .. } => "Timestream",
            Value::TimestreamMap { .. } => "TimestreamMap",
            Value::Intervals(_) => "Intervals",
            Value::MapIntervals(_) => "MapIntervals",
        }
    }

    /// Integer scalar, if this is an `Int`
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float vector, if this is a `VectorDouble`
    pub fn as_vector_double(&self) -> Option<&[f64]> {
        match self {
            Value::VectorDouble(v) => Some(v),
            _ => None,
        }
    }

    /// String-to-int map, if this is a `MapInt`
    pub fn as_map_int(&self) -> Option<&BTreeMap<String, i64>> {
        match self {
            Value::MapInt(m) => Some(m),
            _ => None,
        }
    }

    /// String-to-float-vector map, if this is a `MapVectorDouble`
    pub fn as_map_vector_double(&self) -> Option<&BTreeMap<String, Vec<f64>>> {
        match self {
            Value::MapVectorDouble(m) => Some(m),
            _ => None,
        }
    }

    /// Timestream map contents, if this is a `TimestreamMap`
    pub fn as_timestream_map(&self) -> Option<(TimestreamUnits, &BTreeMap<String, Vec<f64>>)> {
        match self {
            Value::TimestreamMap { units, streams } => Some((*units, streams)),
            _ => None,
        }
    }
}

/// A self-contained typed record: a frame category plus a keyed value map.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    frame_type: FrameType,
    entries: BTreeMap<String, Value>,
}

impl Frame {
    /// Create an empty frame of the given category
    pub fn new(frame_type: FrameType) -> Self {
        Self {
            frame_type,
            entries: BTreeMap::new(),
        }
    }

    /// The frame's category
    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    /// Insert a value under a key, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    /// Look up a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Number of entries in the frame
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the frame has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
