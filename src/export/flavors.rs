//! Discovery of extra per-detector cache "flavors".
//!
//! A cache entry named `<prefix>_<det>`, where `<det>` is a known detector,
//! marks an extra signal flavor. The element type of the first matching
//! entry fixes the flavor's classification; later entries with the same
//! prefix never reclassify it.

use std::collections::{BTreeMap, BTreeSet};

use log::info;

use crate::tod::{Dtype, Tod};

/// Value classification of a discovered flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlavorKind {
    /// 64-bit floating point, exported as a timestream map
    Timestream,
    /// 32-bit signed integer, exported as an integer-vector map
    VectorInt,
    /// 8-bit unsigned integer, exported as per-detector interval lists
    IntervalMask,
}

impl FlavorKind {
    fn from_dtype(dtype: Dtype) -> Self {
        match dtype {
            Dtype::F64 => FlavorKind::Timestream,
            Dtype::I32 => FlavorKind::VectorInt,
            Dtype::U8 => FlavorKind::IntervalMask,
        }
    }

    /// The cache element type this classification expects
    pub fn dtype(self) -> Dtype {
        match self {
            FlavorKind::Timestream => Dtype::F64,
            FlavorKind::VectorInt => Dtype::I32,
            FlavorKind::IntervalMask => Dtype::U8,
        }
    }
}

/// An extra per-detector stream exported alongside the primary signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flavor {
    /// Cache-name prefix identifying the flavor
    pub prefix: String,
    /// Value classification derived from the cache element type
    pub kind: FlavorKind,
}

impl Flavor {
    /// Key under which the flavor appears in Scan frames
    pub fn frame_field(&self) -> String {
        format!("signal_{}", self.prefix)
    }
}

/// Scan the TOD cache for extra flavors and select the requested ones.
///
/// `exclude` holds the active primary signal/flag cache prefixes, which are
/// handled by the primary export path and never treated as flavors.
/// `include` is the caller's inclusion list; an empty list selects nothing.
/// When `announce` is set (designated rank only) the selection is logged.
pub(crate) fn discover_flavors(
    tod: &dyn Tod,
    exclude: &[&str],
    include: &[String],
    announce: bool,
) -> Vec<Flavor> {
    let detnames: BTreeSet<String> = tod.detectors().into_iter().collect();

    let mut kinds: BTreeMap<String, FlavorKind> = BTreeMap::new();
    for name in tod.cache().keys() {
        let Some((prefix, det)) = name.split_once('_') else {
            continue;
        };
        if !detnames.contains(det) || kinds.contains_key(prefix) {
            continue;
        }
        if let Some(array) = tod.cache().reference(name) {
            kinds.insert(prefix.to_string(), FlavorKind::from_dtype(array.dtype()));
        }
    }

    for prefix in exclude {
        kinds.remove(*prefix);
    }

    let selected: Vec<Flavor> = kinds
        .into_iter()
        .filter(|(prefix, _)| include.iter().any(|want| want == prefix))
        .map(|(prefix, kind)| Flavor { prefix, kind })
        .collect();

    if announce && !selected.is_empty() {
        let names: Vec<&str> = selected.iter().map(|f| f.prefix.as_str()).collect();
        info!("found {} extra TOD flavors: {:?}", selected.len(), names);
    }

    selected
}
