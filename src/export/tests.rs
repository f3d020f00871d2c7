use super::flavors::discover_flavors;
use super::*;

use crate::intervals::Interval;
use crate::obs::{DistributedData, Observation};
use crate::tod::{CacheArray, MemoryTod};

fn tod_with_cache() -> MemoryTod {
    let mut tod = MemoryTod::new(64, &["d0", "d1"]);
    tod.insert_cache("corr_d0", CacheArray::F64(vec![0.0; 64]));
    tod.insert_cache("corr_d1", CacheArray::F64(vec![0.0; 64]));
    tod.insert_cache("events_d0", CacheArray::I32(vec![0; 64]));
    tod.insert_cache("cuts_d1", CacheArray::U8(vec![0; 64]));
    // suffix is not a detector name: never a flavor
    tod.insert_cache("corr_template", CacheArray::F64(vec![0.0; 64]));
    tod
}

#[test]
fn test_conflicting_distribution_modes_rejected_at_construction() {
    let config = ExporterConfig {
        use_tod_chunks: true,
        use_intervals: true,
        ..ExporterConfig::new("unused")
    };
    assert!(matches!(Exporter::new(config), Err(ExportError::Config(_))));
}

#[test]
fn test_interval_mode_fails_during_export_not_before() {
    let dir = tempfile::tempdir().unwrap();
    let config = ExporterConfig {
        use_intervals: true,
        ..ExporterConfig::new(dir.path().join("out"))
    };
    // Construction succeeds; the missing intervals only surface on export.
    let exporter = Exporter::new(config).unwrap();

    let obs = Observation::new("obs_no_iv", Box::new(MemoryTod::new(100, &["d0"])));
    let data = DistributedData::solo(vec![obs]);
    let err = exporter.export(&data).unwrap_err();
    assert!(matches!(err, ExportError::MissingIntervals(name) if name == "obs_no_iv"));
}

#[test]
fn test_frame_sizes_sum_to_nsamp_in_all_modes() {
    let dir = tempfile::tempdir().unwrap();

    let mut tod = MemoryTod::new(1000, &["d0"]);
    tod.set_chunks(vec![400, 400, 200]);
    let intervals = vec![
        Interval { start: 0.0, stop: 1.0, first: 0, last: 249 },
        Interval { start: 2.0, stop: 3.0, first: 500, last: 749 },
    ];

    for (use_tod_chunks, use_intervals, expect) in [
        (false, false, vec![1000]),
        (true, false, vec![400, 400, 200]),
        (false, true, vec![250, 250, 250, 250]),
    ] {
        let config = ExporterConfig {
            use_tod_chunks,
            use_intervals,
            ..ExporterConfig::new(dir.path())
        };
        let exporter = Exporter::new(config).unwrap();
        let obs = Observation::new("obs", Box::new(tod.clone())).with_intervals(intervals.clone());
        let sizes = exporter.frame_sizes(&obs).unwrap();
        assert_eq!(sizes, expect);
        assert_eq!(sizes.iter().sum::<usize>(), 1000);
    }
}

#[test]
fn test_chunk_mode_rejects_undersized_chunklist() {
    let dir = tempfile::tempdir().unwrap();
    let mut tod = MemoryTod::new(1000, &["d0"]);
    tod.set_chunks(vec![400, 400]);

    let config = ExporterConfig {
        use_tod_chunks: true,
        ..ExporterConfig::new(dir.path())
    };
    let exporter = Exporter::new(config).unwrap();
    let obs = Observation::new("obs", Box::new(tod));
    let err = exporter.frame_sizes(&obs).unwrap_err();
    assert!(matches!(
        err,
        ExportError::FrameSizeMismatch { got: 800, expected: 1000 }
    ));
}

#[test]
fn test_flavor_discovery_classifies_by_dtype() {
    let tod = tod_with_cache();
    let include = vec!["corr".to_string(), "events".to_string(), "cuts".to_string()];
    let flavors = discover_flavors(&tod, &[], &include, false);
    assert_eq!(flavors.len(), 3);
    assert_eq!(flavors[0], Flavor { prefix: "corr".into(), kind: FlavorKind::Timestream });
    assert_eq!(flavors[1], Flavor { prefix: "cuts".into(), kind: FlavorKind::IntervalMask });
    assert_eq!(flavors[2], Flavor { prefix: "events".into(), kind: FlavorKind::VectorInt });
}

#[test]
fn test_flavor_discovery_first_entry_wins() {
    let mut tod = tod_with_cache();
    // Same prefix, conflicting dtype on a later (name-ordered) entry: the
    // first classification sticks.
    tod.insert_cache("corr_d1", CacheArray::I32(vec![0; 64]));
    let flavors = discover_flavors(&tod, &[], &["corr".to_string()], false);
    assert_eq!(flavors.len(), 1);
    assert_eq!(flavors[0].kind, FlavorKind::Timestream);
}

#[test]
fn test_flavor_discovery_respects_inclusion_list() {
    let tod = tod_with_cache();
    assert!(discover_flavors(&tod, &[], &[], false).is_empty());
    let flavors = discover_flavors(&tod, &[], &["events".to_string()], false);
    assert_eq!(flavors.len(), 1);
    assert_eq!(flavors[0].prefix, "events");
}

#[test]
fn test_flavor_discovery_excludes_active_primary_prefixes() {
    let tod = tod_with_cache();
    let include = vec!["corr".to_string(), "events".to_string()];
    let flavors = discover_flavors(&tod, &["corr"], &include, false);
    assert_eq!(flavors.len(), 1);
    assert_eq!(flavors[0].prefix, "events");
}

#[test]
fn test_flavor_frame_field_name() {
    let flavor = Flavor { prefix: "corr".into(), kind: FlavorKind::Timestream };
    assert_eq!(flavor.frame_field(), "signal_corr");
}

#[test]
fn test_export_stats_display() {
    let stats = ExportStats {
        observations: 1,
        files_written: 2,
        frames_written: 3,
        bytes_written: 4096,
    };
    assert_eq!(
        stats.to_string(),
        "exported 1 observation(s): 2 file(s), 3 data frame(s), 4096 bytes"
    );
}
