//! Integration tests for the export pipeline
//!
//! These drive the full path from an in-memory TOD to frame files on disk
//! and read the files back to verify layout and content.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::thread;

use tempfile::tempdir;

use todg3::comm::{Comm, PipelineComm, ThreadedComm};
use todg3::export::{layout::bytes_per_sample, Exporter, ExporterConfig};
use todg3::frame::{Frame, FrameFileReader, FrameType, TimestreamUnits};
use todg3::intervals::Interval;
use todg3::noise::NoiseModel;
use todg3::obs::{DistributedData, Observation};
use todg3::tod::{CacheArray, MemoryTod, Scalar};

fn read_frames(path: &Path) -> Vec<Frame> {
    let reader = FrameFileReader::open(path).unwrap();
    reader.map(|f| f.unwrap()).collect()
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// A whole small observation fits one file: one data frame spanning all
/// samples, preceded by the observation and calibration frames.
#[test]
fn test_export_single_file_whole_observation() {
    let dir = tempdir().unwrap();
    let outdir = dir.path().join("exported");

    let tod = MemoryTod::new(1000, &["det_a", "det_b"]);
    let obs = Observation::new("obs_small", Box::new(tod))
        .with_property("site", Scalar::String("atacama".to_string()));

    let exporter = Exporter::new(ExporterConfig::new(&outdir)).unwrap();
    let stats = exporter.export(&DistributedData::solo(vec![obs])).unwrap();

    assert_eq!(stats.observations, 1);
    assert_eq!(stats.files_written, 1);
    assert_eq!(stats.frames_written, 1);

    let obsdir = outdir.join("obs_small");
    assert_eq!(file_names(&obsdir), vec!["so_00000000.g3"]);

    let frames = read_frames(&obsdir.join("so_00000000.g3"));
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].frame_type(), FrameType::Observation);
    assert_eq!(frames[1].frame_type(), FrameType::Calibration);
    assert_eq!(frames[2].frame_type(), FrameType::Scan);

    // observation frame: properties and detector UIDs
    let obs_frame = &frames[0];
    assert_eq!(
        obs_frame.get("site"),
        Some(&todg3::frame::Value::String("atacama".to_string()))
    );
    let uids = obs_frame.get("detector_uid").unwrap().as_map_int().unwrap();
    assert_eq!(uids.get("det_a"), Some(&0));
    assert_eq!(uids.get("det_b"), Some(&1));

    // calibration frame: one offset quaternion per detector
    let offsets = frames[1]
        .get("detector_offset")
        .unwrap()
        .as_map_vector_double()
        .unwrap();
    assert_eq!(offsets.len(), 2);
    assert_eq!(offsets["det_a"].len(), 4);

    // scan frame spans the whole observation
    let scan = &frames[2];
    assert_eq!(scan.get("sample_offset").unwrap().as_int(), Some(0));
    let times = scan.get("times").unwrap().as_vector_double().unwrap();
    assert_eq!(times.len(), 1000);
    assert_eq!(times[0], 0.0);
    assert_eq!(times[999], 999.0 / 200.0);
    let (units, signal) = scan.get("signal").unwrap().as_timestream_map().unwrap();
    assert_eq!(units, TimestreamUnits::None);
    assert_eq!(signal.len(), 2);
    assert_eq!(signal["det_b"][0], 1000.0);
    assert_eq!(signal["det_b"][999], 1999.0);
}

/// Chunk-mode frames [400, 400, 200] against a byte budget that fits two
/// frames per file: greedy grouping puts the first two frames in one file
/// and the trailing frame in a second file at its exact sample offset.
#[test]
fn test_export_chunk_mode_groups_frames_by_byte_budget() {
    let dir = tempdir().unwrap();
    let outdir = dir.path().join("exported");

    let mut tod = MemoryTod::new(1000, &["det_a", "det_b"]);
    tod.set_chunks(vec![400, 400, 200]);

    // two detectors, one stream: 153 bytes per sample
    let sample_bytes = bytes_per_sample(2, 1);
    assert_eq!(sample_bytes, 153);
    let target = 850 * sample_bytes; // fits 800 but not 1000 samples

    let exporter = Exporter::new(ExporterConfig {
        use_tod_chunks: true,
        target_file_size: target,
        ..ExporterConfig::new(&outdir)
    })
    .unwrap();
    let obs = Observation::new("obs_chunks", Box::new(tod));
    let stats = exporter.export(&DistributedData::solo(vec![obs])).unwrap();

    assert_eq!(stats.files_written, 2);
    assert_eq!(stats.frames_written, 3);

    let obsdir = outdir.join("obs_chunks");
    assert_eq!(file_names(&obsdir), vec!["so_00000000.g3", "so_00000800.g3"]);

    // first file: headers plus the 400-sample frames at offsets 0 and 400
    let frames = read_frames(&obsdir.join("so_00000000.g3"));
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[2].get("sample_offset").unwrap().as_int(), Some(0));
    assert_eq!(frames[3].get("sample_offset").unwrap().as_int(), Some(400));
    let times = frames[3].get("times").unwrap().as_vector_double().unwrap();
    assert_eq!(times.len(), 400);
    assert_eq!(times[0], 400.0 / 200.0);

    // second file: headers plus the trailing 200-sample frame
    let frames = read_frames(&obsdir.join("so_00000800.g3"));
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].frame_type(), FrameType::Observation);
    assert_eq!(frames[1].frame_type(), FrameType::Calibration);
    assert_eq!(frames[2].get("sample_offset").unwrap().as_int(), Some(800));
    let times = frames[2].get("times").unwrap().as_vector_double().unwrap();
    assert_eq!(times.len(), 200);
}

/// A smaller byte budget forces every chunk frame into its own file.
#[test]
fn test_export_chunk_mode_one_frame_per_file() {
    let dir = tempdir().unwrap();
    let outdir = dir.path().join("exported");

    let mut tod = MemoryTod::new(1000, &["det_a", "det_b"]);
    tod.set_chunks(vec![400, 400, 200]);

    let target = 450 * bytes_per_sample(2, 1);
    let exporter = Exporter::new(ExporterConfig {
        use_tod_chunks: true,
        target_file_size: target,
        ..ExporterConfig::new(&outdir)
    })
    .unwrap();
    let obs = Observation::new("obs_chunks", Box::new(tod));
    let stats = exporter.export(&DistributedData::solo(vec![obs])).unwrap();

    assert_eq!(stats.files_written, 3);
    assert_eq!(
        file_names(&outdir.join("obs_chunks")),
        vec!["so_00000000.g3", "so_00000400.g3", "so_00000800.g3"]
    );
}

/// Interval-mode frames follow the gap-filling chunk list.
#[test]
fn test_export_interval_mode() {
    let dir = tempdir().unwrap();
    let outdir = dir.path().join("exported");

    let tod = MemoryTod::new(1000, &["det_a"]);
    let intervals = vec![
        Interval { start: 0.0, stop: 1.0, first: 0, last: 399 },
        Interval { start: 3.0, stop: 4.0, first: 600, last: 999 },
    ];
    let obs = Observation::new("obs_iv", Box::new(tod)).with_intervals(intervals);

    let exporter = Exporter::new(ExporterConfig {
        use_intervals: true,
        ..ExporterConfig::new(&outdir)
    })
    .unwrap();
    let stats = exporter.export(&DistributedData::solo(vec![obs])).unwrap();

    // frames [400, 200, 400] all fit one file
    assert_eq!(stats.files_written, 1);
    assert_eq!(stats.frames_written, 3);
    let frames = read_frames(&outdir.join("obs_iv").join("so_00000000.g3"));
    let offsets: Vec<i64> = frames[2..]
        .iter()
        .map(|f| f.get("sample_offset").unwrap().as_int().unwrap())
        .collect();
    assert_eq!(offsets, vec![0, 400, 600]);
}

/// Noise-model entries with non-positive weights are omitted from the
/// per-detector stream lists in the calibration frame.
#[test]
fn test_export_noise_model_drops_nonpositive_weights() {
    let dir = tempdir().unwrap();
    let outdir = dir.path().join("exported");

    let tod = MemoryTod::new(100, &["det_a", "det_b"]);
    let mut noise = NoiseModel::new();
    noise.add_stream("n0", 0, vec![1.0, 2.0], vec![0.5, 0.25]);
    noise.add_stream("n1", 1, vec![1.0, 2.0], vec![0.1, 0.05]);
    noise.set_weight("det_a", "n0", 1.5);
    noise.set_weight("det_a", "n1", 0.0);
    noise.set_weight("det_b", "n0", -2.0);
    noise.set_weight("det_b", "n1", 0.75);

    let obs = Observation::new("obs_noise", Box::new(tod)).with_noise(noise);
    let exporter = Exporter::new(ExporterConfig::new(&outdir)).unwrap();
    exporter.export(&DistributedData::solo(vec![obs])).unwrap();

    let frames = read_frames(&outdir.join("obs_noise").join("so_00000000.g3"));
    let cal = &frames[1];
    assert_eq!(cal.frame_type(), FrameType::Calibration);

    let indices = cal.get("noise_stream_index").unwrap().as_map_int().unwrap();
    assert_eq!(indices.get("n0"), Some(&0));
    assert_eq!(indices.get("n1"), Some(&1));

    let weights = cal
        .get("noise_detector_weights")
        .unwrap()
        .as_map_vector_double()
        .unwrap();
    assert_eq!(weights["det_a"], vec![1.5]);
    assert_eq!(weights["det_b"], vec![0.75]);

    match cal.get("noise_detector_streams").unwrap() {
        todg3::frame::Value::MapVectorInt(streams) => {
            assert_eq!(streams["det_a"], vec![0]);
            assert_eq!(streams["det_b"], vec![1]);
        }
        other => panic!("unexpected value type {}", other.type_name()),
    }
}

/// Requested cache flavors appear in Scan frames with their gathered data;
/// unrequested ones do not.
#[test]
fn test_export_extra_cache_flavors() {
    let dir = tempdir().unwrap();
    let outdir = dir.path().join("exported");

    let mut tod = MemoryTod::new(200, &["det_a"]);
    let corr: Vec<f64> = (0..200).map(|s| s as f64 * 0.5).collect();
    tod.insert_cache("corr_det_a", CacheArray::F64(corr.clone()));
    let mut cuts = vec![0u8; 200];
    cuts[10..20].fill(1);
    tod.insert_cache("cuts_det_a", CacheArray::U8(cuts));
    tod.insert_cache("events_det_a", CacheArray::I32(vec![7; 200]));

    let exporter = Exporter::new(ExporterConfig {
        copy_cache: vec!["corr".to_string(), "cuts".to_string()],
        ..ExporterConfig::new(&outdir)
    })
    .unwrap();
    let obs = Observation::new("obs_flavors", Box::new(tod));
    exporter.export(&DistributedData::solo(vec![obs])).unwrap();

    let frames = read_frames(&outdir.join("obs_flavors").join("so_00000000.g3"));
    let scan = &frames[2];

    let (_, streams) = scan.get("signal_corr").unwrap().as_timestream_map().unwrap();
    assert_eq!(streams["det_a"], corr);

    match scan.get("signal_cuts").unwrap() {
        todg3::frame::Value::MapIntervals(ranges) => {
            assert_eq!(ranges["det_a"], vec![(10, 20)]);
        }
        other => panic!("unexpected value type {}", other.type_name()),
    }

    // "events" was discovered but not requested
    assert!(scan.get("signal_events").is_none());
}

/// The primary signal can be redirected to a cache entry, which also keeps
/// its prefix out of the flavor set.
#[test]
fn test_export_cache_backed_signal() {
    let dir = tempdir().unwrap();
    let outdir = dir.path().join("exported");

    let mut tod = MemoryTod::new(100, &["det_a"]);
    let calibrated: Vec<f64> = (0..100).map(|s| 3.25 * s as f64).collect();
    tod.insert_cache("cal_det_a", CacheArray::F64(calibrated.clone()));

    let exporter = Exporter::new(ExporterConfig {
        signal_cache: Some("cal".to_string()),
        copy_cache: vec!["cal".to_string()],
        units: TimestreamUnits::Kelvin,
        ..ExporterConfig::new(&outdir)
    })
    .unwrap();
    let obs = Observation::new("obs_cal", Box::new(tod));
    exporter.export(&DistributedData::solo(vec![obs])).unwrap();

    let frames = read_frames(&outdir.join("obs_cal").join("so_00000000.g3"));
    let scan = &frames[2];
    let (units, signal) = scan.get("signal").unwrap().as_timestream_map().unwrap();
    assert_eq!(units, TimestreamUnits::Kelvin);
    assert_eq!(signal["det_a"], calibrated);
    // the active signal prefix is never exported as a flavor too
    assert!(scan.get("signal_cal").is_none());
}

/// Two threaded ranks, each holding half the samples, produce bit-identical
/// output to the single-process export.
#[test]
fn test_export_threaded_ranks_match_solo() {
    let dir = tempdir().unwrap();
    let solo_out = dir.path().join("solo");
    let ranks_out = dir.path().join("ranks");

    let mut full = MemoryTod::new(1000, &["det_a", "det_b"]);
    full.set_chunks(vec![400, 400, 200]);
    full.set_common_flags(
        (0..1000).map(|s| u8::from(s % 250 == 0)).collect(),
    );
    full.insert_cache(
        "corr_det_a",
        CacheArray::F64((0..1000).map(|s| s as f64 * 0.25).collect()),
    );
    full.insert_cache(
        "corr_det_b",
        CacheArray::F64((0..1000).map(|s| s as f64 * -0.25).collect()),
    );

    let make_config = |outdir: &Path| ExporterConfig {
        use_tod_chunks: true,
        copy_cache: vec!["corr".to_string()],
        // two frames in the first file, one in the second
        target_file_size: 850 * bytes_per_sample(2, 2),
        ..ExporterConfig::new(outdir)
    };

    // single-process reference run
    let exporter = Exporter::new(make_config(&solo_out)).unwrap();
    let obs = Observation::new("obs_par", Box::new(full.clone()));
    exporter.export(&DistributedData::solo(vec![obs])).unwrap();

    // the same observation split across two threaded ranks; the middle
    // frame [400, 800) straddles the rank boundary at 500
    let handles: Vec<_> = ThreadedComm::group(2)
        .into_iter()
        .enumerate()
        .map(|(rank, endpoint)| {
            let view = full.local_view(rank * 500, 500, 2);
            let config = make_config(&ranks_out);
            thread::spawn(move || {
                let comm = Comm::Threaded(endpoint);
                let pipeline = PipelineComm::new(comm.clone(), comm);
                let obs = Observation::new("obs_par", Box::new(view));
                let exporter = Exporter::new(config).unwrap();
                exporter
                    .export(&DistributedData::new(pipeline, vec![obs]))
                    .unwrap()
            })
        })
        .collect();
    let stats: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // only the designated rank wrote files
    assert_eq!(stats[0].files_written, 2);
    assert_eq!(stats[1].files_written, 0);

    let solo_dir = solo_out.join("obs_par");
    let ranks_dir = ranks_out.join("obs_par");
    assert_eq!(file_names(&solo_dir), file_names(&ranks_dir));
    let mut contents = BTreeMap::new();
    for name in file_names(&solo_dir) {
        let solo_bytes = fs::read(solo_dir.join(&name)).unwrap();
        let rank_bytes = fs::read(ranks_dir.join(&name)).unwrap();
        assert_eq!(solo_bytes, rank_bytes, "file {name} differs");
        contents.insert(name, solo_bytes.len());
    }
    assert_eq!(contents.len(), 2);
}
