//! Synthetic observation generator for exercising the exporter.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use log::info;

use todg3::export::{Exporter, ExporterConfig};
use todg3::intervals::Interval;
use todg3::noise::NoiseModel;
use todg3::obs::{DistributedData, Observation};
use todg3::tod::{CacheArray, MemoryTod, Scalar};

use super::config::Config;
use super::heading;

/// Arguments for the `demo` command
#[derive(Args)]
pub struct DemoArgs {
    /// Output directory for the exported observation
    #[arg(value_name = "OUTDIR")]
    pub outdir: PathBuf,

    /// Observation name (becomes the output subdirectory)
    #[arg(long, default_value = "obs_demo")]
    pub name: String,

    /// File name prefix for each frame file
    #[arg(long)]
    pub prefix: Option<String>,

    /// Number of samples to generate
    #[arg(long, default_value_t = 100_000)]
    pub samples: usize,

    /// Number of detectors to generate
    #[arg(long, default_value_t = 4)]
    pub detectors: usize,

    /// Number of chunks the sample axis is split into
    #[arg(long, default_value_t = 10)]
    pub chunks: usize,

    /// Distribute frames by the TOD chunking
    #[arg(long)]
    pub use_chunks: bool,

    /// Distribute frames by generated scan intervals
    #[arg(long)]
    pub use_intervals: bool,

    /// Target frame-file size in bytes
    #[arg(long)]
    pub file_size: Option<usize>,

    /// Extra cache flavor to export (repeatable)
    #[arg(long = "flavor", value_name = "PREFIX")]
    pub flavors: Vec<String>,
}

/// Generate a synthetic observation and export it
pub fn run(args: &DemoArgs, config: Option<&Config>) -> Result<()> {
    let file_defaults = config.map(|c| &c.export);
    let prefix = args
        .prefix
        .clone()
        .or_else(|| file_defaults.and_then(|d| d.prefix.clone()))
        .unwrap_or_else(|| "so".to_string());
    let target_file_size = args
        .file_size
        .or_else(|| file_defaults.and_then(|d| d.target_file_size))
        .unwrap_or(500_000_000);
    let use_chunks =
        args.use_chunks || file_defaults.and_then(|d| d.use_chunks).unwrap_or(false);
    let use_intervals =
        args.use_intervals || file_defaults.and_then(|d| d.use_intervals).unwrap_or(false);
    let mut copy_cache = args.flavors.clone();
    if copy_cache.is_empty() {
        if let Some(flavors) = file_defaults.and_then(|d| d.flavors.clone()) {
            copy_cache = flavors;
        }
    }

    info!("generating {} samples for {} detectors", args.samples, args.detectors);
    let observation = synthetic_observation(&args.name, args.samples, args.detectors, args.chunks);

    let exporter = Exporter::new(ExporterConfig {
        prefix,
        use_tod_chunks: use_chunks,
        use_intervals,
        copy_cache,
        target_file_size,
        ..ExporterConfig::new(&args.outdir)
    })
    .context("Invalid export configuration")?;

    let data = DistributedData::solo(vec![observation]);
    let stats = exporter.export(&data).context("Export failed")?;

    println!("{}", heading("Export complete"));
    println!("  Output:      {}", args.outdir.join(&args.name).display());
    println!("  Files:       {}", stats.files_written);
    println!("  Data frames: {}", stats.frames_written);
    println!(
        "  Total size:  {} bytes ({:.2} MB)",
        stats.bytes_written,
        stats.bytes_written as f64 / 1024.0 / 1024.0
    );
    Ok(())
}

/// Build a deterministic synthetic observation: sinusoidal detector
/// signals, a handful of flagged samples, extra cache flavors, scan
/// intervals, and a white-ish noise model per detector.
fn synthetic_observation(name: &str, nsamp: usize, ndet: usize, nchunk: usize) -> Observation {
    let det_names: Vec<String> = (0..ndet).map(|i| format!("det_{i:03}")).collect();
    let det_refs: Vec<&str> = det_names.iter().map(String::as_str).collect();
    let mut tod = MemoryTod::new(nsamp, &det_refs);

    tod.set_chunks(split_into_chunks(nsamp, nchunk));

    for (i, det) in det_names.iter().enumerate() {
        let freq = 0.1 + 0.05 * i as f64;
        let signal: Vec<f64> = (0..nsamp)
            .map(|s| {
                let t = s as f64 / 200.0;
                (2.0 * std::f64::consts::PI * freq * t).sin()
            })
            .collect();
        tod.set_signal(det, signal);

        // a short glitch flag run per detector
        let mut flags = vec![0u8; nsamp];
        let glitch = (i + 1) * nsamp / (ndet + 1);
        for flag in flags.iter_mut().skip(glitch).take(16.min(nsamp - glitch)) {
            *flag = 1;
        }
        tod.set_flags(det, flags);

        // extra flavors: a correlated template, an event counter, a cut mask
        let corr: Vec<f64> = (0..nsamp)
            .map(|s| ((s as f64 / 200.0) * 0.01).cos())
            .collect();
        tod.insert_cache(format!("corr_{det}"), CacheArray::F64(corr));
        let events: Vec<i32> = (0..nsamp).map(|s| i32::from(s % 1000 == 0)).collect();
        tod.insert_cache(format!("events_{det}"), CacheArray::I32(events));
        let cuts: Vec<u8> = (0..nsamp).map(|s| u8::from(s % 97 == 0)).collect();
        tod.insert_cache(format!("cuts_{det}"), CacheArray::U8(cuts));
    }

    tod.set_meta("telescope", Scalar::String("LAT".to_string()));
    tod.set_meta("sample_rate_hz", Scalar::Double(200.0));

    let mut noise = NoiseModel::new();
    for (i, det) in det_names.iter().enumerate() {
        let key = format!("noise_{det}");
        let freq: Vec<f64> = (1..=32).map(|k| k as f64 * 100.0 / 32.0).collect();
        let psd: Vec<f64> = freq.iter().map(|f| 1.0 + 0.1 / f).collect();
        noise.add_stream(&key, i as i64, freq, psd);
        noise.set_weight(det, &key, 1.0);
    }

    let start = chrono::Utc::now();
    Observation::new(name, Box::new(tod))
        .with_property("site", Scalar::String("atacama".to_string()))
        .with_property("start_time", Scalar::Double(start.timestamp() as f64))
        .with_property("start_time_iso", Scalar::String(start.to_rfc3339()))
        .with_property("simulated", Scalar::Bool(true))
        .with_intervals(scan_intervals(nsamp))
        .with_noise(noise)
}

/// Split `nsamp` samples into `nchunk` nearly equal chunks
fn split_into_chunks(nsamp: usize, nchunk: usize) -> Vec<usize> {
    let nchunk = nchunk.max(1);
    let base = nsamp / nchunk;
    let extra = nsamp % nchunk;
    (0..nchunk)
        .map(|i| base + usize::from(i < extra))
        .filter(|&n| n > 0)
        .collect()
}

/// Left/right scan intervals with short turnaround gaps between them
fn scan_intervals(nsamp: usize) -> Vec<Interval> {
    let scan = (nsamp / 8).max(1);
    let gap = (scan / 10).max(1);
    let mut intervals = Vec::new();
    let mut first = 0usize;
    while first + scan <= nsamp {
        let last = first + scan - 1;
        intervals.push(Interval {
            start: first as f64 / 200.0,
            stop: last as f64 / 200.0,
            first,
            last,
        });
        first = last + 1 + gap;
    }
    intervals
}
