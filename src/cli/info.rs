//! Frame-file inspection.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use todg3::frame::{FrameFileReader, Value};

use super::heading;

/// Arguments for the `info` command
#[derive(Args)]
pub struct InfoArgs {
    /// Input frame file path
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Emit machine-readable JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct EntrySummary {
    key: String,
    value_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scalar: Option<String>,
}

#[derive(Serialize)]
struct FrameSummary {
    index: usize,
    frame_type: &'static str,
    entries: Vec<EntrySummary>,
}

/// Display information about a frame file
pub fn run(args: &InfoArgs) -> Result<()> {
    if !args.file.exists() {
        anyhow::bail!("File does not exist: {}", args.file.display());
    }

    let reader = FrameFileReader::open(&args.file).context("Failed to open frame file")?;
    let mut summaries = Vec::new();
    for (index, frame) in reader.enumerate() {
        let frame = frame.with_context(|| format!("Failed to read frame {index}"))?;
        let entries = frame
            .iter()
            .map(|(key, value)| EntrySummary {
                key: key.to_string(),
                value_type: value.type_name(),
                len: value_len(value),
                scalar: scalar_repr(value),
            })
            .collect();
        summaries.push(FrameSummary {
            index,
            frame_type: frame.frame_type().name(),
            entries,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!("{}", heading("Frame File Information"));
    println!("File: {}", args.file.display());
    println!("Frames: {}", summaries.len());
    println!();
    for summary in &summaries {
        println!(
            "Frame {}: {} ({} entries)",
            summary.index,
            summary.frame_type,
            summary.entries.len()
        );
        for entry in &summary.entries {
            match (&entry.scalar, entry.len) {
                (Some(scalar), _) => {
                    println!("  {}: {} = {}", entry.key, entry.value_type, scalar)
                }
                (None, Some(len)) => {
                    println!("  {}: {} [{}]", entry.key, entry.value_type, len)
                }
                (None, None) => println!("  {}: {}", entry.key, entry.value_type),
            }
        }
        println!();
    }
    Ok(())
}

/// Element or entry count of container values
fn value_len(value: &Value) -> Option<usize> {
    match value {
        Value::VectorInt(v) => Some(v.len()),
        Value::VectorDouble(v) => Some(v.len()),
        Value::MapInt(m) => Some(m.len()),
        Value::MapVectorInt(m) => Some(m.len()),
        Value::MapVectorDouble(m) => Some(m.len()),
        Value::Timestream { samples, .. } => Some(samples.len()),
        Value::TimestreamMap { streams, .. } => Some(streams.len()),
        Value::Intervals(v) => Some(v.len()),
        Value::MapIntervals(m) => Some(m.len()),
        _ => None,
    }
}

/// Printable form of scalar values
fn scalar_repr(value: &Value) -> Option<String> {
    match value {
        Value::Bool(v) => Some(v.to_string()),
        Value::Int(v) => Some(v.to_string()),
        Value::Double(v) => Some(format!("{v:.6}")),
        Value::String(v) => Some(format!("{v:?}")),
        _ => None,
    }
}
