//! Implementation of the `individuals process` subcommand.
//!
//! Partitions the data lines of one variant file across a static group of
//! workers, classifies every individual's genotype against the per-variant
//! allele frequency, and merges all contributions at the aggregator (the
//! highest-ranked group member). Optionally materializes the merged result
//! as one output file per individual plus a JSON report.

pub mod aggregate;
pub mod classify;
pub mod header;
pub mod record;
pub mod transport;
pub mod worker;

use std::io::Write as _;
use std::path::Path;

use itertools::Itertools;

use crate::common::{self, io::open_write_maybe_gz};
use crate::err::Error;
use aggregate::MergedResult;
use header::ColumnIndex;
use transport::{channel_group, Role, Transport as _};
use worker::LineRange;

/// Command line arguments for `individuals process` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "partition, filter and gather per-individual variants", long_about = None)]
pub struct Args {
    /// Path to input variant file (tab-separated text, plain or .gz).
    #[clap(long)]
    pub path_in: String,
    /// Path to the columns file holding the header line.
    #[clap(long)]
    pub path_columns: String,
    /// Chromosome label, used for naming outputs only.
    #[clap(long)]
    pub chromosome: String,
    /// First data line to process (1-based, inclusive).
    #[clap(long, default_value_t = 1)]
    pub start: usize,
    /// Last data line to process (1-based, inclusive).
    #[clap(long)]
    pub stop: usize,
    /// Total number of data lines, as determined by the orchestration
    /// layer.
    #[clap(long)]
    pub total: usize,
    /// Number of workers in the process group (the aggregator comes on
    /// top).
    #[clap(long, default_value_t = 2)]
    pub num_workers: usize,
    /// Directory to write one output file per individual into.
    #[clap(long)]
    pub path_out: Option<String>,
    /// Optional path for a JSON report of identifiers and counts.
    #[clap(long)]
    pub path_report: Option<String>,
}

/// Run the whole group in-process: one thread per member, roles assigned
/// once from static rank.
pub fn process_group(
    path_in: &str,
    columns: &ColumnIndex,
    chromosome: &str,
    range: LineRange,
    num_workers: usize,
) -> Result<MergedResult, Error> {
    let group_size = num_workers + 1;
    let subranges = range.split(num_workers);
    let endpoints = channel_group(group_size);

    std::thread::scope(|scope| {
        let mut members = Vec::with_capacity(group_size);
        for endpoint in endpoints {
            let rank = endpoint.rank();
            let role = Role::of(rank, group_size);
            let subrange = subranges.get(rank).copied();
            tracing::debug!("rank {} takes role {}", rank, role);
            members.push(scope.spawn(move || match role {
                Role::Worker => {
                    let subrange = subrange.expect("every worker rank has a subrange");
                    worker::run_worker(&endpoint, path_in, columns, chromosome, subrange)
                        .map(|_| None)
                }
                Role::Aggregator => aggregate::gather(&endpoint).map(Some),
            }));
        }

        let mut merged = None;
        let mut first_error = None;
        for member in members {
            match member.join() {
                Ok(Ok(Some(result))) => merged = Some(result),
                Ok(Ok(None)) => (),
                Ok(Err(error)) => {
                    tracing::error!("group member failed: {}", error);
                    first_error.get_or_insert(error);
                }
                Err(_) => tracing::error!("group member panicked"),
            }
        }

        match (merged, first_error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Err(Error::IncompleteAggregation {
                rank: 0,
                received: 0,
                expected: num_workers,
            }),
        }
    })
}

/// Write one file per individual under `path_out`: the individual's kept
/// records across all workers in rank order, five tab-joined fields per
/// line.
fn write_outputs(merged: &MergedResult, path_out: &str) -> Result<(), anyhow::Error> {
    std::fs::create_dir_all(path_out)?;
    // every worker reports the same identifier list, one entry per
    // individual in column order
    let identifiers: Vec<&String> = merged.identifiers.iter().unique().collect();
    for (individual, identifier) in identifiers.iter().enumerate() {
        let path = Path::new(path_out).join(identifier.as_str());
        let mut writer = open_write_maybe_gz(&path)
            .map_err(|e| anyhow::anyhow!("could not open output file {:?}: {}", path, e))?;
        for records in &merged.contributions {
            for core in records.get(&individual).into_iter().flatten() {
                writer.write_all(core.fields().join("\t").as_bytes())?;
                writer.write_all(b"\n")?;
            }
        }
        writer.flush()?;
    }
    Ok(())
}

/// JSON report of the merged identifiers and counts.
#[derive(Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Report {
    /// One identifier per individual per worker, in rank order.
    pub identifiers: Vec<String>,
    /// Kept-record count parallel to `identifiers`.
    pub counts: Vec<usize>,
}

fn write_report(merged: &MergedResult, path_report: &str) -> Result<(), anyhow::Error> {
    let report = Report {
        identifiers: merged.identifiers.clone(),
        counts: merged.counts.clone(),
    };
    let mut writer = open_write_maybe_gz(path_report)
        .map_err(|e| anyhow::anyhow!("could not open report file {}: {}", path_report, e))?;
    writer.write_all(serde_json::to_string_pretty(&report)?.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Main entry point for `individuals process` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = std::time::Instant::now();
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    if args.num_workers == 0 {
        anyhow::bail!("process group needs at least one worker");
    }

    tracing::info!("loading columns file...");
    let columns = ColumnIndex::load(&args.path_columns)?;
    tracing::info!("... {} individuals addressable", columns.individual_count());

    let range = LineRange {
        start: args.start,
        stop: args.stop,
        total: args.total,
    };
    tracing::info!(
        "starting group of {} workers on lines {}..={}...",
        args.num_workers,
        range.start,
        range.stop.min(range.total)
    );
    let merged = process_group(
        &args.path_in,
        &columns,
        &args.chromosome,
        range,
        args.num_workers,
    )?;
    tracing::info!("... group done");

    common::trace_rss_now();

    if let Some(path_out) = &args.path_out {
        tracing::info!("writing per-individual outputs to {}...", path_out);
        write_outputs(&merged, path_out)?;
    }
    if let Some(path_report) = &args.path_report {
        tracing::info!("writing report to {}...", path_report);
        write_report(&merged, path_report)?;
    }

    tracing::info!(
        "All of `individuals process` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}
