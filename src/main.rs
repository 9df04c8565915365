use clap::{Parser, ValueEnum};
use log::{debug, info, LevelFilter};
use rayon::prelude::*;
use std::error::Error;
use std::io::{self, BufWriter, Write};
use bio::io::fastq;

mod clip;
mod io_utils;

use clip::{scan, ClipDecision, RejectReason, ScanParams};
use io_utils::{open_input, open_output, read_primers};

const CHUNK_SIZE: usize = 1024;

#[derive(Parser)]
#[command(author, version, about = "Identify and remove UMI tags from sequence starts")]
struct Args {
    /// Logging verbosity.
    #[arg(long = "verbose", value_enum, default_value_t = Verbosity::Warning)]
    verbose: Verbosity,
    /// Return all sequences, even if no primer was identified.
    #[arg(short = 'a', long = "return-all")]
    return_all: bool,
    /// Length of the UMI sequence.
    #[arg(short = 'n', long = "umi-length", value_name = "n", default_value_t = 6)]
    umi_length: usize,
    /// Maximum offset before the UMI starts.
    #[arg(short = 'o', long = "max-offset", value_name = "n", default_value_t = 0)]
    max_offset: usize,
    /// Maximum permissible primer mismatches.
    #[arg(short = 'm', long = "max-mismatch", value_name = "n", default_value_t = 1)]
    max_mismatch: usize,
    /// Output FASTQ file (.gz and .zst extensions are compressed).
    #[arg(short = 'f', long = "output-fastq", value_name = "path")]
    output_fastq: Option<String>,
    /// Worker threads for scanning.
    #[arg(short = 't', long = "threads", value_name = "n", default_value_t = 4)]
    threads: usize,
    /// Primer FASTA file.
    #[arg(value_name = "primers")]
    input_primers: String,
    /// FASTQ file to process (use '-' for stdin). Supports .gz compressed files.
    #[arg(value_name = "fastq")]
    input_fastq: String,
}

#[derive(ValueEnum, Clone, Copy)]
enum Verbosity {
    Error,
    Warning,
    Info,
    Debug,
}

impl Verbosity {
    fn filter(self) -> LevelFilter {
        match self {
            Verbosity::Error => LevelFilter::Error,
            Verbosity::Warning => LevelFilter::Warn,
            Verbosity::Info => LevelFilter::Info,
            Verbosity::Debug => LevelFilter::Debug,
        }
    }
}

#[derive(Default)]
struct ScanStats {
    total: u64,
    accepted: u64,
    no_primer: u64,
    ambiguous: u64,
    too_short: u64,
}

impl ScanStats {
    fn count_rejection(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::NoPrimerMatch => self.no_primer += 1,
            RejectReason::AmbiguousMatch => self.ambiguous += 1,
            RejectReason::ReadTooShort => self.too_short += 1,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.filter())
        .format_timestamp(None)
        .format_target(false)
        .init();
    run(args)
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let params = ScanParams {
        umi_length: args.umi_length,
        max_offset: args.max_offset,
        max_mismatch: args.max_mismatch,
    };
    info!("using UMI length of {}", params.umi_length);
    info!("using maximum offset of {}", params.max_offset);
    info!("allowing <={} mismatches", params.max_mismatch);
    if args.return_all {
        info!("including unselected sequences");
    } else {
        info!("removing unselected sequences");
    }

    info!("reading primers from \"{}\"", args.input_primers);
    let primers = read_primers(&args.input_primers)?;
    debug!("read {} primers", primers.len());
    for p in &primers {
        debug!("primer {}: {}", p.id, String::from_utf8_lossy(&p.seq));
    }

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()?;

    info!("reading sequences from \"{}\"", args.input_fastq);
    let reader = fastq::Reader::new(open_input(&args.input_fastq)?);

    let mut writer = match &args.output_fastq {
        Some(path) => {
            info!("writing clipped sequences to \"{}\"", path);
            Some(fastq::Writer::new(open_output(path)?))
        }
        None => None,
    };

    let stdout = io::stdout();
    let mut table = BufWriter::new(stdout.lock());

    let mut stats = ScanStats::default();
    let mut chunk: Vec<fastq::Record> = Vec::with_capacity(CHUNK_SIZE);
    for result in reader.records() {
        chunk.push(result?);
        if chunk.len() == CHUNK_SIZE {
            flush_chunk(&chunk, &primers, &params, &args, &mut writer, &mut table, &mut stats)?;
            chunk.clear();
        }
    }
    if !chunk.is_empty() {
        flush_chunk(&chunk, &primers, &params, &args, &mut writer, &mut table, &mut stats)?;
    }

    if let Some(w) = writer.as_mut() {
        w.flush()?;
    }
    table.flush()?;

    info!("processed {} reads", stats.total);
    info!("accepted {} reads", stats.accepted);
    info!("rejected {} reads with no primer match", stats.no_primer);
    info!("rejected {} reads with an ambiguous match", stats.ambiguous);
    info!("rejected {} reads too short to scan", stats.too_short);
    Ok(())
}

/// Scan one chunk of reads in parallel, then consume the decisions in input
/// order: write the clipping table to stdout and, if requested, the clipped
/// (or verbatim, for rejected reads under --return-all) records.
fn flush_chunk(
    chunk: &[fastq::Record],
    primers: &[clip::Primer],
    params: &ScanParams,
    args: &Args,
    writer: &mut Option<fastq::Writer<Box<dyn Write>>>,
    table: &mut impl Write,
    stats: &mut ScanStats,
) -> Result<(), Box<dyn Error>> {
    let decisions: Vec<ClipDecision> = chunk
        .par_iter()
        .map(|rec| scan(primers, rec.seq(), params))
        .collect();

    for (rec, decision) in chunk.iter().zip(decisions) {
        stats.total += 1;
        match decision {
            ClipDecision::Accepted {
                boundary,
                offset,
                primer,
                mismatches,
            } => {
                stats.accepted += 1;
                let umi = &rec.seq()[offset..offset + params.umi_length];
                writeln!(
                    table,
                    "{}\t{}\t{}\t{}\t{}",
                    rec.id(),
                    String::from_utf8_lossy(umi),
                    primers[primer].id,
                    mismatches,
                    offset
                )?;
                if let Some(w) = writer.as_mut() {
                    w.write(rec.id(), rec.desc(), &rec.seq()[boundary..], &rec.qual()[boundary..])?;
                }
            }
            ClipDecision::Rejected(reason) => {
                stats.count_rejection(reason);
                debug!("read {}: {}", rec.id(), reason);
                if args.return_all {
                    if let Some(w) = writer.as_mut() {
                        w.write_record(rec)?;
                    }
                }
            }
        }
    }
    Ok(())
}
