use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mutload::bam_reader::{PileupSource, Region};
use mutload::output::{write_load_series, VariantTableWriter};
use mutload::pileup::call_column;
use mutload::reference::FastaReference;
use mutload::types::{CallerConfig, WindowConfig};
use mutload::{loader, scoring};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mutload")]
#[command(version)]
#[command(about = "Sliding-window mutation load from aligned reads", long_about = None)]
struct Cli {
    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Call per-position allele frequencies from a sorted, indexed BAM
    Call {
        /// Input BAM file (coordinate-sorted, with a .bai index)
        #[arg(short, long)]
        bam: PathBuf,

        /// Reference FASTA (with a .fai index)
        #[arg(short, long)]
        reference: PathBuf,

        /// Output variant table (TSV)
        #[arg(short, long)]
        output: PathBuf,

        /// Restrict calling to a region: chrom or chrom:start-end
        #[arg(long)]
        region: Option<Region>,

        /// Minimum reads passing MAPQ to evaluate a position
        #[arg(long, default_value = "20")]
        min_coverage: u32,

        /// Minimum alternate reads to emit a record
        #[arg(long, default_value = "5")]
        min_alt_reads: u32,

        /// Discard reads with MAPQ below this
        #[arg(long, default_value = "50")]
        mapq_threshold: u8,
    },

    /// Score sliding-window mutation load over an interval of one chromosome
    Score {
        /// Input variant table (TSV/CSV; header names are reconciled)
        #[arg(short, long)]
        table: PathBuf,

        /// Chromosome to score
        #[arg(short, long)]
        chrom: String,

        /// Interval start (1-based, inclusive)
        #[arg(long)]
        start: u64,

        /// Interval end (inclusive)
        #[arg(long)]
        end: u64,

        /// Output load series (TSV)
        #[arg(short, long)]
        output: PathBuf,

        /// Window width in bases
        #[arg(long, default_value = "30")]
        bin_size: u64,

        /// Ignore records with allele frequency above this
        #[arg(long, default_value = "0.35")]
        max_alt_freq: f64,

        /// Windows with fewer qualifying records score zero
        #[arg(long, default_value = "0")]
        min_events: usize,

        /// Number of threads for parallel scoring
        #[arg(long, default_value_t = num_cpus())]
        threads: usize,
    },
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

macro_rules! progress {
    ($quiet:expr) => {
        if !$quiet {
            eprintln!();
        }
    };
    ($quiet:expr, $($arg:tt)*) => {
        if !$quiet {
            eprintln!($($arg)*);
        }
    };
}

fn make_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("  {spinner} [{elapsed_precise}] {pos} {msg}")
            .unwrap(),
    );
    pb
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let quiet = cli.quiet;

    match cli.command {
        Command::Call {
            bam,
            reference,
            output,
            region,
            min_coverage,
            min_alt_reads,
            mapq_threshold,
        } => {
            let config = CallerConfig {
                min_coverage,
                min_alt_reads,
                mapq_threshold,
            };
            run_call(&bam, &reference, &output, region.as_ref(), config, quiet)
        }
        Command::Score {
            table,
            chrom,
            start,
            end,
            output,
            bin_size,
            max_alt_freq,
            min_events,
            threads,
        } => {
            let config = WindowConfig {
                bin_size,
                max_alt_freq,
                min_events,
            };
            run_score(&table, &chrom, start, end, &output, config, threads, quiet)
        }
    }
}

fn run_call(
    bam: &Path,
    reference: &Path,
    output: &Path,
    region: Option<&Region>,
    config: CallerConfig,
    quiet: bool,
) -> Result<()> {
    if !bam.exists() {
        anyhow::bail!("BAM file not found: {}", bam.display());
    }

    progress!(quiet, "Mutation Load Variant Caller");
    progress!(quiet, "=========================================");
    progress!(quiet, "Input BAM: {}", bam.display());
    progress!(quiet, "Reference: {}", reference.display());
    progress!(quiet, "Output table: {}", output.display());
    match region {
        Some(region) => progress!(quiet, "Region: {}", region),
        None => progress!(quiet, "Region: whole file"),
    }
    progress!(quiet, "Min coverage: {}", config.min_coverage);
    progress!(quiet, "Min alt reads: {}", config.min_alt_reads);
    progress!(quiet, "MAPQ threshold: {}", config.mapq_threshold);
    progress!(quiet);

    progress!(quiet, "Step 1: Opening reference and alignments...");
    let mut assembly = FastaReference::open(reference)?;
    progress!(quiet, "  {} contigs in assembly", assembly.n_contigs());
    let mut source = PileupSource::open(bam)
        .with_context(|| format!("Failed to open BAM file: {}", bam.display()))?;

    progress!(quiet);
    progress!(quiet, "Step 2: Scanning pileup columns...");
    let pb = make_spinner(quiet);
    pb.set_message("variant records written");

    let mut writer = VariantTableWriter::create(output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    let mut scanned: u64 = 0;
    let mut written: u64 = 0;
    for column in source.columns(region)? {
        let column = column?;
        scanned += 1;
        if let Some(record) = call_column(&column, &mut assembly, &config)? {
            writer.write(&record)?;
            written += 1;
            pb.inc(1);
        }
    }
    writer.finish()?;
    pb.finish_and_clear();

    progress!(quiet, "  {} covered positions scanned", scanned);
    progress!(quiet, "  {} variant records written", written);
    progress!(quiet);
    progress!(quiet, "Done! Variant table written to: {}", output.display());

    Ok(())
}

fn run_score(
    table: &Path,
    chrom: &str,
    start: u64,
    end: u64,
    output: &Path,
    config: WindowConfig,
    threads: usize,
    quiet: bool,
) -> Result<()> {
    if !table.exists() {
        anyhow::bail!("Variant table not found: {}", table.display());
    }
    if config.bin_size == 0 {
        anyhow::bail!("--bin-size must be at least 1");
    }
    if !(0.0..=1.0).contains(&config.max_alt_freq) {
        anyhow::bail!(
            "Invalid --max-alt-freq {}; must be within [0, 1]",
            config.max_alt_freq
        );
    }

    // Configure rayon thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .unwrap();

    progress!(quiet, "Mutation Load Scorer");
    progress!(quiet, "=========================================");
    progress!(quiet, "Variant table: {}", table.display());
    progress!(quiet, "Interval: {}:{}-{}", chrom, start, end);
    progress!(quiet, "Output series: {}", output.display());
    progress!(quiet, "Bin size: {} bp", config.bin_size);
    progress!(quiet, "Max alt freq: {}", config.max_alt_freq);
    progress!(quiet, "Min events: {}", config.min_events);
    progress!(quiet, "Threads: {}", threads);
    progress!(quiet);

    progress!(quiet, "Step 1: Loading variant table...");
    let bytes = std::fs::read(table)
        .with_context(|| format!("Failed to read variant table: {}", table.display()))?;
    let records = loader::load_variant_table(&bytes)?;
    let on_chrom = records.iter().filter(|r| r.chrom == chrom).count();
    progress!(quiet, "  {} records loaded ({} on {})", records.len(), on_chrom, chrom);

    progress!(quiet);
    progress!(quiet, "Step 2: Scoring windows...");
    let series = scoring::score_windows(&records, chrom, start, end, &config)?;
    progress!(quiet, "  {} windows scored", series.len());

    progress!(quiet);
    progress!(quiet, "Step 3: Writing load series...");
    write_load_series(chrom, &series, output)?;

    progress!(quiet);
    progress!(quiet, "Done! Load series written to: {}", output.display());

    Ok(())
}
