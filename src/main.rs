//! packmangle CLI - pack, mangle and extract obfuscated content archives.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use memmap2::Mmap;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use packmangle::{Directory, ExtractReport, ScanMode};

/// packmangle - content archives only the matching reader can unpack
#[derive(Parser)]
#[command(name = "packmangle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a directory into a well-formed archive
    Pack {
        /// Directory to pack
        #[arg(short, long, env = "INPUT_FOLDER")]
        input: PathBuf,

        /// Output archive
        #[arg(short, long, env = "OUTPUT_ARCHIVE")]
        output: PathBuf,
    },

    /// Mangle a well-formed archive
    Mangle {
        /// Well-formed input archive
        #[arg(short, long, env = "INPUT_ARCHIVE")]
        input: PathBuf,

        /// Mangled output file
        #[arg(short, long, env = "OUTPUT_ARCHIVE")]
        output: PathBuf,

        /// Trailing archive comment
        #[arg(short, long)]
        comment: Option<String>,
    },

    /// Pack a directory and mangle the result in one step
    Build {
        /// Directory to pack
        #[arg(short, long, env = "INPUT_FOLDER")]
        input: PathBuf,

        /// Mangled output file
        #[arg(short, long, env = "OUTPUT_ARCHIVE")]
        output: PathBuf,

        /// Trailing archive comment
        #[arg(short, long)]
        comment: Option<String>,
    },

    /// Extract a mangled archive
    Extract {
        /// Mangled input archive
        #[arg(short, long, env = "INPUT_ARCHIVE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        output: PathBuf,

        /// Trust recorded offsets (well-formed archives)
        #[arg(long)]
        strict: bool,
    },

    /// List the directory of an archive
    List {
        /// Input archive
        #[arg(short, long, env = "INPUT_ARCHIVE")]
        input: PathBuf,

        /// Trust recorded offsets (well-formed archives)
        #[arg(long)]
        strict: bool,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Pack { input, output } => cmd_pack(&input, &output)?,
        Commands::Mangle { input, output, comment } => {
            cmd_mangle(&input, &output, comment.as_deref())?;
        }
        Commands::Build { input, output, comment } => {
            cmd_build(&input, &output, comment.as_deref())?;
        }
        Commands::Extract { input, output, strict } => {
            cmd_extract(&input, &output, scan_mode(strict))?;
        }
        Commands::List { input, strict, detailed } => {
            cmd_list(&input, scan_mode(strict), detailed)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn scan_mode(strict: bool) -> ScanMode {
    if strict {
        ScanMode::Strict
    } else {
        ScanMode::Tolerant
    }
}

fn map_input(path: &Path) -> Result<Mmap> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    // The input is only read, and only for the duration of one command.
    let mmap = unsafe { Mmap::map(&file) }.context("Failed to map input file")?;
    Ok(mmap)
}

fn cmd_pack(input: &Path, output: &Path) -> Result<()> {
    let start = Instant::now();
    let archive = packmangle::pack_directory(input).context("Failed to pack directory")?;
    fs::write(output, &archive).context("Failed to write output file")?;

    info!(
        "Packed {} into {} ({} bytes) in {:?}",
        input.display(),
        output.display(),
        archive.len(),
        start.elapsed()
    );

    Ok(())
}

fn cmd_mangle(input: &Path, output: &Path, comment: Option<&str>) -> Result<()> {
    let data = map_input(input)?;
    let mangled = packmangle::mangle(&data, comment.map(str::as_bytes))
        .context("Failed to mangle archive")?;
    fs::write(output, &mangled).context("Failed to write output file")?;

    info!("Mangled {} -> {} ({} bytes)", input.display(), output.display(), mangled.len());

    Ok(())
}

fn cmd_build(input: &Path, output: &Path, comment: Option<&str>) -> Result<()> {
    let start = Instant::now();
    let archive = packmangle::pack_directory(input).context("Failed to pack directory")?;
    let mangled = packmangle::mangle(&archive, comment.map(str::as_bytes))
        .context("Failed to mangle archive")?;
    fs::write(output, &mangled).context("Failed to write output file")?;

    info!(
        "Built {} from {} ({} bytes) in {:?}",
        output.display(),
        input.display(),
        mangled.len(),
        start.elapsed()
    );

    Ok(())
}

fn cmd_extract(input: &Path, output: &Path, mode: ScanMode) -> Result<()> {
    let data = map_input(input)?;

    let start = Instant::now();
    let directory = Directory::scan(&data, mode).context("Failed to read archive directory")?;
    info!(
        "Loaded {} entries (shift {}) in {:?}",
        directory.len(),
        directory.shift(),
        start.elapsed()
    );

    fs::create_dir_all(output)?;

    let start = Instant::now();
    let report = extract_entries(&data, &directory, output)?;

    info!(
        "Extracted {} files in {:?} ({} failed)",
        report.written,
        start.elapsed(),
        report.failures.len()
    );

    for failure in &report.failures {
        warn!("{failure}");
    }

    report.into_result()?;
    Ok(())
}

#[cfg(not(feature = "parallel"))]
fn extract_entries(data: &[u8], directory: &Directory, output: &Path) -> Result<ExtractReport> {
    let pb = ProgressBar::new(directory.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut report = ExtractReport::default();
    for entry in directory.entries() {
        report.record(entry, directory.materialize(data, entry, output));
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(report)
}

#[cfg(feature = "parallel")]
fn extract_entries(data: &[u8], directory: &Directory, output: &Path) -> Result<ExtractReport> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!("Extracting {} entries in parallel", directory.len()));
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let report = directory.materialize_parallel(data, output);
    pb.finish_and_clear();

    Ok(report)
}

fn cmd_list(input: &Path, mode: ScanMode, detailed: bool) -> Result<()> {
    let data = map_input(input)?;
    let directory = Directory::scan(&data, mode).context("Failed to read archive directory")?;

    if detailed {
        let end = directory.end_record();
        println!(
            "end record at {}, directory {} bytes at {}, shift {}",
            end.offset,
            end.directory_size,
            end.directory_start().unwrap_or_default(),
            directory.shift()
        );
    }

    for entry in directory.entries() {
        if detailed {
            println!(
                "{:>6} {:>12} {:>10} {}",
                entry.method(),
                entry.compressed_size(),
                entry.local_header_offset(),
                entry.name_lossy()
            );
        } else {
            println!("{}", entry.name_lossy());
        }
    }

    println!("\nTotal: {} entries", directory.len());

    Ok(())
}
