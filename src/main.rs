//! CLI entry point for `evocache`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};

use evocache::archive::{default_output_dir, Archive};
use evocache::config::Config;
use evocache::extract::{self, ExtractReport};

/// Bad or missing arguments.
const EXIT_USAGE: u8 = 1;
/// The cache could not be opened or its metadata stream is invalid.
const EXIT_OPEN: u8 = 2;
/// Extraction could not start (or a single requested file failed).
const EXIT_EXTRACT: u8 = 3;

#[derive(Parser)]
#[command(
    name = "evocache",
    version,
    about = "Extract Evolution engine caches (.toc + .cache)"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Cache to extract: the .toc, the .cache, or their shared base name
    #[arg(value_name = "ARCHIVE")]
    archive: Option<PathBuf>,

    /// Output directory (default: ARCHIVE followed by "_extracted")
    #[arg(short = 'd', long = "output-dir", value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract all files, or a single one with --file
    Extract {
        archive: PathBuf,
        #[arg(short = 'd', long = "output-dir", value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Relative path of one file inside the cache
        #[arg(long, value_name = "PATH")]
        file: Option<String>,
    },
    /// List files
    List {
        archive: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show statistics
    Stats {
        archive: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Write one file's decoded contents to stdout
    Cat { archive: PathBuf, path: String },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Which stage of a command failed; decides the exit status.
enum Failure {
    Open(anyhow::Error),
    Extract(anyhow::Error),
}

type CmdResult = std::result::Result<(), Failure>;

impl From<std::io::Error> for Failure {
    fn from(e: std::io::Error) -> Self {
        Failure::Extract(e.into())
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = evocache::config::load_config();
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let result = match cli.command {
        Some(Commands::Extract {
            archive,
            output_dir,
            file,
        }) => cmd_extract(&archive, output_dir, file.as_deref(), &config),
        Some(Commands::List { archive, json }) => cmd_list(&archive, json, &config),
        Some(Commands::Stats { archive, json }) => cmd_stats(&archive, json, &config),
        Some(Commands::Cat { archive, path }) => cmd_cat(&archive, &path, &config),
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => match cli.archive {
            Some(archive) => cmd_extract(&archive, cli.output_dir, None, &config),
            None => {
                let _ = Cli::command()
                    .error(
                        clap::error::ErrorKind::MissingRequiredArgument,
                        "the archive path is required",
                    )
                    .print();
                return ExitCode::from(EXIT_USAGE);
            }
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Open(e)) => {
            eprintln!(
                "Error opening cache. Make sure it is readable and is an Evolution engine cache. ({e:#})"
            );
            ExitCode::from(EXIT_OPEN)
        }
        Err(Failure::Extract(e)) => {
            eprintln!("Error while extracting files. ({e:#})");
            ExitCode::from(EXIT_EXTRACT)
        }
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = evocache::config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "evocache.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn open_archive(path: &Path, config: &Config) -> std::result::Result<Archive, Failure> {
    Archive::open(path, config.extract.read_buffer_size)
        .with_context(|| format!("opening {}", path.display()))
        .map_err(Failure::Open)
}

/// Extract the whole cache, or one file of it.
fn cmd_extract(
    path: &Path,
    output_dir: Option<PathBuf>,
    file: Option<&str>,
    config: &Config,
) -> CmdResult {
    let mut archive = open_archive(path, config)?;
    let dest = output_dir
        .unwrap_or_else(|| default_output_dir(path, &config.extract.output_suffix));
    let options = config.extract.options();
    let (directory, store) = archive.parts_mut();

    if let Some(rel) = file {
        let out = extract::extract_path(directory, store, rel, &dest, &options)
            .with_context(|| format!("extracting {rel}"))
            .map_err(Failure::Extract)?;
        println!("  Extracted {}", out.display());
        return Ok(());
    }

    let pb = ProgressBar::new(directory.files().len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Extracting [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let report = extract::extract_all(
        directory,
        store,
        &dest,
        &options,
        Some(&|current, _total| pb.set_position(current as u64)),
    )
    .with_context(|| format!("preparing {}", dest.display()))
    .map_err(Failure::Extract)?;
    pb.finish_and_clear();

    print_report(&dest, &report, start.elapsed());
    Ok(())
}

fn print_report(dest: &Path, report: &ExtractReport, elapsed: std::time::Duration) {
    println!();
    println!("  {:<20} {}", "Output", dest.display());
    println!("  {:<20} {}", "Files extracted", report.extracted);
    println!(
        "  {:<20} {}",
        "Bytes written",
        format_size(report.bytes_written, BINARY)
    );
    println!("  {:<20} {:.2?}", "Time", elapsed);
    if !report.is_complete() {
        println!();
        println!("  {} file(s) failed:", report.failures.len());
        for failure in &report.failures {
            println!("    {}: {}", failure.path, failure.error);
        }
    }
    println!();
    println!("Extraction complete.");
}

/// List files in stream order.
fn cmd_list(path: &Path, json: bool, config: &Config) -> CmdResult {
    let archive = open_archive(path, config)?;
    let directory = archive.directory();

    if json {
        let items: Vec<serde_json::Value> = directory
            .files()
            .iter()
            .zip(directory.file_paths())
            .map(|(e, p)| {
                serde_json::json!({
                    "path": p,
                    "offset": e.offset,
                    "length": e.length,
                    "compressed_length": e.compressed_length,
                    "modified": e.modified().map(|d| d.to_rfc3339()),
                    "scope_index": e.scope_index,
                })
            })
            .collect();
        let text = serde_json::to_string_pretty(&items)
            .map_err(|e| Failure::Extract(e.into()))?;
        println!("{text}");
        return Ok(());
    }

    let mut out = std::io::stdout().lock();
    for (entry, p) in directory.files().iter().zip(directory.file_paths()) {
        let date = entry
            .modified()
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{:>10} {:>10} {:<16} {}",
            entry.length, entry.compressed_length, date, p
        )?;
    }
    Ok(())
}

/// Show statistics for a cache.
fn cmd_stats(path: &Path, json: bool, config: &Config) -> CmdResult {
    let archive = open_archive(path, config)?;
    let directory = archive.directory();
    let anomalies = directory.anomalies().count();

    if json {
        let stats = serde_json::json!({
            "toc": archive.paths().toc.to_string_lossy(),
            "cache": archive.paths().cache.to_string_lossy(),
            "version": directory.version(),
            "files": directory.files().len(),
            "directories": directory.directories().len(),
            "compressed_files": directory.count_compressed(),
            "total_length": directory.total_length(),
            "total_compressed_length": directory.total_compressed_length(),
            "scope_anomalies": anomalies,
        });
        let text =
            serde_json::to_string_pretty(&stats).map_err(|e| Failure::Extract(e.into()))?;
        println!("{text}");
        return Ok(());
    }

    println!();
    println!("  {:<20} {}", "Metadata", archive.paths().toc.display());
    println!("  {:<20} {}", "Content", archive.paths().cache.display());
    println!("  {:<20} {}", "Version", directory.version());
    println!("  {:<20} {}", "Files", directory.files().len());
    println!("  {:<20} {}", "Directories", directory.directories().len());
    println!(
        "  {:<20} {}",
        "Compressed files",
        directory.count_compressed()
    );
    println!(
        "  {:<20} {}",
        "Total size",
        format_size(directory.total_length(), BINARY)
    );
    println!(
        "  {:<20} {}",
        "Stored size",
        format_size(directory.total_compressed_length(), BINARY)
    );
    if anomalies > 0 {
        println!("  {:<20} {}", "Scope anomalies", anomalies);
    }
    println!();
    Ok(())
}

/// Decode one file to stdout.
fn cmd_cat(path: &Path, rel: &str, config: &Config) -> CmdResult {
    let mut archive = open_archive(path, config)?;
    let (directory, store) = archive.parts_mut();
    let entry = directory
        .find_file(rel)
        .map_err(|e| Failure::Extract(e.into()))?;
    let mut out = std::io::stdout().lock();
    store
        .copy_entry(entry, &mut out)
        .with_context(|| format!("reading {rel}"))
        .map_err(Failure::Extract)?;
    out.flush()?;
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> CmdResult {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "evocache", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> CmdResult {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::stdout().write_all(&buf)?;
    Ok(())
}
