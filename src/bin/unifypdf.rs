//! UnifyPDF CLI tool
//!
//! Queues PDFs, has the merge service combine them, and saves the result.

use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use glob::glob;
use tracing_subscriber::EnvFilter;

use unifypdf::config::{API_BASE_URL_ENV, DEFAULT_API_BASE_URL};
use unifypdf::pdf::{extract_metadata, inspect_bytes};
use unifypdf::queue::format_megabytes;
use unifypdf::{
    AppendReport, CandidateFile, Config, HttpSession, OrchestrationStatus, QueueStore, Validator,
};

/// UnifyPDF - Merge PDFs through a merge service
#[derive(Parser)]
#[command(name = "unifypdf")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Merge PDFs in the given order
    unifypdf merge -o merged.pdf intro.pdf body.pdf appendix.pdf

    # Merge numbered PDFs in order using a remote service
    unifypdf merge --api-url https://merge.example.com -o handout.pdf \"[0-9]*.pdf\"

    # Check which files would be accepted
    unifypdf check *.pdf")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge PDF files into one using the merge service
    Merge {
        /// Input PDF files (in order). Supports glob patterns like "*.pdf"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output PDF file path (a directory saves as merged.pdf)
        #[arg(short, long, default_value = "merged.pdf")]
        output: PathBuf,

        /// Base URL of the merge service
        #[arg(long, env = API_BASE_URL_ENV, default_value = DEFAULT_API_BASE_URL)]
        api_url: String,

        /// Request timeout in seconds
        #[arg(long, default_value_t = 120)]
        timeout: u64,

        /// Open the merged result after creation
        #[arg(long)]
        open: bool,
    },

    /// Validate PDF files against the upload limits without merging
    Check {
        /// Input PDF files (in order). Supports glob patterns like "*.pdf"
        #[arg(required = true)]
        inputs: Vec<String>,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Merge { inputs, output, api_url, timeout, open } => {
            cmd_merge(inputs, output, api_url, timeout, open).await
        }
        Commands::Check { inputs } => cmd_check(inputs),
        Commands::Info { input } => cmd_info(input),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Expand glob patterns in input paths
fn expand_globs(patterns: Vec<String>) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for pattern in patterns {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matched = Vec::new();
            let entries = glob(&pattern)
                .map_err(|e| unifypdf::Error::InvalidGlob(format!("{}: {}", pattern, e)))?;
            for entry in entries {
                match entry {
                    Ok(path) => matched.push(path),
                    Err(e) => eprintln!("Warning: glob error for {}: {}", pattern, e),
                }
            }
            if matched.is_empty() {
                return Err(unifypdf::Error::NoFilesMatched(pattern).into());
            }
            // Numbered handouts sort into merge order
            matched.sort();
            paths.extend(matched);
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }

    Ok(paths)
}

fn load_candidates(paths: &[PathBuf]) -> anyhow::Result<Vec<CandidateFile>> {
    paths
        .iter()
        .map(|path| {
            CandidateFile::from_path(path)
                .with_context(|| format!("Failed to read {}", path.display()))
        })
        .collect()
}

fn print_report(report: &AppendReport) {
    for rejection in &report.rejected {
        eprintln!("Skipped {}: {}", rejection.name, rejection.reason);
    }
}

/// Open a file with the system default application
fn open_file(path: &Path) -> anyhow::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(path).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

/// Queue the inputs, merge them remotely and save the result
async fn cmd_merge(
    inputs: Vec<String>,
    output: PathBuf,
    api_url: String,
    timeout: u64,
    open: bool,
) -> anyhow::Result<()> {
    let inputs = expand_globs(inputs)?;
    let config = Config::default()
        .with_api_base_url(api_url)
        .with_request_timeout(Duration::from_secs(timeout));

    let session = HttpSession::from_config(&config)?;
    let report = session.append(load_candidates(&inputs)?);
    print_report(&report);
    eprintln!("Queued {}", session.summary());

    eprintln!("Merging {} PDF files...", session.len());
    let status = tokio::select! {
        status = session.submit() => status?,
        _ = tokio::signal::ctrl_c() => {
            session.cancel();
            bail!("Merge cancelled");
        }
    };

    match status {
        OrchestrationStatus::Succeeded => {}
        OrchestrationStatus::Failed(reason) => bail!(reason),
        other => bail!("Merge did not complete ({:?})", other),
    }

    let preview = session
        .current()
        .ok_or(unifypdf::Error::NoResult)?;
    let saved = session.download(&output)?;
    match inspect_bytes(preview.bytes()) {
        Ok(metadata) => eprintln!(
            "Merged to: {} ({} pages, {})",
            saved.display(),
            metadata.page_count,
            format_megabytes(preview.len() as u64)
        ),
        Err(e) => eprintln!("Merged to: {} (could not read merged PDF: {})", saved.display(), e),
    }

    if open {
        open_file(&saved)?;
    }

    Ok(())
}

/// Run the upload checks and print what would be merged
fn cmd_check(inputs: Vec<String>) -> anyhow::Result<()> {
    let inputs = expand_globs(inputs)?;
    let candidates = load_candidates(&inputs)?;

    let mut queue = QueueStore::new(Validator::new(Config::from_env().limits), Vec::new());
    let report = queue.append(candidates);
    print_report(&report);

    for (position, entry) in queue.entries().iter().enumerate() {
        println!(
            "{:>2}. {} ({})",
            position + 1,
            entry.name(),
            format_megabytes(entry.size())
        );
    }
    println!("{}", queue.summary());

    if !report.rejected.is_empty() {
        bail!("{} file(s) would be skipped", report.rejected.len());
    }
    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: PathBuf) -> anyhow::Result<()> {
    let metadata = extract_metadata(&input)?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);

    if let Some(title) = metadata.title {
        println!("Title: {}", title);
    }
    if let Some(author) = metadata.author {
        println!("Author: {}", author);
    }

    Ok(())
}
