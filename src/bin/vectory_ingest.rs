use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use vectory::{
    config::{self, BatchPolicy},
    logging,
    processing::{IngestionService, ProcessingError, UploadResult, UploadedFile},
};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "vectory-ingest",
    about = "Ingest PDF files or directories of PDFs into the configured vector store"
)]
struct Cli {
    /// PDF files or directories to scan recursively for `*.pdf`.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    /// Override `TEXT_SPLITTER_CHUNK_SIZE`.
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Override `TEXT_SPLITTER_CHUNK_OVERLAP`.
    #[arg(long)]
    chunk_overlap: Option<usize>,
    /// Keep going when a file fails and report it instead of stopping.
    #[arg(long)]
    isolate: bool,
}

#[derive(Serialize)]
struct Report {
    success: bool,
    files_processed: usize,
    results: Vec<UploadResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<FailureEntry>,
}

#[derive(Serialize)]
struct FailureEntry {
    filename: Option<String>,
    detail: String,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    logging::init_cli_tracing();
    let cli = Cli::parse();

    let mut config = config::init_config()
        .context("Failed to load configuration")?
        .clone();
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(chunk_overlap) = cli.chunk_overlap {
        config.chunk_overlap = chunk_overlap;
    }
    if cli.isolate {
        config.batch_policy = BatchPolicy::Isolate;
    }

    let service = IngestionService::from_config(&config).context("Invalid chunking options")?;

    let pdfs = collect_pdfs(&cli.paths)?;
    if pdfs.is_empty() {
        bail!("no PDF files found under the given paths");
    }
    let files = pdfs
        .iter()
        .map(|path| read_upload(path))
        .collect::<Result<Vec<_>>>()?;

    let filenames: Vec<String> = files.iter().map(|file| file.filename.clone()).collect();

    let report = match service.ingest_batch(files).await {
        Ok(outcome) => Report {
            success: outcome.is_success(),
            files_processed: outcome.results.len(),
            results: outcome.results,
            failures: outcome.failures.iter().map(failure_entry).collect(),
        },
        Err(error) => {
            let stored = stored_before_failure(&filenames, &error);
            if !stored.is_empty() {
                eprintln!(
                    "note: {} file(s) ingested before the failure stay in the index: {}",
                    stored.len(),
                    stored.join(", ")
                );
            }
            Report {
                success: false,
                files_processed: 0,
                results: Vec::new(),
                failures: vec![failure_entry(&error)],
            }
        }
    };

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report).context("Failed to write report")?;
    writeln!(stdout)?;

    if !report.success {
        bail!("{} file(s) failed", report.failures.len());
    }
    Ok(())
}

fn failure_entry(error: &ProcessingError) -> FailureEntry {
    FailureEntry {
        filename: error.filename().map(str::to_string),
        detail: error.to_string(),
    }
}

/// Files a fail-fast batch finished storing before it stopped at `error`.
///
/// Validation errors stop the batch before anything is stored.
fn stored_before_failure<'a>(filenames: &'a [String], error: &ProcessingError) -> Vec<&'a str> {
    match error {
        ProcessingError::NoExtractableText { filename }
        | ProcessingError::Failed { filename, .. } => filenames
            .iter()
            .take_while(|name| *name != filename)
            .map(String::as_str)
            .collect(),
        ProcessingError::EmptyUpload
        | ProcessingError::UnsupportedFileType { .. }
        | ProcessingError::Unavailable(_) => Vec::new(),
    }
}

/// Expand directories into their `*.pdf` files; explicit file arguments are kept as given.
fn collect_pdfs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut pdfs = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry =
                    entry.with_context(|| format!("Failed to walk {}", path.display()))?;
                if entry.file_type().is_file() && has_pdf_extension(entry.path()) {
                    pdfs.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            pdfs.push(path.clone());
        } else {
            bail!("{} does not exist", path.display());
        }
    }
    Ok(pdfs)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"))
}

fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadedFile::new(filename, bytes))
}
