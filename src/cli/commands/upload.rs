use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

use crate::cli::output::{UploadSummary, get_formatter};
use crate::client::DaemonClient;
use crate::error::DaemonError;
use crate::extract::{FileKind, SUPPORTED_EXTENSIONS};
use crate::models::{Config, OutputFormat};
use crate::utils::file::collect_files;

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Files or directories to upload
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// File patterns to exclude (can be specified multiple times)
    #[arg(long, short = 'e')]
    pub exclude: Vec<String>,

    /// Show what would be uploaded without uploading
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn handle_upload(args: UploadArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let mut files = Vec::new();
    for path in &args.paths {
        if !path.exists() {
            anyhow::bail!("path does not exist: {}", path.display());
        }
        let found = collect_files(path, &args.exclude)
            .with_context(|| format!("failed to walk {}", path.display()))?;

        // Explicit files go through so the daemon can report unsupported formats.
        if path.is_file() {
            files.extend(found);
        } else {
            files.extend(found.into_iter().filter(|f| FileKind::is_supported(f)));
        }
    }

    if files.is_empty() {
        println!(
            "{}",
            formatter.format_message(&format!(
                "No files found to upload (supported: {}).",
                SUPPORTED_EXTENSIONS.join(", ")
            ))
        );
        return Ok(());
    }

    if verbose {
        eprintln!("Found {} files to upload", files.len());
    }

    if args.dry_run {
        println!(
            "{}",
            formatter.format_message(&format!("Dry run: Would upload {} files", files.len()))
        );
        for file in &files {
            println!("  {}", file.display());
        }
        return Ok(());
    }

    let client = DaemonClient::new(&config);
    client
        .ensure_running()
        .await
        .context("daemon is not available")?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .context("invalid progress template")?
            .progress_chars("#>-"),
    );

    let mut summary = UploadSummary {
        files_scanned: files.len(),
        ..Default::default()
    };

    for file in &files {
        let display = file.display().to_string();
        match client.upload(file).await {
            Ok(response) => {
                if verbose {
                    pb.println(format!(
                        "{}: {} chunks",
                        response.filename, response.chunks_created
                    ));
                }
                summary.push_success(display, response.chunks_created);
            }
            Err(DaemonError::Remote { kind, message }) => {
                if verbose {
                    pb.println(format!("Skipping {}: {} ({})", display, message, kind));
                }
                summary.push_failure(display, message);
            }
            Err(e) => {
                pb.abandon();
                return Err(e).context("upload failed");
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    summary.duration_ms = start_time.elapsed().as_millis() as u64;
    print!("{}", formatter.format_upload(&summary));

    if summary.files_uploaded == 0 {
        anyhow::bail!("no files were uploaded");
    }
    Ok(())
}
