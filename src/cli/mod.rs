//! Command-line front end. Every command talks to the daemon over its socket.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Ask questions about your own documents.
#[derive(Debug, Parser)]
#[command(name = "docqa")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start, stop, or restart the background daemon
    Serve(commands::ServeArgs),

    /// Upload PDF, DOCX, or TXT files (directories are walked)
    Upload(commands::UploadArgs),

    /// Ask a question against the uploaded documents
    Query(commands::QueryArgs),

    /// List or clear uploaded documents
    #[command(subcommand)]
    Documents(commands::DocumentsCommand),

    /// Show daemon and index status
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
