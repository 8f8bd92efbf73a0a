use anyhow::{Context, Result};
use clap::Subcommand;
use std::io::{self, Write};

use crate::cli::output::get_formatter;
use crate::client::DaemonClient;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum DocumentsCommand {
    /// List uploaded documents
    List,

    /// Remove every document and the index
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        force: bool,
    },
}

pub async fn handle_documents(
    cmd: DocumentsCommand,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let client = DaemonClient::new(&config);

    match cmd {
        DocumentsCommand::List => {
            let list = client
                .list_documents()
                .await
                .context("failed to list documents")?;
            print!("{}", formatter.format_documents(&list));
        }
        DocumentsCommand::Clear { force } => {
            if !force && !confirm("Remove all uploaded documents?")? {
                println!("{}", formatter.format_message("Aborted."));
                return Ok(());
            }
            let cleared = client.clear().await.context("failed to clear documents")?;
            println!("{}", formatter.format_message(&cleared.message));
        }
    }

    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}
