use anyhow::{Context, Result};
use clap::Args;
use std::time::Instant;

use crate::cli::output::get_formatter;
use crate::client::DaemonClient;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(required = true, help = "Question to answer")]
    pub question: String,

    #[arg(long = "top-k", short = 'k', help = "Number of passages to retrieve")]
    pub top_k: Option<usize>,

    #[arg(long, help = "Print the assembled context")]
    pub context: bool,
}

pub async fn handle_query(args: QueryArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let question = args.question.trim();
    if question.is_empty() {
        anyhow::bail!("question cannot be empty");
    }
    if args.top_k == Some(0) {
        anyhow::bail!("top-k must be at least 1");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);
    let client = DaemonClient::new(&config);

    if verbose {
        eprintln!("Query: \"{question}\"");
        eprintln!("  Top k: {}", args.top_k.unwrap_or(config.retrieval.default_k));
    }

    let start = Instant::now();
    let response = client
        .query(question, args.top_k)
        .await
        .context("query failed")?;

    if verbose {
        eprintln!("  Total: {}ms", start.elapsed().as_millis());
        eprintln!();
    }

    print!("{}", formatter.format_query(&response, args.context));
    Ok(())
}
