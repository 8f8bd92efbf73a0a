use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::client::DaemonClient;
use crate::models::{Config, OutputFormat};

pub async fn handle_status(format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let client = DaemonClient::new(&config);

    let daemon = if client.is_running() {
        match client.status().await {
            Ok(status) => Some(status),
            Err(e) => {
                if verbose {
                    eprintln!("Status request failed: {e}");
                }
                None
            }
        }
    } else {
        None
    };

    let status = StatusInfo {
        daemon_running: daemon.is_some(),
        socket_path: client.socket_path().display().to_string(),
        daemon,
    };

    print!("{}", formatter.format_status(&status));

    if !status.daemon_running {
        eprintln!();
        eprintln!("Hint: daemon not running. It will start automatically on first upload/query.");
        eprintln!("      Or start manually with: docqa serve");
    } else if let Some(ref d) = status.daemon
        && d.documents == 0
    {
        eprintln!();
        eprintln!("Hint: no documents yet. Add some with: docqa upload <path>");
    }

    Ok(())
}
