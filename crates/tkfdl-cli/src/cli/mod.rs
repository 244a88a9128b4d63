//! CLI for the TKF download pipeline.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tkfdl_core::config;
use tkfdl_core::prefs::DEFAULT_SCREEN;

use commands::{run_bridge, run_fetch, run_pool_demo, run_prefs, run_probe, run_resolve};

/// Top-level CLI for the TKF download pipeline.
#[derive(Debug, Parser)]
#[command(name = "tkfdl")]
#[command(about = "TKF form browser download pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Show the file name and MIME type a download would get.
    Resolve {
        /// Download URL.
        url: String,
        /// Content-Disposition header value sent by the server.
        #[arg(long, value_name = "HEADER")]
        content_disposition: Option<String>,
        /// MIME type declared by the page or server.
        #[arg(long)]
        mime: Option<String>,
        /// File name suggested by the page.
        #[arg(long)]
        name: Option<String>,
    },

    /// Download a URL and save it like the app would.
    Fetch {
        /// Download URL.
        url: String,
        /// File name suggested by the page.
        #[arg(long)]
        name: Option<String>,
        /// Base directory for saved files (default: config, then current directory).
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
        /// Go through the download service instead of the direct path.
        #[arg(long)]
        queue: bool,
    },

    /// Send a HEAD request and print the headers that matter for naming.
    Probe {
        /// URL to probe.
        url: String,
    },

    /// Handle one page-bridge message (JSON with an `op` field).
    Bridge {
        /// The message, e.g. '{"op":"download_image","url":"..."}'.
        message: String,
        /// Base directory for saved files.
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
        /// Form page the message came from; defaults to the stored last URL.
        #[arg(long, value_name = "URL")]
        form_url: Option<String>,
    },

    /// Show or change a screen's stored preferences.
    Prefs {
        /// Screen whose preferences to use.
        #[arg(long, default_value = DEFAULT_SCREEN)]
        screen: String,
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// Exercise the browser-instance pool from several threads.
    PoolDemo {
        /// Number of concurrent users.
        #[arg(long, default_value = "5", value_name = "N")]
        count: usize,
    },
}

#[derive(Debug, Subcommand)]
pub enum PrefsAction {
    /// Print the last URL and the effective column widths.
    Show,
    /// Remember the form URL.
    SetUrl {
        url: String,
    },
    /// Override a column width (e.g. `140px`).
    SetWidth {
        column: String,
        width: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Resolve {
                url,
                content_disposition,
                mime,
                name,
            } => run_resolve(&cfg, &url, content_disposition, mime, name)?,
            CliCommand::Fetch {
                url,
                name,
                dir,
                queue,
            } => run_fetch(&cfg, &url, name.as_deref(), dir, queue).await?,
            CliCommand::Probe { url } => run_probe(&cfg, &url)?,
            CliCommand::Bridge {
                message,
                dir,
                form_url,
            } => run_bridge(&cfg, &message, dir, form_url).await?,
            CliCommand::Prefs { screen, action } => run_prefs(&screen, action)?,
            CliCommand::PoolDemo { count } => run_pool_demo(&cfg, count)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
