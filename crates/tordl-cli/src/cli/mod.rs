//! CLI for the tordl batch downloader.

mod commands;
mod progress;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tordl_core::config::{self, TordlConfig};
use tordl_core::logging;

use commands::{run_batch, run_check, run_config_path};

/// Top-level CLI for the tordl downloader.
#[derive(Debug, Parser)]
#[command(name = "tordl")]
#[command(about = "tordl: resumable batch downloads over Tor", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/tordl/config.toml.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every URL from the given sources.
    Run(RunArgs),

    /// Verify that requests leave through Tor.
    Check {
        /// SOCKS port of the Tor proxy.
        #[arg(long, value_name = "PORT")]
        socks_port: Option<u16>,
        /// Launch this tor binary first.
        #[arg(long, value_name = "PATH")]
        tor_path: Option<PathBuf>,
    },

    /// Print the path of the config file.
    ConfigPath,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// URLs to download, in addition to any links file or scrape.
    pub urls: Vec<String>,

    /// File of URLs: a JSON array, or one URL per line.
    #[arg(long, value_name = "FILE")]
    pub links_file: Option<PathBuf>,

    /// Page to scrape for links (fetched through Tor).
    #[arg(long, value_name = "URL", requires = "link_pattern")]
    pub scrape_url: Option<String>,

    /// Regex selecting links on the scraped page; the first capture group is used if present.
    #[arg(long, value_name = "REGEX", requires = "scrape_url")]
    pub link_pattern: Option<String>,

    /// Directory to write downloads into.
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of downloads running at once.
    #[arg(long, short = 'j', value_name = "N")]
    pub max_downloads: Option<usize>,

    /// SOCKS port of the Tor proxy.
    #[arg(long, value_name = "PORT")]
    pub socks_port: Option<u16>,

    /// Streaming chunk size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<usize>,

    /// Attempts per file before giving up.
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Launch this tor binary instead of using a running proxy.
    #[arg(long, value_name = "PATH")]
    pub tor_path: Option<PathBuf>,

    /// Connect directly, without Tor.
    #[arg(long)]
    pub direct: bool,
}

impl RunArgs {
    /// Flags override values from the config file.
    pub fn apply(&self, cfg: &mut TordlConfig) {
        if let Some(p) = &self.links_file {
            cfg.links_file = Some(p.clone());
        }
        if let Some(d) = &self.output_dir {
            cfg.output_dir = d.clone();
        }
        if let Some(n) = self.max_downloads {
            cfg.max_downloads = n;
        }
        if let Some(p) = self.socks_port {
            cfg.socks_port = p;
        }
        if let Some(c) = self.chunk_size {
            cfg.chunk_size = c;
        }
        if let Some(n) = self.max_retries {
            let mut retry = cfg.retry_config();
            retry.max_attempts = n;
            cfg.retry = Some(retry);
        }
        if let Some(p) = &self.tor_path {
            cfg.tor_path = Some(p.clone());
        }
    }
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::ConfigPath = cli.command {
            return run_config_path(cli.config.as_deref());
        }

        let mut cfg = match &cli.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        if let Err(e) = logging::init_logging(cfg.log_file.as_deref()) {
            // Keep going with stderr output only.
            eprintln!("tordl: log file unavailable ({:#}), logging to stderr", e);
            logging::init_logging_stderr();
        }
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run(args) => {
                args.apply(&mut cfg);
                cfg.validate()?;
                run_batch(&cfg, &args)?;
            }
            CliCommand::Check {
                socks_port,
                tor_path,
            } => {
                if let Some(p) = socks_port {
                    cfg.socks_port = p;
                }
                if let Some(p) = tor_path {
                    cfg.tor_path = Some(p);
                }
                run_check(&cfg)?;
            }
            CliCommand::ConfigPath => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
