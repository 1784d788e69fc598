// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod export;
mod identity;
mod lifecycle;
mod mount;
mod runner;
mod settings;
mod setup;
mod smbconf;
mod teardown;

use lifecycle::MountMode;
use runner::SystemRunner;
use settings::Settings;
use teardown::Outcome;

/// Mount NFSv3 exports and re-export them as SMB shares.
///
/// Logs go to stderr; set RUST_LOG to change the level (default: info).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about, verbatim_doc_comment)]
struct Cli {
    /// TOML settings file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Install the NFS client and SMB server and open the firewall
    Install,
    /// Add the one-time [global] settings to the SMB configuration
    Setup,
    /// Mount an NFS export and share it over SMB
    Mount {
        mode: MountMode,
        /// Full mount command (command mode) or host:/export (remote mode)
        parameter: String,
        /// File that receives the share name
        result_file: PathBuf,
    },
    /// Remove an SMB share and unmount its path
    Unmount { share_name: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = execute(Cli::parse()).await {
        eprintln!("ERROR: {err:#}");
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    let runner = SystemRunner;

    match cli.command {
        Cmd::Install => setup::install(&runner, &settings)
            .await
            .context("installing prerequisites")?,
        Cmd::Setup => {
            setup::setup(&runner, &settings)
                .await
                .with_context(|| format!("configuring {}", settings.smb_conf.display()))?;
        }
        Cmd::Mount {
            mode,
            parameter,
            result_file,
        } => {
            let name = lifecycle::mount_and_export(
                &runner,
                &settings,
                mode,
                &parameter,
                &result_file,
                &mut rand::thread_rng(),
            )
            .await
            .with_context(|| format!("mount {parameter:?}"))?;
            println!("{name}");
        }
        Cmd::Unmount { share_name } => {
            match teardown::teardown(&runner, &settings, &share_name)
                .await
                .with_context(|| format!("unmount share {share_name}"))?
            {
                Outcome::NotFound => println!("no such share: {share_name}"),
                Outcome::Skipped { path, reason } => {
                    println!("share {share_name} removed; {path:?} left mounted: {reason}")
                }
                Outcome::Unmounted { path } => {
                    info!(share = %share_name, "done");
                    println!("share {share_name} removed; {} unmounted", path.display())
                }
            }
        }
    }
    Ok(())
}
