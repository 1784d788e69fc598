// src/setup.rs

use crate::error::Result;
use crate::export::reload;
use crate::runner::{CommandRunner, Invocation};
use crate::settings::Settings;
use crate::smbconf::{ConfigFile, ConfigLock};
use tracing::info;

/// Installs the NFS client and SMB server, opens the firewall and enables
/// the export service. Stops at the first failing step.
pub async fn install<R: CommandRunner>(runner: &R, settings: &Settings) -> Result<()> {
    let mut steps = vec![Invocation::new("apt-get", ["update"])];
    steps.push(Invocation::new(
        "apt-get",
        ["install", "-y"]
            .into_iter()
            .map(String::from)
            .chain(settings.packages.iter().cloned()),
    ));
    steps.push(Invocation::new(
        "ufw",
        ["allow", settings.firewall_service.as_str()],
    ));
    steps.push(Invocation::new(
        "systemctl",
        ["enable", settings.service.as_str()],
    ));
    for step in &steps {
        runner.run(step).await?;
    }
    info!(packages = ?settings.packages, "prerequisites installed");
    Ok(())
}

/// Adds the `[global]` extension lines that are not already present and
/// reloads the service if anything changed. Safe to run repeatedly.
pub async fn setup<R: CommandRunner>(runner: &R, settings: &Settings) -> Result<usize> {
    let _lock = ConfigLock::acquire(&settings.lock_file)?;
    let mut cfg = ConfigFile::load(&settings.smb_conf)?;
    let mut added = 0;
    for (key, value) in &settings.global_extensions {
        if cfg.ensure_attribute("global", key, value) {
            added += 1;
        }
    }
    if added == 0 {
        info!("global section already configured");
        return Ok(0);
    }
    cfg.save(&settings.smb_conf)?;
    info!(added, "global section updated");
    reload(runner, &settings.service).await?;
    Ok(added)
}
