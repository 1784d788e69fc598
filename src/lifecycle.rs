// src/lifecycle.rs

use crate::error::{Result, ShareError};
use crate::identity::{self, MountSpec};
use crate::runner::CommandRunner;
use crate::settings::Settings;
use crate::{export, mount};
use clap::ValueEnum;
use rand::Rng;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MountMode {
    /// The parameter is a complete mount command ending in the mount path.
    Command,
    /// The parameter is an NFS locator (`host:/export`); a mount path is
    /// generated under the mount root.
    Remote,
}

fn reject_exported(settings: &Settings, share_name: &str) -> Result<()> {
    if export::is_exported(settings, share_name)? {
        return Err(ShareError::DuplicateShare(share_name.to_string()));
    }
    Ok(())
}

fn prepare(
    settings: &Settings,
    mode: MountMode,
    parameter: &str,
    rng: &mut impl Rng,
) -> Result<MountSpec> {
    match mode {
        MountMode::Command => {
            let spec = identity::from_command(parameter)?;
            reject_exported(settings, &spec.share_name)?;
            identity::ensure_mount_dir(&spec.mount_path)?;
            Ok(spec)
        }
        MountMode::Remote => {
            let spec = identity::generate(settings, parameter, rng)?;
            if let Err(e) = reject_exported(settings, &spec.share_name) {
                if let Err(rm) = fs::remove_dir(&spec.mount_path) {
                    warn!(
                        path = %spec.mount_path.display(),
                        error = %rm,
                        "could not remove generated mount path"
                    );
                }
                return Err(e);
            }
            Ok(spec)
        }
    }
}

/// Mount, tune, export, then report the share name through `result_file`.
///
/// Any failure stops the sequence, except read-ahead tuning which is only
/// logged. A failed export after the mount leaves the mount in place.
pub async fn mount_and_export<R: CommandRunner>(
    runner: &R,
    settings: &Settings,
    mode: MountMode,
    parameter: &str,
    result_file: &Path,
    rng: &mut impl Rng,
) -> Result<String> {
    let spec = prepare(settings, mode, parameter, rng)?;
    mount::mount(runner, &settings.bdi_root, &spec).await?;
    if let Err(e) = export::export(runner, settings, &spec.share_name, &spec.mount_path).await {
        warn!(
            share = %spec.share_name,
            path = %spec.mount_path.display(),
            error = %e,
            "mounted; export incomplete"
        );
        return Err(e);
    }
    fs::write(result_file, format!("{}\n", spec.share_name))
        .map_err(|e| ShareError::io(result_file, e))?;
    info!(share = %spec.share_name, path = %spec.mount_path.display(), "share ready");
    Ok(spec.share_name)
}
