// src/mount.rs

use crate::error::{Result, ShareError};
use crate::identity::MountSpec;
use crate::runner::CommandRunner;
use nix::sys::stat::{major, minor};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Read-ahead applied to every mount, in KiB (16 MiB).
pub const READ_AHEAD_KB: u64 = 16 * 1024;

/// Runs the mount, then raises read-ahead on the backing device.
///
/// Only the mount itself can fail: once it succeeded the share must still be
/// exported, so a tuning failure is logged and `None` returned instead of the
/// tunable that was written.
pub async fn mount<R: CommandRunner>(
    runner: &R,
    bdi_root: &Path,
    spec: &MountSpec,
) -> Result<Option<PathBuf>> {
    info!(share = %spec.share_name, command = %spec.invocation, "mounting");
    runner.run(&spec.invocation).await?;
    match tune_read_ahead(bdi_root, &spec.mount_path) {
        Ok(tunable) => Ok(Some(tunable)),
        Err(e) => {
            warn!(path = %spec.mount_path.display(), error = %e, "read-ahead not set");
            Ok(None)
        }
    }
}

/// `<bdi_root>/<major>:<minor>/read_ahead_kb` for the filesystem mounted
/// at `mount_path`.
pub fn read_ahead_tunable(bdi_root: &Path, mount_path: &Path) -> Result<PathBuf> {
    let dev = fs::metadata(mount_path)
        .map_err(|e| ShareError::io(mount_path, e))?
        .dev();
    Ok(bdi_root
        .join(format!("{}:{}", major(dev), minor(dev)))
        .join("read_ahead_kb"))
}

pub fn tune_read_ahead(bdi_root: &Path, mount_path: &Path) -> Result<PathBuf> {
    let tunable = read_ahead_tunable(bdi_root, mount_path)?;
    fs::write(&tunable, READ_AHEAD_KB.to_string()).map_err(|e| ShareError::io(&tunable, e))?;
    info!(
        path = %mount_path.display(),
        tunable = %tunable.display(),
        kb = READ_AHEAD_KB,
        "read-ahead set"
    );
    Ok(tunable)
}
