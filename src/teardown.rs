// src/teardown.rs

use crate::error::Result;
use crate::export::reload;
use crate::runner::{CommandRunner, Invocation};
use crate::settings::Settings;
use crate::smbconf::{ConfigFile, ConfigLock};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyPath,
    RelativePath,
    NotADirectory,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::EmptyPath => "export block has no path",
            SkipReason::RelativePath => "path does not start with '/'",
            SkipReason::NotADirectory => "path is not an existing directory",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No block carries that name; nothing was touched.
    NotFound,
    /// Block removed and the service reloaded, but the path was not unmounted.
    Skipped { path: String, reason: SkipReason },
    Unmounted { path: PathBuf },
}

fn check_path(path: &str) -> Option<SkipReason> {
    if path.is_empty() {
        Some(SkipReason::EmptyPath)
    } else if !path.starts_with('/') {
        Some(SkipReason::RelativePath)
    } else if !Path::new(path).is_dir() {
        Some(SkipReason::NotADirectory)
    } else {
        None
    }
}

/// Removes the last `[share_name]` block, reloads the export service, then
/// unmounts the block's path. The reload must come first: the service keeps
/// the mount point busy while it is exported.
pub async fn teardown<R: CommandRunner>(
    runner: &R,
    settings: &Settings,
    share_name: &str,
) -> Result<Outcome> {
    let path = {
        let _lock = ConfigLock::acquire(&settings.lock_file)?;
        let mut cfg = ConfigFile::load(&settings.smb_conf)?;
        let Some(range) = cfg.find_last_block(share_name) else {
            info!(share = share_name, "no such share");
            return Ok(Outcome::NotFound);
        };
        let path = cfg.read_attribute(range, "path").unwrap_or_default().to_string();
        cfg.delete_range(range);
        cfg.save(&settings.smb_conf)?;
        info!(share = share_name, lines = range.end - range.start + 1, "export block removed");
        reload(runner, &settings.service).await?;
        path
    };

    if let Some(reason) = check_path(&path) {
        warn!(share = share_name, path = %path, %reason, "not unmounting");
        return Ok(Outcome::Skipped { path, reason });
    }
    runner.run(&Invocation::new("umount", [path.as_str()])).await?;
    info!(share = share_name, path = %path, "unmounted");
    Ok(Outcome::Unmounted { path: path.into() })
}
