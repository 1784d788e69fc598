// src/export.rs

use crate::error::{Result, ShareError};
use crate::runner::{CommandRunner, Invocation};
use crate::settings::Settings;
use crate::smbconf::{ConfigFile, ConfigLock};
use std::path::{Path, PathBuf};
use tracing::info;

/// One `[name]` section of the SMB configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportBlock {
    pub name: String,
    pub comment: String,
    pub path: PathBuf,
    pub read_only: bool,
    pub guest_ok: bool,
    pub browseable: bool,
}

fn yes_no(b: bool) -> String {
    String::from(if b { "yes" } else { "no" })
}

impl ExportBlock {
    /// Writable, guest-accessible and browseable.
    pub fn new(name: &str, path: &Path, comment: &str) -> Self {
        Self {
            name: name.to_string(),
            comment: comment.to_string(),
            path: path.to_path_buf(),
            read_only: false,
            guest_ok: true,
            browseable: true,
        }
    }

    /// Attribute lines in file order.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("comment", self.comment.clone()),
            ("path", self.path.display().to_string()),
            ("read only", yes_no(self.read_only)),
            ("guest ok", yes_no(self.guest_ok)),
            ("browseable", yes_no(self.browseable)),
        ]
    }
}

/// Restarts the export service so it re-reads its configuration.
pub async fn reload<R: CommandRunner>(runner: &R, service: &str) -> Result<()> {
    runner
        .run(&Invocation::new("systemctl", ["restart", service]))
        .await?;
    info!(service, "export service reloaded");
    Ok(())
}

pub fn is_exported(settings: &Settings, share_name: &str) -> Result<bool> {
    Ok(ConfigFile::load(&settings.smb_conf)?
        .find_last_block(share_name)
        .is_some())
}

/// Appends `[share_name]` for `mount_path` and reloads the service.
/// A name that already has a section is rejected rather than duplicated.
pub async fn export<R: CommandRunner>(
    runner: &R,
    settings: &Settings,
    share_name: &str,
    mount_path: &Path,
) -> Result<ExportBlock> {
    let _lock = ConfigLock::acquire(&settings.lock_file)?;
    let mut cfg = ConfigFile::load(&settings.smb_conf)?;
    if cfg.find_last_block(share_name).is_some() {
        return Err(ShareError::DuplicateShare(share_name.to_string()));
    }

    let block = ExportBlock::new(share_name, mount_path, &settings.share_comment);
    let attrs = block.attributes();
    cfg.append_block(&block.name, attrs.iter().map(|(k, v)| (*k, v.as_str())));
    cfg.save(&settings.smb_conf)?;
    info!(share = share_name, path = %mount_path.display(), "export block appended");

    reload(runner, &settings.service).await?;
    Ok(block)
}
