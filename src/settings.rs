// src/settings.rs

use crate::error::{Result, ShareError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Runtime settings, read from an optional TOML file.
///
/// Every field has a default so an absent file (or a partial one) still
/// yields a usable configuration for a stock Samba install.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Export configuration file shared with the SMB service.
    pub smb_conf: PathBuf,
    /// Lock file guarding read-modify-write cycles on `smb_conf`.
    pub lock_file: PathBuf,
    /// Directory under which generated mount points are created.
    pub mount_root: PathBuf,
    pub share_prefix: String,
    pub nfs_options: String,
    /// Root of the per-device read-ahead tunables.
    pub bdi_root: PathBuf,
    /// Export service restarted after every config mutation.
    pub service: String,
    pub max_path_attempts: u32,
    pub suffix_max: u32,
    pub share_comment: String,
    pub packages: Vec<String>,
    pub firewall_service: String,
    /// Lines added once to `[global]` by `setup`.
    pub global_extensions: Vec<(String, String)>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            smb_conf: "/etc/samba/smb.conf".into(),
            lock_file: "/run/lock/nfs-smb-share.lock".into(),
            mount_root: "/mnt".into(),
            share_prefix: "nfsv3share".into(),
            nfs_options: "sec=sys,vers=3,nolock,proto=tcp".into(),
            bdi_root: "/sys/class/bdi".into(),
            service: "smbd".into(),
            max_path_attempts: 64,
            suffix_max: 32767,
            share_comment: "NFSv3 mount exported over SMB".into(),
            packages: vec!["nfs-common".into(), "samba".into()],
            firewall_service: "samba".into(),
            global_extensions: vec![("map to guest".into(), "bad user".into())],
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| ShareError::io(path, e))?;
        Self::parse(&text).map_err(|source| ShareError::Settings {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
impl Settings {
    /// Defaults with the export file and lock redirected into `dir`.
    pub fn scratch(dir: &Path, conf: &str) -> Self {
        let smb_conf = dir.join("smb.conf");
        std::fs::write(&smb_conf, conf).unwrap();
        Self {
            smb_conf,
            lock_file: dir.join("smb.lock"),
            mount_root: dir.join("mnt"),
            bdi_root: dir.join("bdi"),
            ..Self::default()
        }
    }
}
