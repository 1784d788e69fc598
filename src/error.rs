// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("mount path must start with '/': {0:?}")]
    RelativeMountPath(String),
    #[error("mount path {0:?} yields an empty share name")]
    EmptyShareName(String),
    #[error("mount command is empty")]
    EmptyCommand,
    #[error("remote locator must look like host:/export, got {0:?}")]
    BadRemote(String),
    #[error("no unused mount path under {} after {attempts} attempts", .root.display())]
    NamespaceExhausted { root: PathBuf, attempts: u32 },
    #[error("share [{0}] is already exported")]
    DuplicateShare(String),
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("lock {}: errno {errno}", .path.display())]
    Lock { path: PathBuf, errno: nix::errno::Errno },
    #[error("{}: invalid settings: {source}", .path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ShareError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ShareError> = std::result::Result<T, E>;
