// src/identity.rs

use crate::error::{Result, ShareError};
use crate::runner::Invocation;
use crate::settings::Settings;
use rand::Rng;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A mount waiting to happen: what to run, where it lands, and the share
/// name it will be exported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub invocation: Invocation,
    pub mount_path: PathBuf,
    pub share_name: String,
}

/// `/mnt/a/b` -> `mnt-a-b`. Pure, so re-mounting a path finds its old block.
pub fn share_name_for(path: &str) -> String {
    path.strip_prefix('/').unwrap_or(path).replace('/', "-")
}

/// Validates a caller-supplied mount command. The mount path is its last
/// whitespace-separated token, must be absolute and must not be `/` itself.
/// Has no side effects.
pub fn from_command(line: &str) -> Result<MountSpec> {
    let invocation = Invocation::parse(line).ok_or(ShareError::EmptyCommand)?;
    let last = invocation
        .args
        .last()
        .unwrap_or(&invocation.program)
        .clone();
    if !last.starts_with('/') {
        return Err(ShareError::RelativeMountPath(last));
    }
    let share_name = share_name_for(&last);
    if share_name.is_empty() {
        return Err(ShareError::EmptyShareName(last));
    }
    Ok(MountSpec {
        share_name,
        mount_path: PathBuf::from(last),
        invocation,
    })
}

/// Creates the mount point of an explicit command if it is missing.
pub fn ensure_mount_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        info!(path = %path.display(), "mount path already exists");
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| ShareError::io(path, e))?;
    info!(path = %path.display(), "created mount path");
    Ok(())
}

/// Picks a fresh `<mount_root>/<prefix>-<n>` for `remote` and creates it.
///
/// `create_dir` doubles as the existence check, so a directory that appears
/// between attempts is never reused. Gives up after `max_path_attempts`.
pub fn generate(settings: &Settings, remote: &str, rng: &mut impl Rng) -> Result<MountSpec> {
    check_remote(remote)?;
    let root = &settings.mount_root;
    fs::create_dir_all(root).map_err(|e| ShareError::io(root, e))?;

    for _ in 0..settings.max_path_attempts {
        let n = rng.gen_range(1..=settings.suffix_max.max(1));
        let share_name = format!("{}-{n}", settings.share_prefix);
        let mount_path = root.join(&share_name);
        match fs::create_dir(&mount_path) {
            Ok(()) => {
                info!(path = %mount_path.display(), share = %share_name, "created mount path");
                let invocation = Invocation::new(
                    "mount",
                    [
                        "-t".to_string(),
                        "nfs".to_string(),
                        "-o".to_string(),
                        settings.nfs_options.clone(),
                        remote.to_string(),
                        mount_path.display().to_string(),
                    ],
                );
                return Ok(MountSpec {
                    invocation,
                    mount_path,
                    share_name,
                });
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %mount_path.display(), "taken, retrying");
            }
            Err(e) => return Err(ShareError::io(mount_path, e)),
        }
    }
    Err(ShareError::NamespaceExhausted {
        root: root.clone(),
        attempts: settings.max_path_attempts,
    })
}

/// `host:/export`. Splitting on `:/` keeps bracketed IPv6 hosts intact.
fn check_remote(remote: &str) -> Result<()> {
    match remote.split_once(":/") {
        Some((host, _)) if !host.is_empty() => Ok(()),
        _ => Err(ShareError::BadRemote(remote.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn settings(root: &Path, suffix_max: u32, attempts: u32) -> Settings {
        Settings {
            mount_root: root.to_path_buf(),
            suffix_max,
            max_path_attempts: attempts,
            ..Settings::default()
        }
    }

    #[test]
    fn share_name_is_deterministic() {
        assert_eq!(share_name_for("/mnt/a/b"), "mnt-a-b");
        assert_eq!(share_name_for("/mnt/a/b"), share_name_for("/mnt/a/b"));
        assert_ne!(share_name_for("/mnt/a/b"), share_name_for("/mnt/a/c"));
        assert_eq!(share_name_for("/data"), "data");
    }

    #[test]
    fn command_mode_takes_last_token() {
        let spec =
            from_command("mount -t nfs -o vers=3,proto=tcp srv:/export   /mnt/blob/data ").unwrap();
        assert_eq!(spec.mount_path, PathBuf::from("/mnt/blob/data"));
        assert_eq!(spec.share_name, "mnt-blob-data");
        assert_eq!(spec.invocation.program, "mount");
        assert_eq!(spec.invocation.args.len(), 6);
    }

    #[test]
    fn command_mode_rejects_relative_path() {
        let err = from_command("mount srv:/export mnt/x").unwrap_err();
        assert!(matches!(err, ShareError::RelativeMountPath(p) if p == "mnt/x"));
        assert!(matches!(from_command("  "), Err(ShareError::EmptyCommand)));
    }

    #[test]
    fn command_mode_rejects_root_mount_path() {
        let err = from_command("mount -t nfs h:/e /").unwrap_err();
        assert!(matches!(err, ShareError::EmptyShareName(p) if p == "/"));
    }

    #[test]
    fn remote_accepts_bracketed_ipv6_host() {
        assert!(check_remote("[fd00::1]:/export").is_ok());
        assert!(check_remote("10.0.0.4:/acct/c").is_ok());
        assert!(check_remote("[fd00::1]:export").is_err());
    }

    #[test]
    fn ensure_mount_dir_creates_once() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a/b");
        ensure_mount_dir(&p).unwrap();
        assert!(p.is_dir());
        ensure_mount_dir(&p).unwrap();
    }

    #[test]
    fn generate_skips_existing_paths() {
        let dir = tempfile::tempdir().unwrap();
        for n in 1..=9 {
            if n != 7 {
                fs::create_dir(dir.path().join(format!("nfsv3share-{n}"))).unwrap();
            }
        }
        let s = settings(dir.path(), 9, 10_000);
        let mut rng = StdRng::seed_from_u64(5);
        let spec = generate(&s, "acct.blob.core.windows.net:/acct/container", &mut rng).unwrap();
        assert_eq!(spec.share_name, "nfsv3share-7");
        assert_eq!(spec.mount_path, dir.path().join("nfsv3share-7"));
        assert!(spec.mount_path.is_dir());
        assert_eq!(
            spec.invocation.to_string(),
            format!(
                "mount -t nfs -o sec=sys,vers=3,nolock,proto=tcp acct.blob.core.windows.net:/acct/container {}",
                spec.mount_path.display()
            )
        );
    }

    #[test]
    fn generate_never_picks_taken_suffix() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nfsv3share-5")).unwrap();
        let s = settings(dir.path(), 6, 10_000);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let spec = generate(&s, "h:/e", &mut rng).unwrap();
            assert_ne!(spec.share_name, "nfsv3share-5");
            fs::remove_dir(&spec.mount_path).unwrap();
        }
    }

    #[test]
    fn generate_gives_up_when_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        for n in 1..=3 {
            fs::create_dir(dir.path().join(format!("nfsv3share-{n}"))).unwrap();
        }
        let s = settings(dir.path(), 3, 25);
        let mut rng = StdRng::seed_from_u64(1);
        let err = generate(&s, "h:/e", &mut rng).unwrap_err();
        assert!(matches!(err, ShareError::NamespaceExhausted { attempts: 25, .. }));
    }

    #[test]
    fn generate_validates_remote_first() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let s = settings(&root, 9, 5);
        let mut rng = StdRng::seed_from_u64(1);
        for bad in ["host", "host:export", ":/export"] {
            assert!(matches!(
                generate(&s, bad, &mut rng),
                Err(ShareError::BadRemote(_))
            ));
        }
        assert!(!root.exists());
    }
}
