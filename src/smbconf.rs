// src/smbconf.rs
//
// Line-preserving store for the SMB export configuration. The file is parsed
// once into typed lines; untouched lines keep their raw text so saving after
// an append+delete cycle reproduces the original bytes.

use crate::error::{Result, ShareError};
use nix::fcntl::{Flock, FlockArg};
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const INDENT: &str = "   ";

#[derive(Debug, Clone, PartialEq, Eq)]
enum LineKind {
    Header(String),
    Attribute { key: String, value: String },
    Other,
}

#[derive(Debug, Clone)]
struct Line {
    raw: String,
    kind: LineKind,
}

impl Line {
    fn classify(raw: &str) -> Self {
        let t = raw.trim();
        let kind = if t.starts_with('[') && t.ends_with(']') && t.len() >= 2 {
            LineKind::Header(t[1..t.len() - 1].to_string())
        } else if t.starts_with('#') || t.starts_with(';') {
            LineKind::Other
        } else if let Some((k, v)) = t.split_once('=') {
            LineKind::Attribute {
                key: k.trim().to_string(),
                value: v.trim().to_string(),
            }
        } else {
            LineKind::Other
        };
        Self {
            raw: raw.to_string(),
            kind,
        }
    }

    fn header(name: &str) -> Self {
        Self::classify(&format!("[{name}]"))
    }

    fn attribute(key: &str, value: &str) -> Self {
        Self::classify(&format!("{INDENT}{key} = {value}"))
    }

    fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }
}

/// Inclusive, zero-based line range of one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub start: usize,
    pub end: usize,
}

enum Scan {
    Outside,
    InsideTarget { start: usize },
}

#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    lines: Vec<Line>,
    trailing_newline: bool,
}

impl ConfigFile {
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);
        Self {
            lines: body.split('\n').map(Line::classify).collect(),
            trailing_newline,
        }
    }

    /// A missing file reads as empty.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ShareError::io(path, e)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render()).map_err(|e| ShareError::io(path, e))
    }

    pub fn render(&self) -> String {
        let mut out = self
            .lines
            .iter()
            .map(|l| l.raw.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Locates the last section headed `[name]`. A section runs until the
    /// line before the next header of any name, or to end of file.
    pub fn find_last_block(&self, name: &str) -> Option<BlockRange> {
        let mut found = None;
        let mut state = Scan::Outside;
        for (i, line) in self.lines.iter().enumerate() {
            let LineKind::Header(h) = &line.kind else {
                continue;
            };
            if let Scan::InsideTarget { start } = state {
                found = Some(BlockRange { start, end: i - 1 });
                state = Scan::Outside;
            }
            if h == name {
                state = Scan::InsideTarget { start: i };
            }
        }
        if let Scan::InsideTarget { start } = state {
            found = Some(BlockRange {
                start,
                end: self.lines.len() - 1,
            });
        }
        found
    }

    /// Value of the first `key = value` line inside `range`. Keys compare
    /// case-insensitively, as the SMB service reads them.
    pub fn read_attribute(&self, range: BlockRange, key: &str) -> Option<&str> {
        self.lines
            .get(range.start..=range.end)?
            .iter()
            .find_map(|l| match &l.kind {
                LineKind::Attribute { key: k, value } if k.eq_ignore_ascii_case(key) => {
                    Some(value.as_str())
                }
                _ => None,
            })
    }

    pub fn delete_range(&mut self, range: BlockRange) {
        if range.start > range.end || range.end >= self.lines.len() {
            return;
        }
        self.lines.drain(range.start..=range.end);
    }

    pub fn append_block<'a, I>(&mut self, name: &str, attributes: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.lines.push(Line::header(name));
        self.lines
            .extend(attributes.into_iter().map(|(k, v)| Line::attribute(k, v)));
        self.trailing_newline = true;
    }

    /// Adds `key = value` to `section` unless the key is already present.
    /// Returns whether the file changed.
    pub fn ensure_attribute(&mut self, section: &str, key: &str, value: &str) -> bool {
        let Some(range) = self.find_last_block(section) else {
            self.append_block(section, [(key, value)]);
            return true;
        };
        if self.read_attribute(range, key).is_some() {
            return false;
        }
        let at = (range.start..=range.end)
            .rev()
            .find(|&i| !self.lines[i].is_blank())
            .unwrap_or(range.start);
        self.lines.insert(at + 1, Line::attribute(key, value));
        true
    }
}

/// Exclusive advisory lock held across a load/modify/save/reload cycle.
pub struct ConfigLock {
    path: PathBuf,
    _lock: Flock<File>,
}

impl ConfigLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|e| ShareError::io(p, e))?;
        }
        let file = File::options()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| ShareError::io(path, e))?;
        debug!(path = %path.display(), "waiting for config lock");
        let lock = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| {
            ShareError::Lock {
                path: path.to_path_buf(),
                errno,
            }
        })?;
        info!(path = %path.display(), "config lock held");
        Ok(Self {
            path: path.to_path_buf(),
            _lock: lock,
        })
    }
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "config lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_X: &str = "\
[global]
   workgroup = WORKGROUP
[X]
   path = /mnt/first
   browseable = yes
[other]
   path = /mnt/other
   comment = unrelated
   read only = no
   guest ok = yes
   browseable = yes
   ; keep me
[X]
   comment = second
   path = /mnt/second
   read only = no
   guest ok = yes
[tail]
   path = /mnt/tail
";

    #[test]
    fn last_duplicate_wins() {
        let cfg = ConfigFile::parse(TWO_X);
        let r = cfg.find_last_block("X").unwrap();
        assert_eq!(r, BlockRange { start: 12, end: 16 });
        assert_eq!(cfg.read_attribute(r, "path"), Some("/mnt/second"));
    }

    #[test]
    fn block_at_end_of_file_is_closed_at_last_line() {
        let cfg = ConfigFile::parse(TWO_X);
        let r = cfg.find_last_block("tail").unwrap();
        assert_eq!(r, BlockRange { start: 17, end: 18 });

        let no_newline = ConfigFile::parse("[global]\n[a]\n   path = /mnt/a");
        assert_eq!(
            no_newline.find_last_block("a"),
            Some(BlockRange { start: 1, end: 2 })
        );
    }

    #[test]
    fn adjacent_duplicates_close_and_reopen() {
        let cfg = ConfigFile::parse("[a]\n   path = /one\n[a]\n   path = /two\n");
        let r = cfg.find_last_block("a").unwrap();
        assert_eq!(r, BlockRange { start: 2, end: 3 });
        assert_eq!(cfg.read_attribute(r, "path"), Some("/two"));
    }

    #[test]
    fn header_match_is_exact() {
        let cfg = ConfigFile::parse("[ab]\n   path = /ab\n[a b]\n");
        assert_eq!(cfg.find_last_block("a"), None);
        assert!(cfg.find_last_block("ab").is_some());
    }

    #[test]
    fn stray_brackets_do_not_open_sections() {
        let cfg = ConfigFile::parse("[a]\n   note = [half\n   path = /a\n");
        let r = cfg.find_last_block("a").unwrap();
        assert_eq!(r.end, 2);
        assert_eq!(cfg.read_attribute(r, "PATH"), Some("/a"));
    }

    #[test]
    fn read_attribute_splits_on_first_equals() {
        let cfg = ConfigFile::parse("[a]\n  dfree command = /bin/x --k=v\n");
        let r = cfg.find_last_block("a").unwrap();
        assert_eq!(cfg.read_attribute(r, "dfree command"), Some("/bin/x --k=v"));
        assert_eq!(cfg.read_attribute(r, "path"), None);
    }

    #[test]
    fn delete_keeps_surrounding_lines() {
        let mut cfg = ConfigFile::parse(TWO_X);
        let r = cfg.find_last_block("other").unwrap();
        cfg.delete_range(r);
        let out = cfg.render();
        assert!(!out.contains("/mnt/other"));
        assert!(out.contains("[X]\n   path = /mnt/first\n   browseable = yes\n[X]\n"));
        assert!(out.ends_with("[tail]\n   path = /mnt/tail\n"));
    }

    #[test]
    fn append_then_delete_is_byte_identical() {
        for original in ["[global]\n   workgroup = W\n", "[global]\n   workgroup = W", ""] {
            let mut cfg = ConfigFile::parse(original);
            cfg.append_block("s", [("path", "/mnt/s"), ("browseable", "yes")]);
            let r = cfg.find_last_block("s").unwrap();
            cfg.delete_range(r);
            assert_eq!(cfg.render().trim_end(), original.trim_end());
        }
        let mut cfg = ConfigFile::parse(TWO_X);
        cfg.append_block("s", [("path", "/mnt/s")]);
        let r = cfg.find_last_block("s").unwrap();
        cfg.delete_range(r);
        assert_eq!(cfg.render(), TWO_X);
    }

    #[test]
    fn ensure_attribute_never_duplicates() {
        let mut cfg = ConfigFile::parse("[global]\n   workgroup = W\n\n[s]\n   path = /s\n");
        assert!(cfg.ensure_attribute("global", "map to guest", "bad user"));
        assert!(!cfg.ensure_attribute("global", "Map To Guest", "never"));
        assert_eq!(
            cfg.render(),
            "[global]\n   workgroup = W\n   map to guest = bad user\n\n[s]\n   path = /s\n"
        );

        let mut empty = ConfigFile::default();
        assert!(empty.ensure_attribute("global", "k", "v"));
        assert_eq!(empty.render(), "[global]\n   k = v\n");
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ConfigFile::load(&dir.path().join("absent.conf")).unwrap();
        assert_eq!(cfg.render(), "");
    }

    #[test]
    fn lock_can_be_reacquired_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("lock/conf.lock");
        drop(ConfigLock::acquire(&p).unwrap());
        let _again = ConfigLock::acquire(&p).unwrap();
        assert!(p.exists());
    }
}
