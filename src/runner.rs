// src/runner.rs

use crate::error::{Result, ShareError};
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// A program plus its arguments, run without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a command line on whitespace; no quoting rules apply.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace().map(str::to_string);
        let program = tokens.next()?;
        Some(Self {
            program,
            args: tokens.collect(),
        })
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Runs `inv` to completion and returns its stdout. A non-zero exit is
    /// an error.
    async fn run(&self, inv: &Invocation) -> Result<String>;
}

pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, inv: &Invocation) -> Result<String> {
        let command = inv.to_string();
        debug!(%command, "exec");
        let out = Command::new(&inv.program)
            .args(&inv.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ShareError::Spawn {
                command: command.clone(),
                source,
            })?;
        if !out.status.success() {
            return Err(ShareError::CommandFailed {
                command,
                status: out.status,
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        info!(%command, "ok");
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}
