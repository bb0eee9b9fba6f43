//! External probing harness invocation.
//!
//! The harness runs every exercise of one language under instrumentation and
//! leaves a raw observation log per exercise under the logs root. We only
//! start it, wait, and judge the exit status.

use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ProbeConfig;
use crate::error::{BindingError, Result};

#[derive(Debug, Clone)]
pub struct ProbeCommand {
    program: String,
    args: Vec<String>,
    verbose_flag: Option<String>,
    timeout: Option<Duration>,
}

impl ProbeCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            verbose_flag: None,
            timeout: None,
        }
    }

    pub fn from_config(config: &ProbeConfig, verbose: bool) -> Self {
        let mut probe =
            Self::new(shellexpand::tilde(&config.command)).with_args(config.args.clone());
        if verbose && !config.verbose_flag.is_empty() {
            probe.verbose_flag = Some(config.verbose_flag.clone());
        }
        if config.timeout_secs > 0 {
            probe = probe.with_timeout(Duration::from_secs(config.timeout_secs));
        }
        probe
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `<program> [args..] [verbose_flag] <lang>`
    pub fn command_line(&self, lang: &str) -> Vec<String> {
        let mut line = vec![self.program.clone()];
        line.extend(self.args.iter().cloned());
        line.extend(self.verbose_flag.iter().cloned());
        line.push(lang.to_string());
        line
    }

    /// Run the harness for `lang`. Spawn errors, a non-zero exit, and an
    /// expired timeout are all [`BindingError::ProbeFailure`].
    pub async fn run(&self, lang: &str) -> Result<()> {
        let line = self.command_line(lang);
        info!(lang, "Probing: {}", line.join(" "));

        let mut cmd = tokio::process::Command::new(&line[0]);
        cmd.args(&line[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| failure(lang, format!("timed out after {:?}", limit)))?,
            None => cmd.output().await,
        }
        .map_err(|e| failure(lang, format!("failed to start {}: {}", self.program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            debug!(lang, "probe: {}", line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last = stderr.lines().rev().find(|l| !l.trim().is_empty());
            let status = match output.status.code() {
                Some(code) => format!("exit status {}", code),
                None => "terminated by signal".to_string(),
            };
            let detail = match last {
                Some(l) => format!("{}: {}", status, l.trim()),
                None => status,
            };
            return Err(failure(lang, detail));
        }
        Ok(())
    }
}

fn failure(lang: &str, detail: String) -> BindingError {
    BindingError::ProbeFailure {
        lang: lang.to_string(),
        detail,
    }
}
