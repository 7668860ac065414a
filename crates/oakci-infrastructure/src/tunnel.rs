//! Tunnel subprocess supervision.
//!
//! Starts the configured tunnel command in its own process group, scans
//! its stdout line by line for the public URL, and tears the whole
//! process tree down on stop (SIGTERM, then SIGKILL after a grace
//! period).

use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use oakci_domain::error::{Error, Result};
use oakci_domain::value_objects::TunnelConfig;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Status snapshot for the tunnel routes.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TunnelStatus {
    pub running: bool,
    pub url: Option<String>,
}

struct TunnelProcess {
    child: Child,
    url: String,
}

/// Supervises at most one tunnel subprocess.
pub struct TunnelSupervisor {
    process: Mutex<Option<TunnelProcess>>,
}

impl TunnelSupervisor {
    /// Builds an idle supervisor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            process: Mutex::new(None),
        }
    }

    /// Starts the tunnel and waits for the public URL to appear on
    /// stdout. Returns the URL.
    pub async fn start(&self, config: &TunnelConfig, port: u16) -> Result<String> {
        if self.status().running {
            return Err(Error::conflict("tunnel already running"));
        }

        let command_line = config.command.replace("{port}", &port.to_string());
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::config("tunnel command is empty"))?;
        let args: Vec<&str> = parts.collect();

        let url_pattern = Regex::new(&config.url_pattern)
            .map_err(|e| Error::config(format!("invalid tunnel url_pattern: {e}")))?;

        let mut command = Command::new(program);
        command
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        // New process group so shutdown can terminate the whole subtree.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| Error::process(format!("failed to spawn tunnel '{program}': {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::process("tunnel stdout not captured"))?;

        // Line-by-line scan until the URL shows up or the timeout fires.
        let url = tokio::time::timeout(
            Duration::from_secs(config.start_timeout_seconds),
            async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(line = %line, "tunnel output");
                    if let Some(captures) = url_pattern.captures(&line) {
                        if let Some(url) = captures.get(1) {
                            return Some(url.as_str().to_owned());
                        }
                    }
                }
                None
            },
        )
        .await;

        match url {
            Ok(Some(url)) => {
                info!(url = %url, "tunnel established");
                *self.process.lock().expect("tunnel lock") = Some(TunnelProcess {
                    child,
                    url: url.clone(),
                });
                Ok(url)
            }
            Ok(None) => {
                let _ = child.start_kill();
                Err(Error::process("tunnel exited before reporting a URL"))
            }
            Err(_) => {
                let _ = child.start_kill();
                Err(Error::timeout(format!(
                    "tunnel did not report a URL within {}s",
                    config.start_timeout_seconds
                )))
            }
        }
    }

    /// Stops the tunnel: SIGTERM to the process group, wait, SIGKILL
    /// fallback. Returns the URL that was being served.
    pub async fn stop(&self) -> Result<Option<String>> {
        let Some(mut process) = self.process.lock().expect("tunnel lock").take() else {
            return Ok(None);
        };
        let url = process.url.clone();

        #[cfg(unix)]
        {
            if let Some(pid) = process.child.id() {
                let group = nix::unistd::Pid::from_raw(-(pid as i32));
                if let Err(e) = nix::sys::signal::kill(group, nix::sys::signal::Signal::SIGTERM) {
                    debug!(error = %e, "SIGTERM to tunnel group failed");
                }
            }
        }

        match tokio::time::timeout(Duration::from_secs(5), process.child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                warn!("tunnel ignored SIGTERM, killing");
                let _ = process.child.kill().await;
            }
        }
        info!(url = %url, "tunnel stopped");
        Ok(Some(url))
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TunnelStatus {
        let guard = self.process.lock().expect("tunnel lock");
        match guard.as_ref() {
            Some(process) => TunnelStatus {
                running: true,
                url: Some(process.url.clone()),
            },
            None => TunnelStatus::default(),
        }
    }
}

impl Default for TunnelSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url_pattern_matches_structured_output() {
        let config = TunnelConfig::default();
        let pattern = Regex::new(&config.url_pattern).expect("pattern");
        let captures = pattern
            .captures("t=2026 lvl=info msg=started url=https://abc.ngrok.io")
            .expect("captures");
        assert_eq!(
            captures.get(1).map(|m| m.as_str()),
            Some("https://abc.ngrok.io")
        );
    }

    #[tokio::test]
    async fn stop_without_start_is_a_noop() {
        let supervisor = TunnelSupervisor::new();
        assert_eq!(supervisor.stop().await.expect("stop"), None);
    }
}
