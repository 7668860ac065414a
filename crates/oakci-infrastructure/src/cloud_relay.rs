//! Cloud relay client.
//!
//! Step-by-step flow: scaffold the worker project, install dependencies
//! with the configured package manager, check the deploy CLI's auth,
//! deploy, persist the relay settings, and hold a WebSocket connection to
//! the deployed relay. Each step reports its own failure phase so the
//! route can return a structured error.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;

use futures::{SinkExt, StreamExt};
use oakci_domain::error::{Error, Result};
use oakci_domain::value_objects::CloudRelayConfig;
use tokio::process::Command;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Worker entry script written by the scaffold step.
const WORKER_SCRIPT: &str = r#"export default {
  async fetch(request, env) {
    if (request.headers.get("Upgrade") === "websocket") {
      const pair = new WebSocketPair();
      const [client, server] = Object.values(pair);
      server.accept();
      server.addEventListener("message", (event) => server.send(event.data));
      return new Response(null, { status: 101, webSocket: client });
    }
    return new Response("oak-ci relay", { status: 200 });
  },
};
"#;

/// A phase of the relay start flow, carried in structured errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayPhase {
    Scaffold,
    Install,
    AuthCheck,
    Deploy,
    Connect,
}

/// A relay failure with its phase and a suggestion for the operator.
#[derive(Debug)]
pub struct RelayError {
    pub phase: RelayPhase,
    pub error: Error,
    pub suggestion: Option<String>,
}

impl RelayError {
    fn new(phase: RelayPhase, error: Error, suggestion: Option<&str>) -> Self {
        Self {
            phase,
            error,
            suggestion: suggestion.map(str::to_owned),
        }
    }
}

/// Status snapshot for the relay routes.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RelayStatus {
    pub connected: bool,
    pub relay_url: Option<String>,
    pub scaffolded: bool,
}

/// Cloud relay lifecycle manager.
pub struct CloudRelayClient {
    scaffold_dir: PathBuf,
    connection: Mutex<Option<CancellationToken>>,
    relay_url: Mutex<Option<String>>,
}

impl CloudRelayClient {
    /// Builds the client; `scaffold_dir` is `.oak/ci/cloud-relay/`.
    #[must_use]
    pub fn new(scaffold_dir: PathBuf) -> Self {
        Self {
            scaffold_dir,
            connection: Mutex::new(None),
            relay_url: Mutex::new(None),
        }
    }

    /// Preflight: report which steps have already happened.
    #[must_use]
    pub fn preflight(&self) -> RelayStatus {
        RelayStatus {
            connected: self.status().connected,
            relay_url: self.relay_url.lock().expect("relay url lock").clone(),
            scaffolded: self.scaffold_dir.join("wrangler.toml").exists(),
        }
    }

    /// Step 1: write the worker scaffold files.
    pub fn scaffold(&self, config: &CloudRelayConfig) -> std::result::Result<(), RelayError> {
        let write = || -> Result<()> {
            std::fs::create_dir_all(self.scaffold_dir.join("src"))?;
            std::fs::write(self.scaffold_dir.join("src/index.js"), WORKER_SCRIPT)?;
            std::fs::write(
                self.scaffold_dir.join("wrangler.toml"),
                format!(
                    "name = \"{}\"\nmain = \"src/index.js\"\ncompatibility_date = \"2026-01-01\"\n",
                    config.worker_name
                ),
            )?;
            std::fs::write(
                self.scaffold_dir.join("package.json"),
                format!(
                    "{{\n  \"name\": \"{}\",\n  \"private\": true,\n  \"devDependencies\": {{ \"wrangler\": \"^3\" }}\n}}\n",
                    config.worker_name
                ),
            )?;
            Ok(())
        };
        write().map_err(|e| {
            RelayError::new(RelayPhase::Scaffold, e, Some("check directory permissions"))
        })?;
        info!(dir = %self.scaffold_dir.display(), "relay worker scaffolded");
        Ok(())
    }

    /// Step 2: package manager install in the scaffold directory.
    pub async fn install(
        &self,
        config: &CloudRelayConfig,
    ) -> std::result::Result<(), RelayError> {
        run_step(
            &config.package_manager,
            &["install"],
            &self.scaffold_dir,
            RelayPhase::Install,
            Some("ensure the package manager is installed and on PATH"),
        )
        .await
    }

    /// Step 3: deploy CLI auth check (`wrangler whoami` style).
    pub async fn check_auth(
        &self,
        config: &CloudRelayConfig,
    ) -> std::result::Result<(), RelayError> {
        run_step(
            &config.deploy_cli,
            &["whoami"],
            &self.scaffold_dir,
            RelayPhase::AuthCheck,
            Some("log in with the deploy CLI first"),
        )
        .await
    }

    /// Step 4: deploy the worker.
    pub async fn deploy(&self, config: &CloudRelayConfig) -> std::result::Result<(), RelayError> {
        run_step(
            &config.deploy_cli,
            &["deploy"],
            &self.scaffold_dir,
            RelayPhase::Deploy,
            Some("inspect the deploy CLI output in the daemon log"),
        )
        .await
    }

    /// Step 5: open the WebSocket to the relay and hold it until
    /// disconnect. Returns once the connection is established.
    pub async fn connect(&self, relay_url: &str, token: Option<&str>) -> std::result::Result<(), RelayError> {
        let mut url = relay_url.to_owned();
        if let Some(token) = token {
            let separator = if url.contains('?') { '&' } else { '?' };
            url = format!("{url}{separator}token={token}");
        }

        let (stream, _) = tokio_tungstenite::connect_async(&url).await.map_err(|e| {
            RelayError::new(
                RelayPhase::Connect,
                Error::network(format!("relay connect failed: {e}")),
                Some("verify the relay URL and that the worker is deployed"),
            )
        })?;
        info!(url = %relay_url, "relay connected");

        let cancel = CancellationToken::new();
        let holder = cancel.clone();
        *self.relay_url.lock().expect("relay url lock") = Some(relay_url.to_owned());
        *self.connection.lock().expect("relay connection lock") = Some(cancel);

        // Hold the socket in a background task; a ping keeps it warm.
        tokio::spawn(async move {
            let (mut sink, mut source) = stream.split();
            let mut ping = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                tokio::select! {
                    () = holder.cancelled() => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    _ = ping.tick() => {
                        if sink.send(Message::Ping(Vec::new())).await.is_err() {
                            warn!("relay ping failed, connection closed");
                            break;
                        }
                    }
                    message = source.next() => {
                        match message {
                            Some(Ok(message)) => debug!(?message, "relay message"),
                            Some(Err(e)) => {
                                warn!(error = %e, "relay stream error");
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }
            debug!("relay connection task ended");
        });
        Ok(())
    }

    /// Drops the relay connection.
    pub fn disconnect(&self) {
        if let Some(cancel) = self.connection.lock().expect("relay connection lock").take() {
            cancel.cancel();
            info!("relay disconnected");
        }
        *self.relay_url.lock().expect("relay url lock") = None;
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> RelayStatus {
        let connected = self
            .connection
            .lock()
            .expect("relay connection lock")
            .as_ref()
            .is_some_and(|cancel| !cancel.is_cancelled());
        RelayStatus {
            connected,
            relay_url: self.relay_url.lock().expect("relay url lock").clone(),
            scaffolded: self.scaffold_dir.join("wrangler.toml").exists(),
        }
    }
}

async fn run_step(
    program: &str,
    args: &[&str],
    cwd: &Path,
    phase: RelayPhase,
    suggestion: Option<&str>,
) -> std::result::Result<(), RelayError> {
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| {
            RelayError::new(
                phase,
                Error::process(format!("failed to run {program}: {e}")),
                suggestion,
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RelayError::new(
            phase,
            Error::process(format!(
                "{program} {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )),
            suggestion,
        ));
    }
    debug!(program, ?args, "relay step succeeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_writes_worker_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = CloudRelayClient::new(dir.path().join("cloud-relay"));
        assert!(!client.preflight().scaffolded);

        client
            .scaffold(&CloudRelayConfig::default())
            .expect("scaffold");
        assert!(client.preflight().scaffolded);

        let wrangler = std::fs::read_to_string(dir.path().join("cloud-relay/wrangler.toml"))
            .expect("wrangler.toml");
        assert!(wrangler.contains("oak-ci-relay"));
        assert!(dir.path().join("cloud-relay/src/index.js").exists());
    }

    #[test]
    fn disconnect_without_connect_is_quiet() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = CloudRelayClient::new(dir.path().to_path_buf());
        client.disconnect();
        assert!(!client.status().connected);
    }
}
