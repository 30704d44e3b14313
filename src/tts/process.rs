//! Supervision of a locally started synthesis engine.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::backend::SpeechBackend;

/// Interval between readiness probes while the engine starts.
const PROBE_INTERVAL: Duration = Duration::from_millis(500);

/// A child engine process, killed when dropped.
pub struct EngineProcess {
    child: Child,
}

impl EngineProcess {
    /// Start `executable` listening on all interfaces at `port`.
    ///
    /// # Errors
    /// Returns an error if the executable cannot be spawned.
    pub fn spawn(executable: &Path, port: u16) -> Result<Self> {
        info!("🚀 Starting engine: {} (port {})", executable.display(), port);

        let child = Command::new(executable)
            .args(["--host", "0.0.0.0", "--port", &port.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start engine {}", executable.display()))?;

        debug!("Engine started with pid {:?}", child.id());
        Ok(Self { child })
    }

    /// Poll `backend` until it answers, the child exits, or `timeout` elapses.
    ///
    /// Returns whether the engine became ready.
    pub async fn wait_ready(&mut self, backend: &dyn SpeechBackend, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    warn!("Engine exited during startup ({})", status);
                    return false;
                }
                Ok(None) => {}
                Err(e) => debug!("Failed to poll engine status: {}", e),
            }

            match backend.probe().await {
                Ok(()) => {
                    info!("✅ Engine is ready");
                    return true;
                }
                Err(e) => debug!("Engine not ready yet: {}", e),
            }

            if tokio::time::Instant::now() >= deadline {
                warn!("Engine did not answer within {:?}", timeout);
                return false;
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    /// Terminate the engine and wait for it to exit.
    pub async fn shutdown(mut self) {
        match self.child.try_wait() {
            Ok(Some(_)) => debug!("Engine already exited"),
            _ => {
                info!("Stopping engine...");
                if let Err(e) = self.child.kill().await {
                    warn!("Failed to stop engine: {}", e);
                }
            }
        }
    }
}
