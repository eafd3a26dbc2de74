//! Producer process lifecycle: spawn, handshake, terminate.

use std::fs::File;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use gpmwatch_core::backoff::RetryPlan;
use gpmwatch_core::error::HandshakeError;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::tracker::paths;
use crate::tracker::signals::SignalBank;

/// How long the producer gets to exit after SIGTERM before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// How to launch the producer.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Path to the `gpm-track` binary.
    pub binary: PathBuf,
    /// Terminal device bound to the producer's stdin.
    pub tty: PathBuf,
    /// Explicit channel name; derived from the producer pid when `None`.
    pub shm_name: Option<String>,
    /// Directory holding shared-memory objects.
    pub shm_dir: PathBuf,
}

/// Owns one running producer process.
///
/// The process is always asked to stop: explicitly via [`terminate`], or
/// with SIGKILL when the child handle drops (`kill_on_drop`) if
/// `terminate` never ran.
///
/// [`terminate`]: Supervisor::terminate
pub struct Supervisor {
    child: Child,
    pid: u32,
    shm_path: PathBuf,
    terminated: bool,
}

impl Supervisor {
    /// Spawn the producer with `--pid <our pid> [--shm <name>]`.
    ///
    /// Takes the reserved signal bank so the producer can never signal us
    /// while a bank signal still has its default disposition.
    pub fn spawn(config: &ProducerConfig, _bank: &SignalBank) -> Result<Self> {
        let tty = File::open(&config.tty)
            .with_context(|| format!("Failed to open terminal device {:?}", config.tty))?;

        let mut cmd = Command::new(&config.binary);
        cmd.arg("--pid").arg(std::process::id().to_string());
        if let Some(name) = &config.shm_name {
            cmd.arg("--shm").arg(name);
        }
        cmd.stdin(Stdio::from(tty)).kill_on_drop(true);

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {:?}", config.binary))?;
        let pid = child
            .id()
            .context("gpm-track exited before its pid could be read")?;

        let name = config
            .shm_name
            .clone()
            .unwrap_or_else(|| paths::default_shm_name(pid));
        let shm_path = config.shm_dir.join(name);

        info!("Started gpm-track (pid {}), waiting for {:?}", pid, shm_path);

        Ok(Self {
            child,
            pid,
            shm_path,
            terminated: false,
        })
    }

    #[cfg(test)]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Path where the producer's channel is expected.
    #[cfg(test)]
    pub fn shm_path(&self) -> &std::path::Path {
        &self.shm_path
    }

    /// Wait for the producer to create its channel.
    ///
    /// Each delay of `plan` is spent waiting on the child, so a crash ends
    /// the handshake immediately instead of after the remaining retries.
    pub async fn handshake(&mut self, plan: &RetryPlan) -> Result<PathBuf, HandshakeError> {
        let tries = plan.len();

        for (attempt, delay) in plan.durations().enumerate() {
            if paths::is_channel_ready(&self.shm_path) {
                info!("gpm-track channel ready after {} check(s)", attempt + 1);
                return Ok(self.shm_path.clone());
            }

            debug!(
                "Channel not ready (check {}/{}), waiting {:?}",
                attempt + 1,
                tries,
                delay
            );

            match timeout(delay, self.child.wait()).await {
                Ok(Ok(status)) => {
                    return Err(HandshakeError::Crashed {
                        code: status.code(),
                        status,
                    });
                }
                Ok(Err(e)) => return Err(HandshakeError::Wait(e)),
                Err(_) => {
                    // Still running
                }
            }
        }

        Err(HandshakeError::ChannelNeverCreated {
            path: self.shm_path.clone(),
        })
    }

    /// Wait for the producer to exit on its own.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Check if the producer has exited without blocking.
    #[cfg(test)]
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Stop the producer: SIGTERM, then SIGKILL after a grace period.
    ///
    /// Only the first call does anything. Failures are logged, never
    /// returned, so shutdown always completes.
    pub async fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!("gpm-track already exited ({})", status);
                return;
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to check gpm-track status: {}", e),
        }

        // SAFETY: kill(2) with a pid we spawned and have not reaped yet
        // (try_wait above returned None), so it cannot have been reused.
        if unsafe { libc::kill(self.pid as libc::pid_t, libc::SIGTERM) } != 0 {
            warn!(
                "Failed to send SIGTERM to gpm-track (pid {}): {}",
                self.pid,
                std::io::Error::last_os_error()
            );
        }

        match timeout(TERMINATE_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => info!("gpm-track exited ({})", status),
            Ok(Err(e)) => warn!("Failed to wait on gpm-track: {}", e),
            Err(_) => {
                warn!(
                    "gpm-track still running {:?} after SIGTERM, killing",
                    TERMINATE_GRACE
                );
                if let Err(e) = self.child.kill().await {
                    warn!("Failed to kill gpm-track: {}", e);
                }
            }
        }
    }
}
