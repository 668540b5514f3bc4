//! Supervisor for the single proxy daemon process.
//!
//! # States
//! ```text
//! STOPPED --start()--> RUNNING
//! RUNNING --stop()---> STOPPED   (SIGTERM, grace period, then SIGKILL)
//! RUNNING --exit-----> STOPPED   (observed lazily via try_wait)
//! ```
//!
//! All transitions hold the slot mutex for their whole duration, so two
//! concurrent requests can never leave two live children or release one
//! child twice.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::config::DaemonConfig;
use crate::daemon::output::forward_output;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to launch {}: {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of a successful `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: u32 },
    AlreadyRunning { pid: u32 },
}

impl StartOutcome {
    pub fn pid(&self) -> u32 {
        match *self {
            Self::Started { pid } | Self::AlreadyRunning { pid } => pid,
        }
    }
}

/// How a `stop` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No handle was held.
    NotRunning,
    /// The process had already exited; its handle was reaped.
    Exited,
    /// The process exited within the grace period.
    Graceful,
    /// The process was killed after the grace period.
    Forced,
}

/// Argv of the daemon: `<binary> <args...> <config_path>`.
#[derive(Debug, Clone)]
pub struct DaemonCommand {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub config_path: PathBuf,
}

impl DaemonCommand {
    pub fn from_config(daemon: &DaemonConfig, config_path: PathBuf) -> Self {
        Self {
            binary: daemon.binary.clone(),
            args: daemon.args.clone(),
            config_path,
        }
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.args)
            .arg(&self.config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

struct RunningDaemon {
    child: Child,
    pid: u32,
}

impl RunningDaemon {
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Ask the process to exit.
    #[cfg(unix)]
    fn terminate(&mut self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        match i32::try_from(self.pid) {
            Ok(raw) if raw > 0 => {
                if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
                    tracing::warn!(pid = self.pid, error = %e, "Failed to send SIGTERM");
                }
            }
            _ => self.force(),
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) {
        self.force();
    }

    fn force(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::warn!(pid = self.pid, error = %e, "Failed to kill daemon");
        }
    }
}

/// Owner of the daemon process handle.
pub struct Supervisor {
    command: DaemonCommand,
    grace: Duration,
    slot: Mutex<Option<RunningDaemon>>,
}

impl Supervisor {
    pub fn new(command: DaemonCommand, grace: Duration) -> Self {
        Self {
            command,
            grace,
            slot: Mutex::new(None),
        }
    }

    pub fn command(&self) -> &DaemonCommand {
        &self.command
    }

    /// Launch the daemon unless it is already running.
    pub async fn start(&self) -> Result<StartOutcome, SupervisorError> {
        let mut slot = self.slot.lock().await;
        self.start_locked(&mut slot)
    }

    /// Stop the daemon. Never fails; the handle is always released.
    pub async fn stop(&self) -> StopOutcome {
        let mut slot = self.slot.lock().await;
        self.stop_locked(&mut slot).await
    }

    /// Stop then start within one critical section.
    pub async fn restart(&self) -> Result<StartOutcome, SupervisorError> {
        let mut slot = self.slot.lock().await;
        self.stop_locked(&mut slot).await;
        self.start_locked(&mut slot)
    }

    /// A handle is held and its process has not exited.
    pub async fn is_running(&self) -> bool {
        let mut slot = self.slot.lock().await;
        slot.as_mut().is_some_and(RunningDaemon::is_alive)
    }

    /// Pid of the live daemon, if any.
    pub async fn pid(&self) -> Option<u32> {
        let mut slot = self.slot.lock().await;
        let daemon = slot.as_mut()?;
        daemon.is_alive().then_some(daemon.pid)
    }

    fn start_locked(&self, slot: &mut Option<RunningDaemon>) -> Result<StartOutcome, SupervisorError> {
        if let Some(daemon) = slot.as_mut() {
            if daemon.is_alive() {
                tracing::debug!(pid = daemon.pid, "Daemon already running");
                return Ok(StartOutcome::AlreadyRunning { pid: daemon.pid });
            }
        }
        *slot = None;

        let mut child = match self.command.build().spawn() {
            Ok(child) => child,
            Err(source) => {
                tracing::error!(
                    binary = %self.command.binary.display(),
                    error = %source,
                    "Failed to start daemon"
                );
                metrics::record_daemon_start(false);
                metrics::set_daemon_running(false);
                return Err(SupervisorError::Spawn {
                    binary: self.command.binary.clone(),
                    source,
                });
            }
        };

        let pid = child.id().unwrap_or_default();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, pid, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, pid, "stderr"));
        }

        tracing::info!(
            pid,
            config = %self.command.config_path.display(),
            "Daemon started"
        );
        metrics::record_daemon_start(true);
        metrics::set_daemon_running(true);

        *slot = Some(RunningDaemon { child, pid });
        Ok(StartOutcome::Started { pid })
    }

    async fn stop_locked(&self, slot: &mut Option<RunningDaemon>) -> StopOutcome {
        let Some(mut daemon) = slot.take() else {
            return StopOutcome::NotRunning;
        };
        metrics::set_daemon_running(false);

        if !daemon.is_alive() {
            tracing::info!(pid = daemon.pid, "Daemon had already exited");
            metrics::record_daemon_stop(StopOutcome::Exited);
            return StopOutcome::Exited;
        }

        daemon.terminate();

        let outcome = match tokio::time::timeout(self.grace, daemon.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(pid = daemon.pid, status = %status, "Daemon stopped");
                StopOutcome::Graceful
            }
            Ok(Err(e)) => {
                tracing::warn!(pid = daemon.pid, error = %e, "Waiting for daemon failed, killing");
                self.kill(&mut daemon).await;
                StopOutcome::Forced
            }
            Err(_) => {
                tracing::warn!(
                    pid = daemon.pid,
                    grace = ?self.grace,
                    "Daemon ignored SIGTERM, killing"
                );
                self.kill(&mut daemon).await;
                StopOutcome::Forced
            }
        };
        metrics::record_daemon_stop(outcome);
        outcome
    }

    async fn kill(&self, daemon: &mut RunningDaemon) {
        if let Err(e) = daemon.child.kill().await {
            tracing::error!(pid = daemon.pid, error = %e, "Failed to kill daemon");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    use std::path::Path;

    fn shell(script: &str, config_path: &Path) -> DaemonCommand {
        DaemonCommand {
            binary: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), script.into(), "daemon".into()],
            config_path: config_path.to_path_buf(),
        }
    }

    fn process_exists(pid: u32) -> bool {
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }

    #[tokio::test]
    async fn test_double_start_keeps_one_child() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = Supervisor::new(
            shell("exec sleep 30", &dir.path().join("running.json")),
            Duration::from_secs(3),
        );

        let first = supervisor.start().await.unwrap();
        let second = supervisor.start().await.unwrap();

        assert!(matches!(first, StartOutcome::Started { .. }));
        assert_eq!(second, StartOutcome::AlreadyRunning { pid: first.pid() });
        assert_eq!(supervisor.pid().await, Some(first.pid()));
        assert!(supervisor.is_running().await);

        assert_eq!(supervisor.stop().await, StopOutcome::Graceful);
        assert!(!process_exists(first.pid()));
    }

    #[tokio::test]
    async fn test_stop_force_kills_stubborn_child() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = Supervisor::new(
            shell("trap '' TERM; while :; do sleep 1; done", &dir.path().join("running.json")),
            Duration::from_millis(300),
        );

        let pid = supervisor.start().await.unwrap().pid();
        // Give the shell time to install its trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(supervisor.stop().await, StopOutcome::Forced);
        assert!(!supervisor.is_running().await);
        assert_eq!(supervisor.pid().await, None);
        assert!(!process_exists(pid));
    }

    #[tokio::test]
    async fn test_restart_replaces_child() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = Supervisor::new(
            shell("exec sleep 30", &dir.path().join("running.json")),
            Duration::from_secs(3),
        );

        let old = supervisor.start().await.unwrap().pid();
        let new = supervisor.restart().await.unwrap();

        assert!(matches!(new, StartOutcome::Started { .. }));
        assert_ne!(new.pid(), old);
        assert!(!process_exists(old));
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_launch_failure_stays_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = Supervisor::new(
            DaemonCommand {
                binary: dir.path().join("no-such-binary"),
                args: vec!["run".into(), "-config".into()],
                config_path: dir.path().join("running.json"),
            },
            Duration::from_secs(3),
        );

        assert!(matches!(supervisor.start().await, Err(SupervisorError::Spawn { .. })));
        assert!(!supervisor.is_running().await);
        assert_eq!(supervisor.stop().await, StopOutcome::NotRunning);
    }

    #[tokio::test]
    async fn test_crashed_child_is_reaped_and_restartable() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = Supervisor::new(
            shell("exit 3", &dir.path().join("running.json")),
            Duration::from_secs(3),
        );

        supervisor.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!supervisor.is_running().await);

        assert!(matches!(supervisor.start().await.unwrap(), StartOutcome::Started { .. }));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(supervisor.stop().await, StopOutcome::Exited);
    }

    #[tokio::test]
    async fn test_config_path_is_last_argument() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("running.json");
        let supervisor = Supervisor::new(
            shell("printf '%s' \"$1\" > \"$1.seen\"; exec sleep 30", &config_path),
            Duration::from_secs(3),
        );

        supervisor.start().await.unwrap();
        let marker = dir.path().join("running.json.seen");
        for _ in 0..50 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        supervisor.stop().await;

        let seen = std::fs::read_to_string(marker).unwrap();
        assert_eq!(seen, config_path.display().to_string());
    }
}
