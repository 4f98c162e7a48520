// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor for the local agent runtime process.
//!
//! States run `absent → starting → healthy → stopped`. A runtime that is
//! already answering its health probe when `start` runs is adopted as
//! externally owned and never signalled.
//!
//! One-shot commands use an adopt-only supervisor: they exit as soon as the
//! command finishes, so a runtime they spawned would be left without an owner.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;

use crate::health;
use crate::registry::{Registry, RegistryError};

/// Bound on waiting for an owned runtime to exit during `restart`.
const RESTART_EXIT_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("runtime exited before becoming healthy (exit code {code:?})")]
    StartupFailed { code: Option<i32> },

    #[error("runtime not healthy on port {port} after {timeout_ms}ms")]
    HealthTimeout { port: u16, timeout_ms: u64 },

    #[error("failed to spawn {bin}: {source}")]
    Spawn { bin: String, source: std::io::Error },

    #[error("no runtime answering on port {port}; start one with `wardend serve`")]
    NotRunning { port: u16 },

    #[error("failed to write runtime config: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub bin: String,
    pub args: Vec<String>,
    pub port: u16,
    pub token: String,
    pub runtime_config: PathBuf,
    /// Working directory for the runtime (the state root)
    pub cwd: PathBuf,
    pub health_poll: Duration,
    pub health_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Absent,
    Starting,
    Healthy,
    Stopped,
}

warden_core::simple_display! {
    SupervisorState {
        Absent => "absent",
        Starting => "starting",
        Healthy => "healthy",
        Stopped => "stopped",
    }
}

/// Exit status published by the reaper task: `None` while running,
/// `Some(code)` once exited (`code` is `None` when killed by a signal).
type ExitWatch = watch::Receiver<Option<Option<i32>>>;

struct OwnedChild {
    pid: Option<u32>,
    exit: ExitWatch,
}

impl OwnedChild {
    fn exited(&self) -> Option<Option<i32>> {
        *self.exit.borrow()
    }

    fn signal(&self, signal: nix::sys::signal::Signal) {
        let Some(pid) = self.pid else { return };
        if self.exited().is_some() {
            return;
        }
        let pid = nix::unistd::Pid::from_raw(pid as i32);
        if let Err(e) = nix::sys::signal::kill(pid, signal) {
            tracing::debug!(%pid, ?signal, error = %e, "failed to signal runtime");
        }
    }

    /// Wait up to `limit` for the process to exit. Returns `true` if it did.
    async fn wait_exit(&mut self, limit: Duration) -> bool {
        let exit = &mut self.exit;
        let wait = async {
            loop {
                if exit.borrow_and_update().is_some() {
                    return true;
                }
                if exit.changed().await.is_err() {
                    return exit.borrow().is_some();
                }
            }
        };
        tokio::time::timeout(limit, wait).await.unwrap_or(false)
    }
}

struct Inner {
    state: SupervisorState,
    externally_owned: bool,
    child: Option<OwnedChild>,
}

/// Owns the local runtime process.
pub struct Supervisor {
    config: SupervisorConfig,
    registry: Registry,
    inner: Mutex<Inner>,
    // Serializes start/stop/restart
    op: tokio::sync::Mutex<()>,
    /// When false, only a runtime that is already healthy is used
    may_spawn: bool,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, registry: Registry) -> Self {
        Self::build(config, registry, true)
    }

    /// A supervisor that adopts a running runtime but never spawns one.
    pub fn adopt_only(config: SupervisorConfig, registry: Registry) -> Self {
        Self::build(config, registry, false)
    }

    fn build(config: SupervisorConfig, registry: Registry, may_spawn: bool) -> Self {
        Self {
            config,
            registry,
            may_spawn,
            inner: Mutex::new(Inner {
                state: SupervisorState::Absent,
                externally_owned: false,
                child: None,
            }),
            op: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.inner.lock().state
    }

    pub fn is_externally_owned(&self) -> bool {
        self.inner.lock().externally_owned
    }

    /// Externally owned, or the owned runtime reached healthy and has not exited.
    pub fn is_healthy(&self) -> bool {
        let inner = self.inner.lock();
        if inner.externally_owned {
            return true;
        }
        inner.state == SupervisorState::Healthy
            && inner.child.as_ref().is_some_and(|c| c.exited().is_none())
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.config.port)
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Start the runtime and wait until it answers its health probe.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let _op = self.op.lock().await;
        self.start_locked().await
    }

    /// Ask the owned runtime to terminate without waiting for it.
    pub async fn stop(&self) {
        let _op = self.op.lock().await;
        self.stop_locked();
    }

    /// Stop, wait (bounded) for the owned runtime to exit, then start afresh.
    pub async fn restart(&self) -> Result<(), SupervisorError> {
        let _op = self.op.lock().await;
        self.stop_locked();

        let child = self.inner.lock().child.take();
        if let Some(mut child) = child {
            if !child.wait_exit(RESTART_EXIT_WAIT).await {
                tracing::warn!("runtime ignored SIGTERM, killing");
                child.signal(nix::sys::signal::Signal::SIGKILL);
                child.wait_exit(RESTART_EXIT_WAIT).await;
            }
        }

        self.inner.lock().externally_owned = false;
        self.start_locked().await
    }

    async fn start_locked(&self) -> Result<(), SupervisorError> {
        if self.is_healthy() {
            return Ok(());
        }

        let port = self.config.port;
        self.inner.lock().state = SupervisorState::Starting;

        if health::is_healthy(port).await {
            tracing::info!(port, "runtime already answering, reusing it");
            let mut inner = self.inner.lock();
            inner.externally_owned = true;
            inner.state = SupervisorState::Healthy;
            return Ok(());
        }

        if !self.may_spawn {
            self.inner.lock().state = SupervisorState::Stopped;
            return Err(SupervisorError::NotRunning { port });
        }

        let config_path = match self.registry.write_runtime_config().await {
            Ok(path) => path,
            Err(e) => {
                self.inner.lock().state = SupervisorState::Stopped;
                return Err(e.into());
            }
        };

        let child = match self.spawn(&config_path) {
            Ok(child) => child,
            Err(e) => {
                self.inner.lock().state = SupervisorState::Stopped;
                return Err(e);
            }
        };
        let result = self.wait_healthy(&child).await;

        let mut inner = self.inner.lock();
        match result {
            Ok(()) => {
                tracing::info!(port, pid = ?child.pid, "runtime healthy");
                inner.state = SupervisorState::Healthy;
                inner.child = Some(child);
                Ok(())
            }
            Err(e) => {
                tracing::error!(port, error = %e, "runtime failed to start");
                child.signal(nix::sys::signal::Signal::SIGTERM);
                inner.state = SupervisorState::Stopped;
                inner.child = None;
                Err(e)
            }
        }
    }

    fn stop_locked(&self) {
        let mut inner = self.inner.lock();
        if inner.externally_owned {
            tracing::info!("runtime is externally owned, leaving it running");
            return;
        }
        if let Some(ref child) = inner.child {
            tracing::info!(pid = ?child.pid, "stopping runtime");
            child.signal(nix::sys::signal::Signal::SIGTERM);
        }
        if inner.state != SupervisorState::Absent {
            inner.state = SupervisorState::Stopped;
        }
    }

    fn spawn(&self, config_path: &std::path::Path) -> Result<OwnedChild, SupervisorError> {
        let config = &self.config;
        let spawn_err = |source| SupervisorError::Spawn { bin: config.bin.clone(), source };

        std::fs::create_dir_all(&config.cwd).map_err(spawn_err)?;

        let mut cmd = tokio::process::Command::new(&config.bin);
        cmd.args(&config.args)
            .arg("--port")
            .arg(config.port.to_string())
            .current_dir(&config.cwd)
            .env("WARDEN_GATEWAY_TOKEN", &config.token)
            .env("WARDEN_GATEWAY_PORT", config.port.to_string())
            .env("WARDEN_CONFIG_PATH", config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(spawn_err)?;
        let pid = child.id();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, "stderr"));
        }

        // Reaper task to prevent zombie processes
        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    tracing::info!(exit_status = %status, "runtime exited");
                    let _ = exit_tx.send(Some(status.code()));
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to wait on runtime process");
                    let _ = exit_tx.send(Some(None));
                }
            }
        });

        tracing::info!(bin = %config.bin, pid = ?pid, port = config.port, "runtime spawned");
        Ok(OwnedChild { pid, exit: exit_rx })
    }

    /// Poll health until healthy, exited, or timed out.
    async fn wait_healthy(&self, child: &OwnedChild) -> Result<(), SupervisorError> {
        let port = self.config.port;
        let deadline = tokio::time::Instant::now() + self.config.health_timeout;
        let mut exit = child.exit.clone();

        loop {
            let exited = *exit.borrow_and_update();
            if let Some(code) = exited {
                return Err(SupervisorError::StartupFailed { code });
            }
            if health::is_healthy(port).await {
                return Ok(());
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(SupervisorError::HealthTimeout {
                    port,
                    timeout_ms: self.config.health_timeout.as_millis() as u64,
                });
            }
            let nap = self.config.health_poll.min(deadline - now);
            tokio::select! {
                _ = tokio::time::sleep(nap) => {}
                _ = exit.changed() => {}
            }
        }
    }
}

/// Forward a runtime output stream to the log line by line.
async fn forward_output<R: AsyncRead + Unpin>(stream: R, src: &'static str) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(src, "{}", line.trim_end());
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
