//! Single-instance pid lock and cooperative shutdown

use crate::errors::{FanControlError, Result};
use log::{debug, info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

/// Check whether a process exists without sending it anything
fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs only the existence and permission check.
    let rc = unsafe { libc::kill(pid, 0) };
    // EPERM still means the process exists
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Liveness marker held for the whole life of the daemon
#[derive(Debug)]
pub struct PidLock {
    path: PathBuf,
}

impl PidLock {
    /// Pid recorded in `path`, if that process is still alive.
    ///
    /// A marker naming this very process is left over from an earlier run that
    /// reused the pid (e.g. pid 1 in a container) and counts as stale.
    pub fn running_pid(path: &Path) -> Option<i32> {
        let content = fs::read_to_string(path).ok()?;
        let pid = content.trim().parse::<i32>().ok()?;
        if u32::try_from(pid).ok() == Some(std::process::id()) {
            return None;
        }
        process_alive(pid).then_some(pid)
    }

    /// Take the lock, replacing a stale marker but refusing a live one
    pub fn acquire(path: &Path) -> Result<Self> {
        if path.exists() {
            if let Some(pid) = Self::running_pid(path) {
                return Err(FanControlError::AlreadyRunning { pid });
            }
            warn!("Removing stale pid file {}", path.display());
            fs::remove_file(path)?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;

        debug!("Pid file written: {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove pid file {}: {}", self.path.display(), e);
        } else {
            debug!("Pid file removed: {}", self.path.display());
        }
    }
}

/// Sets the shutdown flag
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Observes the shutdown flag
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|stop| *stop).await.is_err();
        if closed {
            // Trigger dropped without firing: nothing will ever stop us from here
            std::future::pending::<()>().await;
        }
    }
}

/// Trip the shutdown flag on SIGINT, SIGTERM or SIGHUP
pub async fn handle_signals(trigger: ShutdownTrigger) -> Result<()> {
    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut hup = signal(SignalKind::hangup())?;

    let sig = tokio::select! {
        _ = int.recv() => "SIGINT",
        _ = term.recv() => "SIGTERM",
        _ = hup.recv() => "SIGHUP",
    };

    info!("caught signal: {}, shutting down", sig);
    trigger.trigger();
    Ok(())
}
