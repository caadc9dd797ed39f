//! Fan duty actuation over the iLO command shell

use crate::errors::{FanControlError, Result};
use crate::settings::Settings;
use log::{debug, info, warn};
use ssh2::Session;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

/// Convert a duty percentage to an 8-bit PWM value, rounding up
pub fn percent_to_pwm(percent: u8) -> u8 {
    let percent = percent.min(100) as u32;
    // ceil(percent * 255 / 100) in integer arithmetic
    ((percent * 255 + 99) / 100) as u8
}

/// iLO command that pins one fan to a duty value
pub fn fan_command(fan_index: usize, pwm: u8) -> String {
    format!("fan p {} max {}; fan p {} min 255", fan_index, pwm, fan_index)
}

/// One command session on the management interface
pub trait ShellSession {
    /// Run a command, wait at most `read_timeout` for it and discard its output
    fn exec(&mut self, command: &str, read_timeout: Duration) -> Result<()>;
}

/// Opens command sessions
pub trait RemoteShell: Send + Sync + 'static {
    type Session: ShellSession;

    fn open(&self) -> Result<Self::Session>;
}

/// Password-authenticated SSH access to the iLO
#[derive(Debug, Clone)]
pub struct SshShell {
    host: String,
    port: u16,
    username: String,
    password: String,
    connect_timeout: Duration,
}

impl SshShell {
    pub fn new(settings: &Settings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.ssh_port,
            username: settings.username.clone(),
            password: settings.password.clone(),
            connect_timeout: settings.telemetry_timeout(),
        }
    }
}

pub struct SshSession {
    session: Session,
}

impl RemoteShell for SshShell {
    type Session = SshSession;

    fn open(&self) -> Result<SshSession> {
        let address = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                FanControlError::ActuationConnection(format!("cannot resolve {}", self.host))
            })?;

        let stream = TcpStream::connect_timeout(&address, self.connect_timeout)?;
        let mut session = Session::new()?;
        session.set_tcp_stream(stream);
        session.set_timeout(self.connect_timeout.as_millis() as u32);
        session.handshake()?;
        session.userauth_password(&self.username, &self.password)?;

        if !session.authenticated() {
            return Err(FanControlError::ActuationConnection(format!(
                "authentication rejected for {}@{}",
                self.username, self.host
            )));
        }

        Ok(SshSession { session })
    }
}

impl ShellSession for SshSession {
    fn exec(&mut self, command: &str, read_timeout: Duration) -> Result<()> {
        self.session.set_timeout(read_timeout.as_millis() as u32);

        let mut channel = self.session.channel_session()?;
        channel.exec(command)?;

        discard_output(&mut channel)?;
        channel.wait_close()?;
        Ok(())
    }
}

/// Read a command's output to the end without inspecting it; it may not be UTF-8
fn discard_output<R: Read + ?Sized>(output: &mut R) -> std::io::Result<u64> {
    std::io::copy(output, &mut std::io::sink())
}

/// Outcome of one actuation batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Speed after clamping, in percent
    pub speed: u8,
    pub pwm: u8,
    pub fans: usize,
    /// Commands that errored or timed out; the batch still counts as applied
    pub failed_commands: usize,
}

/// Anything able to push a duty cycle to the chassis fans
#[allow(async_fn_in_trait)]
pub trait FanActuator {
    async fn apply(&self, speed: u8, fan_count: usize) -> Result<BatchReport>;
}

/// Drives every fan through one shell session per batch
pub struct ShellActuator<S> {
    shell: Arc<S>,
    minimum_speed: u8,
    command_timeout: Duration,
    fan_pause: Duration,
}

impl<S: RemoteShell> ShellActuator<S> {
    pub fn new(shell: S, settings: &Settings) -> Self {
        Self {
            shell: Arc::new(shell),
            minimum_speed: settings.minimum_fan_speed,
            command_timeout: settings.command_timeout(),
            fan_pause: settings.fan_pause(),
        }
    }

    pub fn minimum_speed(&self) -> u8 {
        self.minimum_speed
    }

    /// Clamp to `[minimum_speed, 100]`
    pub fn clamp(&self, speed: u8) -> u8 {
        speed.clamp(self.minimum_speed.min(100), 100)
    }
}

fn run_batch<S: RemoteShell>(
    shell: &S,
    speed: u8,
    fan_count: usize,
    command_timeout: Duration,
    fan_pause: Duration,
) -> Result<BatchReport> {
    let pwm = percent_to_pwm(speed);

    let mut session = shell
        .open()
        .map_err(|e| match e {
            FanControlError::ActuationConnection(_) => e,
            other => FanControlError::ActuationConnection(other.to_string()),
        })?;

    let mut failed_commands = 0;
    for fan in 0..fan_count {
        let command = fan_command(fan, pwm);
        debug!("exec: {}", command);

        if let Err(e) = session.exec(&command, command_timeout) {
            warn!("Fan {}: command failed: {}", fan, e);
            failed_commands += 1;
        }

        // Let the iLO breathe between fans
        if !fan_pause.is_zero() {
            std::thread::sleep(fan_pause);
        }
    }

    info!(
        "Sent {}% (PWM {}) to {} fans ({} command errors)",
        speed, pwm, fan_count, failed_commands
    );

    Ok(BatchReport {
        speed,
        pwm,
        fans: fan_count,
        failed_commands,
    })
}

impl<S: RemoteShell> FanActuator for ShellActuator<S> {
    async fn apply(&self, speed: u8, fan_count: usize) -> Result<BatchReport> {
        let shell = Arc::clone(&self.shell);
        let speed = self.clamp(speed);
        let command_timeout = self.command_timeout;
        let fan_pause = self.fan_pause;

        tokio::task::spawn_blocking(move || {
            run_batch(shell.as_ref(), speed, fan_count, command_timeout, fan_pause)
        })
        .await
        .map_err(|e| FanControlError::Unknown(format!("actuation task failed: {}", e)))?
    }
}
