//! The periodic sample → plan → actuate cycle

use crate::actuator::{BatchReport, FanActuator};
use crate::daemon::lifecycle::ShutdownSignal;
use crate::planner::{plan, should_apply};
use crate::profile::ControlConfigSource;
use crate::safety::{apply_override, AMBIENT_LIMIT};
use crate::telemetry::TelemetrySource;
use log::{debug, error, info, trace, warn};
use std::time::Duration;

/// Delay before looking for the control configuration again
pub const CONFIG_RETRY_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sampling,
    Planning,
    Actuating,
    Sleeping,
}

/// State carried from one cycle to the next
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlState {
    last_applied_speed: Option<u8>,
}

impl ControlState {
    pub fn last_applied_speed(&self) -> Option<u8> {
        self.last_applied_speed
    }

    fn record(&mut self, speed: u8) {
        self.last_applied_speed = Some(speed);
    }

    /// Forget the last speed; returns whether there was one
    fn clear(&mut self) -> bool {
        self.last_applied_speed.take().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    ConfigUnavailable,
    Disabled,
    TelemetryUnavailable,
    Suppressed { speed: u8 },
    Applied { speed: u8, report: BatchReport },
    ActuationFailed { speed: u8 },
}

/// Suspension between cycles
#[allow(async_fn_in_trait)]
pub trait Clock {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioClock;

impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub struct ControlLoop<C, T, A, K> {
    config: C,
    telemetry: T,
    actuator: A,
    clock: K,
    state: ControlState,
    phase: Phase,
}

impl<C, T, A, K> ControlLoop<C, T, A, K>
where
    C: ControlConfigSource,
    T: TelemetrySource,
    A: FanActuator,
    K: Clock,
{
    pub fn new(config: C, telemetry: T, actuator: A, clock: K) -> Self {
        Self {
            config,
            telemetry,
            actuator,
            clock,
            state: ControlState::default(),
            phase: Phase::Idle,
        }
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            trace!("{:?} -> {:?}", self.phase, phase);
        }
        self.phase = phase;
    }

    /// Run one cycle and return its outcome with the delay before the next one
    pub async fn run_cycle(&mut self) -> (CycleOutcome, Duration) {
        let config = match self.config.load() {
            Ok(config) => config,
            Err(e) => {
                self.enter(Phase::Idle);
                warn!(
                    "[config] {}; retrying in {}s",
                    e,
                    CONFIG_RETRY_INTERVAL.as_secs()
                );
                return (CycleOutcome::ConfigUnavailable, CONFIG_RETRY_INTERVAL);
            }
        };
        let interval = config.poll_interval();

        if !config.enabled {
            self.enter(Phase::Idle);
            if self.state.clear() {
                info!("Auto-control disabled, switching to idle");
            }
            return (CycleOutcome::Disabled, interval);
        }

        let (key, selected) = match config.resolve_active() {
            Ok(resolved) => resolved,
            Err(e) => {
                self.enter(Phase::Idle);
                warn!("[config] {}; retrying in {}s", e, interval.as_secs());
                return (CycleOutcome::ConfigUnavailable, interval);
            }
        };

        self.enter(Phase::Sampling);
        let snapshot = match self.telemetry.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("[sampling] Could not fetch temperatures: {}", e);
                return (CycleOutcome::TelemetryUnavailable, interval);
            }
        };

        self.enter(Phase::Planning);
        let ambient = snapshot.ambient_temperature();
        let fan_count = snapshot.fan_count();
        let effective = apply_override(ambient, key, selected, &config);

        match ambient {
            Some(t) if effective.forced => warn!(
                "SAFETY: Ambient {}°C > {}°C, forcing {} profile",
                t, AMBIENT_LIMIT, effective.label
            ),
            Some(t) => info!(
                "Profile: {} | Ambient: {}°C | Fans: {}",
                effective.label, t, fan_count
            ),
            None => info!("Profile: {} | Fans: {}", effective.label, fan_count),
        }

        let cpu_temperatures = snapshot.cpu_temperatures();
        match snapshot.max_cpu_temperature() {
            Some(t) => debug!("Max CPU temp: {}°C", t),
            None => warn!("[planning] No CPU temperature reported, assuming worst case"),
        }

        let speed = plan(&cpu_temperatures, effective.profile);
        debug!("Calculated speed: {}%", speed);

        let last = self.state.last_applied_speed();
        if !should_apply(speed, last) {
            debug!(
                "No change ({}% vs {}%)",
                speed,
                last.map_or_else(|| "-".to_string(), |s| s.to_string())
            );
            return (CycleOutcome::Suppressed { speed }, interval);
        }

        self.enter(Phase::Actuating);
        match self.actuator.apply(speed, fan_count).await {
            Ok(report) => {
                info!("Fans set to {}%", speed);
                self.state.record(speed);
                (CycleOutcome::Applied { speed, report }, interval)
            }
            Err(e) => {
                error!("[actuating] Failed to set fans to {}%: {}", speed, e);
                (CycleOutcome::ActuationFailed { speed }, interval)
            }
        }
    }

    /// Cycle until shutdown is requested; returns the number of cycles run.
    ///
    /// The flag is checked only between cycles. The sleep wakes early on shutdown.
    pub async fn run(&mut self, shutdown: &ShutdownSignal) -> u64 {
        let mut cycles = 0;

        loop {
            if shutdown.is_triggered() {
                info!("Shutdown requested, leaving control loop");
                break;
            }

            let (outcome, delay) = self.run_cycle().await;
            cycles += 1;
            trace!("cycle {}: {:?}, next in {:?}", cycles, outcome, delay);

            self.enter(Phase::Sleeping);
            tokio::select! {
                _ = self.clock.sleep(delay) => {}
                _ = shutdown.wait() => {}
            }
        }

        cycles
    }
}
