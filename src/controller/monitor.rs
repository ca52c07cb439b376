//! # Gamepad Monitor
//!
//! Watches for gamepad attachment and publishes [`GamepadState`] snapshots.
//!
//! Two loops run on the background runtime:
//! - a poll loop that re-checks attachment every `poll_interval`
//! - a reader task per attached device that publishes a new snapshot on
//!   every input event
//!
//! Subscribers receive whole snapshots through a `watch` channel. On detach
//! the default (disconnected) state is published.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::calibration::{AxisRange, DEFAULT_STICK_DEADZONE};
use super::device::GamepadDevice;
use super::mapper::EventMapper;
use super::state::GamepadState;
use crate::config::ControllerConfig;
use crate::error::{Result, RoverLinkError};

/// Attachment and normalization settings
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Fixed device node; `None` auto-detects.
    pub device_path: Option<String>,
    pub range: AxisRange,
    pub deadzone: f32,
    pub poll_interval: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            device_path: None,
            range: AxisRange::default(),
            deadzone: DEFAULT_STICK_DEADZONE,
            poll_interval: Duration::from_millis(2000),
        }
    }
}

impl From<&ControllerConfig> for MonitorSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            device_path: if config.device_path.is_empty() {
                None
            } else {
                Some(config.device_path.clone())
            },
            range: AxisRange::new(config.axis_min, config.axis_max),
            deadzone: config.stick_deadzone,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// Owns the gamepad snapshot channel for one session.
#[derive(Debug)]
pub struct GamepadMonitor {
    settings: MonitorSettings,
    state_tx: watch::Sender<GamepadState>,
}

impl GamepadMonitor {
    #[must_use]
    pub fn new(settings: MonitorSettings) -> Self {
        let (state_tx, _) = watch::channel(GamepadState::default());
        Self { settings, state_tx }
    }

    /// Receiver for published snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GamepadState> {
        self.state_tx.subscribe()
    }

    /// Runs until `cancel` fires, then publishes the disconnected state.
    pub async fn run(self, cancel: CancellationToken) {
        let mut poll = interval(self.settings.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reader: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = poll.tick() => {
                    let attached = reader.as_ref().map_or(false, |r| !r.is_finished());
                    if attached {
                        continue;
                    }
                    reader = None;

                    match self.attach() {
                        Ok(handle) => reader = Some(handle),
                        Err(RoverLinkError::ControllerNotFound) => debug!("No gamepad attached"),
                        Err(e) => debug!("Gamepad attach failed: {}", e),
                    }
                }
            }
        }

        if let Some(reader) = reader {
            reader.abort();
        }
        self.state_tx.send_replace(GamepadState::default());
        debug!("Gamepad monitor stopped");
    }

    fn attach(&self) -> Result<JoinHandle<()>> {
        let device = match &self.settings.device_path {
            Some(path) => GamepadDevice::open_path(path)?,
            None => GamepadDevice::open()?,
        };
        let label = device.label();
        let mapper = EventMapper::with_settings(&label, self.settings.range, self.settings.deadzone);
        let stream = device.into_event_stream()?;

        info!("Gamepad connected: {}", label);
        self.state_tx.send_replace(mapper.state().clone());

        let state_tx = self.state_tx.clone();
        Ok(tokio::spawn(read_events(stream, mapper, state_tx)))
    }
}

async fn read_events(
    mut stream: evdev::EventStream,
    mut mapper: EventMapper,
    state_tx: watch::Sender<GamepadState>,
) {
    loop {
        match stream.next_event().await {
            Ok(event) => {
                if mapper.process_event(&event) {
                    state_tx.send_replace(mapper.state().clone());
                }
            }
            Err(e) => {
                warn!("Gamepad disconnected: {}", e);
                state_tx.send_replace(GamepadState::default());
                return;
            }
        }
    }
}
