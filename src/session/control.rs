//! # Control Session
//!
//! Owns one drive session from SSH login to teardown.
//!
//! ```text
//! Idle ─ssh ok─▶ Bootstrapping ─control active─▶ Connecting ─link up─▶ Active
//!                                                                        │
//! Idle ◀──────────────── Disconnecting ◀──── ended or link lost ─────────┘
//! ```
//!
//! A failed step publishes a status line and returns to Idle. Nothing is
//! retried: a new session must be started from the beginning.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::dispatch::{DispatchExit, DispatchInputs, Dispatcher};
use super::state::{SessionOutcome, SessionPhase, SessionStatus};
use crate::config::Config;
use crate::controller::{GamepadMonitor, GamepadState};
use crate::fusion::{FusionSettings, InputFusionEngine, SpeedMode, TouchInput};
use crate::link::{ControlLink, ControlSender};
use crate::remote::bootstrap;
use crate::remote::RemoteShell;

/// Cloneable handle the UI uses to steer and observe a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    touch: Arc<watch::Sender<TouchInput>>,
    speed: Arc<watch::Sender<SpeedMode>>,
    control: watch::Receiver<Option<ControlSender>>,
    status: watch::Receiver<SessionStatus>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Drive joystick offset from its centre, in pixels
    pub fn set_move_joystick(&self, x: f32, y: f32) {
        self.touch.send_modify(|touch| touch.move_px = (x, y));
    }

    /// Camera joystick offset from its centre, in pixels
    pub fn set_camera_joystick(&self, x: f32, y: f32) {
        self.touch.send_modify(|touch| touch.camera_px = (x, y));
    }

    /// Centre both touch joysticks
    pub fn release_joysticks(&self) {
        self.touch.send_replace(TouchInput::default());
    }

    pub fn set_speed_mode(&self, mode: SpeedMode) {
        self.speed.send_replace(mode);
    }

    pub fn speed_mode(&self) -> SpeedMode {
        *self.speed.borrow()
    }

    /// Queue `MOVE 0 0` behind any pending tick frames
    pub fn stop(&self) {
        match self.control.borrow().as_ref() {
            Some(sender) => sender.stop(),
            None => info!("Stop requested with no control link"),
        }
    }

    /// Ask the session to tear down
    pub fn end(&self) {
        self.cancel.cancel();
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }
}

/// One drive session over a remote shell `S`
pub struct ControlSession<S> {
    config: Config,
    shell: S,
    monitor: Option<GamepadMonitor>,
    gamepad: watch::Receiver<GamepadState>,
    touch_tx: Arc<watch::Sender<TouchInput>>,
    touch_rx: watch::Receiver<TouchInput>,
    speed_tx: Arc<watch::Sender<SpeedMode>>,
    speed_rx: watch::Receiver<SpeedMode>,
    control_tx: watch::Sender<Option<ControlSender>>,
    status_tx: watch::Sender<SessionStatus>,
    cancel: CancellationToken,
}

impl<S: RemoteShell> ControlSession<S> {
    /// Session with touch input only; attach a gamepad source separately
    pub fn new(config: Config, shell: S) -> Self {
        let (_, gamepad) = watch::channel(GamepadState::default());
        let (touch_tx, touch_rx) = watch::channel(TouchInput::default());
        let (speed_tx, speed_rx) = watch::channel(SpeedMode::default());
        let (control_tx, _) = watch::channel(None);
        let (status_tx, _) = watch::channel(SessionStatus::default());

        Self {
            config,
            shell,
            monitor: None,
            gamepad,
            touch_tx: Arc::new(touch_tx),
            touch_rx,
            speed_tx: Arc::new(speed_tx),
            speed_rx,
            control_tx,
            status_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Poll for a gamepad while the session runs
    pub fn with_gamepad_monitor(mut self, monitor: GamepadMonitor) -> Self {
        self.gamepad = monitor.subscribe();
        self.monitor = Some(monitor);
        self
    }

    /// Read gamepad snapshots from an external publisher
    pub fn with_gamepad_feed(mut self, gamepad: watch::Receiver<GamepadState>) -> Self {
        self.gamepad = gamepad;
        self.monitor = None;
        self
    }

    /// End the session when `parent` is cancelled
    pub fn with_parent_token(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            touch: self.touch_tx.clone(),
            speed: self.speed_tx.clone(),
            control: self.control_tx.subscribe(),
            status: self.status_tx.subscribe(),
            cancel: self.cancel.clone(),
        }
    }

    /// Run the whole lifecycle and report how it ended
    pub async fn run(mut self) -> SessionOutcome {
        let poll = self
            .monitor
            .take()
            .map(|monitor| tokio::spawn(monitor.run(self.cancel.child_token())));

        let outcome = self.drive().await;
        self.shell.disconnect().await;

        self.cancel.cancel();
        if let Some(poll) = poll {
            if let Err(e) = poll.await {
                warn!("Gamepad poll task ended abnormally: {}", e);
            }
        }

        if outcome.is_failure() {
            error!("Session ended: {}", outcome);
        } else {
            info!("Session ended");
        }
        self.publish(SessionPhase::Idle, outcome.message());
        outcome
    }

    async fn drive(&mut self) -> SessionOutcome {
        let robot = self.config.robot.clone();
        self.publish(
            SessionPhase::Idle,
            format!("Connecting to {}@{}...", robot.user, robot.host),
        );

        let login = self.shell.connect(&robot.host, &robot.user, &robot.password);
        match until_cancelled(&self.cancel, login).await {
            None => return SessionOutcome::Ended,
            Some(false) => return SessionOutcome::SshFailed,
            Some(true) => {}
        }

        self.publish(SessionPhase::Bootstrapping, "SSH connected. Starting servers...");
        let start = bootstrap::start_control_servers(&mut self.shell, &self.config.bootstrap);
        let Some((report, _)) = until_cancelled(&self.cancel, start).await else {
            return SessionOutcome::Ended;
        };
        self.status_tx
            .send_modify(|status| status.camera_available = report.camera_available);

        if !report.control_active {
            self.publish(SessionPhase::Bootstrapping, SessionOutcome::ControlServerDown.message());
            bootstrap::fetch_server_logs(
                &mut self.shell,
                &self.config.bootstrap,
                self.config.dispatch.log_fetch_delay(),
            )
            .await;
            return SessionOutcome::ControlServerDown;
        }

        self.publish(SessionPhase::Connecting, "Control server started. Connecting...");
        let settle = sleep(self.config.dispatch.server_settle());
        if until_cancelled(&self.cancel, settle).await.is_none() {
            return SessionOutcome::Ended;
        }

        let mut link = match ControlLink::connect(
            &robot.host,
            self.config.ports.control,
            self.config.timeouts.connect(),
            self.config.timeouts.control_read(),
        )
        .await
        {
            Ok(link) => link,
            Err(e) => {
                warn!("Control connect failed: {}", e);
                return SessionOutcome::ControlConnectFailed;
            }
        };

        let active = if report.camera_available {
            "Connected - control active"
        } else {
            "Control active (camera unavailable)"
        };
        self.publish(SessionPhase::Active, active);
        self.control_tx.send_replace(Some(link.sender()));

        let dispatcher = Dispatcher::new(
            InputFusionEngine::new(FusionSettings::from_config(
                &self.config.fusion,
                &self.config.controller,
            )),
            DispatchInputs {
                gamepad: self.gamepad.clone(),
                touch: self.touch_rx.clone(),
                speed: self.speed_rx.clone(),
            },
            self.config.dispatch.tick(),
        );
        let exit = dispatcher
            .run(&link.sender(), &self.cancel, &self.status_tx)
            .await;

        self.publish(SessionPhase::Disconnecting, "Stopping robot...");
        link.stop();
        sleep(self.config.dispatch.stop_grace()).await;
        self.control_tx.send_replace(None);
        link.disconnect().await;

        match exit {
            DispatchExit::Cancelled => SessionOutcome::Ended,
            DispatchExit::LinkLost => SessionOutcome::LinkLost,
        }
    }

    fn publish(&self, phase: SessionPhase, message: impl Into<String>) {
        let message = message.into();
        info!("[{}] {}", phase, message);
        self.status_tx.send_modify(|status| {
            status.phase = phase;
            status.message = message;
        });
    }
}

/// `None` if `cancel` fires first
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}
