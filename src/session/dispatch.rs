//! # Dispatch Loop
//!
//! Fixed-rate tick that samples the latest input, fuses it and pushes the
//! result onto the control link.
//!
//! Every tick sends one `MOVE` and one `CAMERA` line, zeroed when gated. The
//! loop ends when the session is cancelled or as soon as the control link
//! reports itself dead; it never reconnects.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::SessionStatus;
use crate::controller::GamepadState;
use crate::fusion::{DriveCommand, InputFusionEngine, SpeedMode, TouchInput};
use crate::link::ControlSender;

/// Why the tick loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchExit {
    Cancelled,
    LinkLost,
}

/// Latest-value inputs read on every tick
#[derive(Debug, Clone)]
pub struct DispatchInputs {
    pub gamepad: watch::Receiver<GamepadState>,
    pub touch: watch::Receiver<TouchInput>,
    pub speed: watch::Receiver<SpeedMode>,
}

#[derive(Debug)]
pub struct Dispatcher {
    engine: InputFusionEngine,
    inputs: DispatchInputs,
    tick: Duration,
}

impl Dispatcher {
    pub fn new(engine: InputFusionEngine, inputs: DispatchInputs, tick: Duration) -> Self {
        Self {
            engine,
            inputs,
            tick,
        }
    }

    /// Fuse and gate the current input snapshot
    pub fn sample(&self) -> DriveCommand {
        let gamepad = self.inputs.gamepad.borrow().clone();
        let touch = *self.inputs.touch.borrow();
        let speed = *self.inputs.speed.borrow();
        self.engine.compute(&gamepad, &touch, speed)
    }

    /// Run until cancelled or the link dies
    pub async fn run(
        &self,
        control: &ControlSender,
        cancel: &CancellationToken,
        status: &watch::Sender<SessionStatus>,
    ) -> DispatchExit {
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        info!("Dispatch loop started ({} ms tick)", self.tick.as_millis());
        let mut ticks: u64 = 0;

        while control.is_connected() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Dispatch loop cancelled after {} ticks", ticks);
                    return DispatchExit::Cancelled;
                }
                _ = ticker.tick() => {}
            }

            self.publish_gamepad(status);

            let drive = self.sample();
            control.send_motion(drive.motion.0, drive.motion.1);
            control.send_camera(drive.camera.0, drive.camera.1);
            ticks += 1;
        }

        warn!("Control link lost after {} ticks", ticks);
        DispatchExit::LinkLost
    }

    /// Reflect gamepad attach/detach in the session status
    fn publish_gamepad(&self, status: &watch::Sender<SessionStatus>) {
        let label = {
            let gamepad = self.inputs.gamepad.borrow();
            gamepad.connected.then(|| gamepad.device_label.clone())
        };

        status.send_if_modified(|current| {
            if current.gamepad_label == label {
                return false;
            }
            match &label {
                Some(name) => info!("Gamepad in control: {}", name),
                None => debug!("Touch input in control"),
            }
            current.gamepad_label = label.clone();
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::ControlLink;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    struct Feeds {
        gamepad: watch::Sender<GamepadState>,
        touch: watch::Sender<TouchInput>,
        _speed: watch::Sender<SpeedMode>,
    }

    fn dispatcher(tick: Duration) -> (Dispatcher, Feeds) {
        let (gamepad_tx, gamepad) = watch::channel(GamepadState::default());
        let (touch_tx, touch) = watch::channel(TouchInput::default());
        let (speed_tx, speed) = watch::channel(SpeedMode::Standard);
        let inputs = DispatchInputs {
            gamepad,
            touch,
            speed,
        };
        (
            Dispatcher::new(InputFusionEngine::default(), inputs, tick),
            Feeds {
                gamepad: gamepad_tx,
                touch: touch_tx,
                _speed: speed_tx,
            },
        )
    }

    #[test]
    fn test_gamepad_takes_over_from_stale_touch() {
        let (dispatcher, feeds) = dispatcher(Duration::from_millis(50));
        feeds.touch.send_replace(TouchInput {
            move_px: (-60.0, 0.0),
            camera_px: (60.0, 0.0),
        });
        assert_eq!(dispatcher.sample().motion, (0.5, 0.0));
        assert_eq!(dispatcher.sample().camera, (1.0, 0.0));

        let mut pad = GamepadState::attached("Wireless Controller");
        pad.left_stick = (0.0, 1.0);
        feeds.gamepad.send_replace(pad);

        let drive = dispatcher.sample();
        assert_eq!(drive.motion, (-0.0, -0.5));
        assert_eq!(drive.camera, (0.0, 0.0));

        // Detach hands control back to touch
        feeds.gamepad.send_replace(GamepadState::default());
        assert_eq!(dispatcher.sample().motion, (0.5, 0.0));
    }

    #[tokio::test]
    async fn test_ticks_until_cancelled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            let mut received = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                received.push(line);
            }
            received
        });

        let short = Duration::from_millis(500);
        let mut link = ControlLink::connect("127.0.0.1", port, short, short).await.unwrap();
        let (dispatcher, feeds) = dispatcher(Duration::from_millis(10));
        feeds.touch.send_replace(TouchInput {
            move_px: (-60.0, 0.0),
            camera_px: (0.0, 0.0),
        });

        let (status_tx, status_rx) = watch::channel(SessionStatus::default());
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let exit = dispatcher.run(&link.sender(), &cancel, &status_tx).await;
        assert_eq!(exit, DispatchExit::Cancelled);
        assert!(status_rx.borrow().gamepad_label.is_none());
        link.disconnect().await;

        let lines = server.await.unwrap();
        assert!(lines.len() >= 3, "only {} lines", lines.len());
        assert_eq!(lines[0], "MOVE 0.5 0");
        assert_eq!(lines[1], "CAMERA 0 0");
        assert_eq!(lines.last().map(String::as_str), Some("quit"));
    }

    #[tokio::test]
    async fn test_exits_when_link_dies() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(socket);
        });

        let short = Duration::from_millis(500);
        let link = ControlLink::connect("127.0.0.1", port, short, short).await.unwrap();
        let (dispatcher, _feeds) = dispatcher(Duration::from_millis(10));
        let (status_tx, _status_rx) = watch::channel(SessionStatus::default());

        let exit = tokio::time::timeout(
            Duration::from_secs(3),
            dispatcher.run(&link.sender(), &CancellationToken::new(), &status_tx),
        )
        .await
        .expect("dispatch loop kept running on a dead link");
        assert_eq!(exit, DispatchExit::LinkLost);
    }

    #[tokio::test]
    async fn test_status_follows_gamepad() {
        let (dispatcher, feeds) = dispatcher(Duration::from_millis(50));
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());

        feeds.gamepad.send_replace(GamepadState::attached("8BitDo Pro 2"));
        dispatcher.publish_gamepad(&status_tx);
        assert_eq!(
            status_rx.borrow().gamepad_label.as_deref(),
            Some("8BitDo Pro 2")
        );

        feeds.gamepad.send_replace(GamepadState::default());
        dispatcher.publish_gamepad(&status_tx);
        assert!(status_rx.borrow().gamepad_label.is_none());
    }
}
