//! # Control Link
//!
//! Fire-and-forget motion and camera vectors on the control port (5555).
//!
//! | Line | Meaning |
//! |------|---------|
//! | `MOVE <x> <y>` | drive vector |
//! | `CAMERA <x> <y>` | camera pan/tilt rate |
//! | `quit` | close the connection |
//!
//! No reply is ever awaited. All writes go through a single writer task fed
//! by a bounded queue, so the dispatch tick and a manual stop issued from
//! another task never interleave bytes on the socket. Frames are perishable:
//! when the queue is full the newest frame is dropped.
//!
//! Liveness is tracked locally. The link reports connected until a write
//! fails or the peer closes its side of the stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::line::{write_line, LineChannel};
use crate::error::Result;

/// Default control server port
pub const CONTROL_PORT: u16 = 5555;

/// Pending frames before new ones are dropped
const QUEUE_DEPTH: usize = 32;

/// One line on the control socket
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlFrame {
    Move(f32, f32),
    Camera(f32, f32),
    Quit,
}

impl ControlFrame {
    /// Wire text without the trailing newline
    ///
    /// # Examples
    ///
    /// ```
    /// use rover_link::link::control::ControlFrame;
    ///
    /// assert_eq!(ControlFrame::Move(0.5, -1.0).encode(), "MOVE 0.5 -1");
    /// assert_eq!(ControlFrame::Camera(0.0, 0.25).encode(), "CAMERA 0 0.25");
    /// assert_eq!(ControlFrame::Quit.encode(), "quit");
    /// ```
    #[must_use]
    pub fn encode(&self) -> String {
        // Adding 0.0 turns -0.0 into 0.0
        match self {
            ControlFrame::Move(x, y) => format!("MOVE {} {}", x + 0.0, y + 0.0),
            ControlFrame::Camera(x, y) => format!("CAMERA {} {}", x + 0.0, y + 0.0),
            ControlFrame::Quit => "quit".to_string(),
        }
    }
}

/// Cloneable write handle onto the control link's queue
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::Sender<ControlFrame>,
    alive: Arc<AtomicBool>,
}

impl ControlSender {
    pub fn send_motion(&self, x: f32, y: f32) {
        self.push(ControlFrame::Move(x, y));
    }

    pub fn send_camera(&self, x: f32, y: f32) {
        self.push(ControlFrame::Camera(x, y));
    }

    pub fn stop(&self) {
        self.send_motion(0.0, 0.0);
    }

    pub fn is_connected(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn push(&self, frame: ControlFrame) {
        if !self.is_connected() {
            debug!("Control link not connected, dropping {:?}", frame);
            return;
        }

        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(frame)) => {
                debug!("Control queue full, dropping {:?}", frame);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.alive.store(false, Ordering::Release);
            }
        }
    }
}

/// Persistent control connection
#[derive(Debug)]
pub struct ControlLink {
    sender: ControlSender,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    teardown_limit: Duration,
}

impl ControlLink {
    /// Connect to the control server
    ///
    /// `connect_timeout` also bounds [`ControlLink::disconnect`].
    ///
    /// # Errors
    ///
    /// Returns `Timeout` or `Io` if the connection cannot be established.
    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        let channel = LineChannel::connect(host, port, connect_timeout, read_timeout).await?;
        let peer = channel.peer();
        let (reader, writer) = channel.into_split();

        let alive = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);

        let writer = tokio::spawn(write_frames(writer, rx, alive.clone()));
        let reader = tokio::spawn(watch_peer(reader, read_timeout, alive.clone()));

        info!("Connected to control server at {}", peer);
        Ok(Self {
            sender: ControlSender { tx, alive },
            writer: Some(writer),
            reader: Some(reader),
            teardown_limit: connect_timeout,
        })
    }

    /// Handle for other tasks that need to write on this link
    #[must_use]
    pub fn sender(&self) -> ControlSender {
        self.sender.clone()
    }

    pub fn send_motion(&self, x: f32, y: f32) {
        self.sender.send_motion(x, y);
    }

    pub fn send_camera(&self, x: f32, y: f32) {
        self.sender.send_camera(x, y);
    }

    pub fn stop(&self) {
        self.sender.stop();
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }

    /// Send `quit`, then close writer, reader and socket in that order.
    ///
    /// A peer that stops reading cannot hold this up past the connect
    /// timeout; the writer is aborted instead. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        let Some(mut writer) = self.writer.take() else {
            return;
        };
        let deadline = Instant::now() + self.teardown_limit;

        match timeout_at(deadline, self.sender.tx.send(ControlFrame::Quit)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => debug!("Control writer already gone"),
            Err(_) => warn!("Control queue stalled, quit not queued"),
        }
        match timeout_at(deadline, &mut writer).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Control writer ended abnormally: {}", e),
            Err(_) => {
                warn!("Control server stopped reading, aborting writer");
                writer.abort();
            }
        }

        if let Some(reader) = self.reader.take() {
            reader.abort();
            let _ = reader.await;
        }

        self.sender.alive.store(false, Ordering::Release);
        info!("Disconnected from control server");
    }
}

impl Drop for ControlLink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn write_frames(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<ControlFrame>,
    alive: Arc<AtomicBool>,
) {
    while let Some(frame) = rx.recv().await {
        let result = write_line(&mut writer, &frame.encode()).await;

        if let Err(e) = result {
            warn!("Control link write failed: {}", e);
            break;
        }
        if frame == ControlFrame::Quit {
            break;
        }
    }

    alive.store(false, Ordering::Release);
    if let Err(e) = writer.shutdown().await {
        debug!("Control writer shutdown: {}", e);
    }
}

/// Marks the link dead when the peer closes or the socket errors.
async fn watch_peer(
    mut reader: BufReader<OwnedReadHalf>,
    read_timeout: Duration,
    alive: Arc<AtomicBool>,
) {
    let mut buf = String::new();
    loop {
        buf.clear();
        match timeout(read_timeout, reader.read_line(&mut buf)).await {
            // Idle control sockets are normal
            Err(_) => continue,
            Ok(Ok(0)) => {
                warn!("Control server closed the connection");
                break;
            }
            Ok(Ok(_)) => debug!("Control server says: {}", buf.trim_end()),
            Ok(Err(e)) => {
                warn!("Control link read failed: {}", e);
                break;
            }
        }
    }
    alive.store(false, Ordering::Release);
}
