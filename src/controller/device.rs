//! # Gamepad Device Module
//!
//! Detects and opens a gamepad using the Linux evdev interface.
//!
//! A device counts as a gamepad when it advertises the `BTN_SOUTH` face
//! button. When several are attached, the lowest `/dev/input/eventN` path wins.

use evdev::{Device, EventStream, Key};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, RoverLinkError};

const INPUT_DIR: &str = "/dev/input";

/// An opened gamepad
pub struct GamepadDevice {
    device: Device,
    device_path: String,
}

impl std::fmt::Debug for GamepadDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GamepadDevice")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl GamepadDevice {
    /// Detect and open the first available gamepad
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: no gamepad attached
    /// - `Controller`: `/dev/input` missing or unreadable
    pub fn open() -> Result<Self> {
        let input_dir = Path::new(INPUT_DIR);

        if !input_dir.exists() {
            return Err(RoverLinkError::Controller(format!(
                "{} directory not found",
                INPUT_DIR
            )));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(input_dir)
            .map_err(|e| RoverLinkError::Controller(format!("Failed to read {}: {}", INPUT_DIR, e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().starts_with("event"))
                    .unwrap_or(false)
            })
            .collect();

        // Deterministic selection when multiple pads are connected
        paths.sort();

        for path in paths {
            match Device::open(&path) {
                Ok(device) if is_gamepad(&device) => {
                    let device_path = path.to_string_lossy().to_string();
                    info!(
                        "Found gamepad '{}' at {}",
                        device.name().unwrap_or("unknown"),
                        device_path
                    );
                    return Ok(Self { device, device_path });
                }
                Ok(_) => debug!("{} is not a gamepad", path.display()),
                // Permission denied or other errors - skip device
                Err(e) => debug!("Could not open {}: {}", path.display(), e),
            }
        }

        Err(RoverLinkError::ControllerNotFound)
    }

    /// Open a specific device node
    ///
    /// # Errors
    ///
    /// Returns `Controller` if the node cannot be opened or is not a gamepad.
    pub fn open_path(path: &str) -> Result<Self> {
        let device = Device::open(path)
            .map_err(|e| RoverLinkError::Controller(format!("Failed to open {}: {}", path, e)))?;

        if !is_gamepad(&device) {
            return Err(RoverLinkError::Controller(format!("{} is not a gamepad", path)));
        }

        Ok(Self {
            device,
            device_path: path.to_string(),
        })
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Human-readable device name, falling back to the node path.
    pub fn label(&self) -> String {
        self.device
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| self.device_path.clone())
    }

    /// Converts the device into an async event stream.
    ///
    /// # Errors
    ///
    /// Returns `Controller` if the fd cannot be registered with the runtime.
    pub fn into_event_stream(self) -> Result<EventStream> {
        self.device
            .into_event_stream()
            .map_err(|e| RoverLinkError::Controller(format!("Failed to stream events: {}", e)))
    }
}

fn is_gamepad(device: &Device) -> bool {
    device
        .supported_keys()
        .map(|keys| keys.contains(Key::BTN_SOUTH))
        .unwrap_or(false)
}
