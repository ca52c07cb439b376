//! # Controller Module
//!
//! Gamepad input handling.
//!
//! This module handles:
//! - Gamepad detection and attachment polling via evdev
//! - Reading analog stick, trigger and button inputs
//! - Normalizing raw axes and applying the source deadzone
//! - Publishing immutable [`state::GamepadState`] snapshots

pub mod calibration;
pub mod device;
pub mod mapper;
pub mod monitor;
pub mod state;

pub use monitor::{GamepadMonitor, MonitorSettings};
pub use state::{Buttons, GamepadState};
