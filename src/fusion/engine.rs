//! # Input Fusion Engine
//!
//! Combines the gamepad snapshot and the touch joystick offsets into one
//! normalized drive command.
//!
//! ## Source Priority
//!
//! A connected gamepad always wins. Stale touch offsets are ignored for as
//! long as the gamepad stays connected.
//!
//! | Source | Motion | Camera | Speed |
//! |--------|--------|--------|-------|
//! | Gamepad | left stick, inversion per settings | right stick, inversion per settings | L2/R2 pressure |
//! | Touch | offset / radius, X inverted | offset / radius | selected [`SpeedMode`] |
//!
//! ## Gating
//!
//! The motion vector is zeroed when its magnitude (clamped to 0..=1) is at or
//! below `motion_threshold` (0.20), otherwise scaled by the speed multiplier.
//! The camera vector is zeroed at or below `camera_threshold` (0.15) and is
//! never speed-scaled.
//!
//! ## Usage
//!
//! ```
//! use rover_link::controller::GamepadState;
//! use rover_link::fusion::{InputFusionEngine, SpeedMode, TouchInput};
//!
//! let engine = InputFusionEngine::default();
//! let touch = TouchInput { move_px: (0.0, 60.0), camera_px: (0.0, 0.0) };
//! let drive = engine.compute(&GamepadState::default(), &touch, SpeedMode::Fast);
//! assert_eq!(drive.motion, (0.0, 1.0));
//! assert_eq!(drive.camera, (0.0, 0.0));
//! ```

use super::speed::{SpeedMode, TRIGGER_THRESHOLD};
use crate::config::{ControllerConfig, FusionConfig};
use crate::controller::GamepadState;

/// Raw touch joystick offsets from the widget centre, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TouchInput {
    pub move_px: (f32, f32),
    pub camera_px: (f32, f32),
}

/// Which device produced a fused command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Gamepad,
    Touch,
}

/// Normalized command before gating. Recomputed every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedCommand {
    pub move_x: f32,
    pub move_y: f32,
    pub cam_x: f32,
    pub cam_y: f32,
    pub speed_multiplier: f32,
    pub source: InputSource,
}

impl FusedCommand {
    #[must_use]
    pub fn motion_magnitude(&self) -> f32 {
        self.move_x.hypot(self.move_y).clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn camera_magnitude(&self) -> f32 {
        self.cam_x.hypot(self.cam_y)
    }
}

/// Vectors actually written to the control link on one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveCommand {
    pub motion: (f32, f32),
    pub camera: (f32, f32),
}

/// Per-axis sign flips applied to gamepad sticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StickInversion {
    pub move_x: bool,
    pub move_y: bool,
    pub camera_x: bool,
    pub camera_y: bool,
}

impl Default for StickInversion {
    fn default() -> Self {
        Self {
            move_x: true,
            move_y: true,
            camera_x: true,
            camera_y: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionSettings {
    pub joystick_radius: f32,
    pub motion_threshold: f32,
    pub camera_threshold: f32,
    pub trigger_threshold: f32,
    pub inversion: StickInversion,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            joystick_radius: 60.0,
            motion_threshold: 0.20,
            camera_threshold: 0.15,
            trigger_threshold: TRIGGER_THRESHOLD,
            inversion: StickInversion::default(),
        }
    }
}

impl FusionSettings {
    #[must_use]
    pub fn from_config(fusion: &FusionConfig, controller: &ControllerConfig) -> Self {
        Self {
            joystick_radius: fusion.joystick_radius,
            motion_threshold: fusion.motion_threshold,
            camera_threshold: fusion.camera_threshold,
            trigger_threshold: controller.trigger_threshold,
            inversion: StickInversion {
                move_x: fusion.invert_move_x,
                move_y: fusion.invert_move_y,
                camera_x: fusion.invert_camera_x,
                camera_y: fusion.invert_camera_y,
            },
        }
    }
}

#[inline]
fn flip(value: f32, invert: bool) -> f32 {
    if invert {
        -value
    } else {
        value
    }
}

/// Stateless fusion of gamepad and touch input.
#[derive(Debug, Clone, Default)]
pub struct InputFusionEngine {
    settings: FusionSettings,
}

impl InputFusionEngine {
    #[must_use]
    pub fn new(settings: FusionSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &FusionSettings {
        &self.settings
    }

    /// Selects the authoritative source and normalizes its axes.
    #[must_use]
    pub fn fuse(&self, gamepad: &GamepadState, touch: &TouchInput, mode: SpeedMode) -> FusedCommand {
        if gamepad.connected {
            self.fuse_gamepad(gamepad)
        } else {
            self.fuse_touch(touch, mode)
        }
    }

    fn fuse_gamepad(&self, gamepad: &GamepadState) -> FusedCommand {
        let inv = &self.settings.inversion;
        FusedCommand {
            move_x: flip(gamepad.left_stick.0, inv.move_x),
            move_y: flip(gamepad.left_stick.1, inv.move_y),
            cam_x: flip(gamepad.right_stick.0, inv.camera_x),
            cam_y: flip(gamepad.right_stick.1, inv.camera_y),
            speed_multiplier: SpeedMode::from_triggers_with_threshold(
                gamepad.left_trigger,
                gamepad.right_trigger,
                self.settings.trigger_threshold,
            ),
            source: InputSource::Gamepad,
        }
    }

    fn fuse_touch(&self, touch: &TouchInput, mode: SpeedMode) -> FusedCommand {
        let radius = self.settings.joystick_radius;
        let norm = |px: f32| (px / radius).clamp(-1.0, 1.0);
        FusedCommand {
            move_x: norm(-touch.move_px.0),
            move_y: norm(touch.move_px.1),
            cam_x: norm(touch.camera_px.0),
            cam_y: norm(touch.camera_px.1),
            speed_multiplier: mode.multiplier(),
            source: InputSource::Touch,
        }
    }

    /// Applies the motion and camera thresholds and the speed multiplier.
    #[must_use]
    pub fn gate(&self, command: &FusedCommand) -> DriveCommand {
        let motion = if command.motion_magnitude() > self.settings.motion_threshold {
            (
                command.move_x * command.speed_multiplier,
                command.move_y * command.speed_multiplier,
            )
        } else {
            (0.0, 0.0)
        };

        let camera = if command.camera_magnitude() > self.settings.camera_threshold {
            (command.cam_x, command.cam_y)
        } else {
            (0.0, 0.0)
        };

        DriveCommand { motion, camera }
    }

    /// [`fuse`](Self::fuse) followed by [`gate`](Self::gate).
    #[must_use]
    pub fn compute(&self, gamepad: &GamepadState, touch: &TouchInput, mode: SpeedMode) -> DriveCommand {
        self.gate(&self.fuse(gamepad, touch, mode))
    }
}
