//! # Gamepad State
//!
//! Immutable snapshot of one input device's axes and buttons.
//!
//! A new snapshot is produced for every input event and published as a whole
//! value; consumers never observe a partially updated state. Detaching the
//! device publishes [`GamepadState::default()`].

/// Digital buttons tracked on the gamepad.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Buttons {
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub l1: bool,
    pub r1: bool,
    pub start: bool,
    pub select: bool,
}

/// Snapshot of the gamepad.
///
/// Stick axes are normalized to -1.0..=1.0 with the source deadzone already
/// applied; triggers are 0.0..=1.0.
///
/// # Examples
///
/// ```
/// use rover_link::controller::state::GamepadState;
///
/// let state = GamepadState::default();
/// assert!(!state.connected);
/// assert_eq!(state.left_stick, (0.0, 0.0));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GamepadState {
    pub connected: bool,
    pub device_label: String,
    /// (x, y), motion.
    pub left_stick: (f32, f32),
    /// (x, y), camera.
    pub right_stick: (f32, f32),
    /// L2
    pub left_trigger: f32,
    /// R2
    pub right_trigger: f32,
    pub buttons: Buttons,
}

impl GamepadState {
    /// Fresh state for a newly detected device: connected, everything centred.
    #[must_use]
    pub fn attached(device_label: impl Into<String>) -> Self {
        Self {
            connected: true,
            device_label: device_label.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected_and_centred() {
        let state = GamepadState::default();
        assert!(!state.connected);
        assert!(state.device_label.is_empty());
        assert_eq!(state.left_stick, (0.0, 0.0));
        assert_eq!(state.right_stick, (0.0, 0.0));
        assert_eq!(state.left_trigger, 0.0);
        assert_eq!(state.right_trigger, 0.0);
        assert_eq!(state.buttons, Buttons::default());
    }

    #[test]
    fn test_attached() {
        let state = GamepadState::attached("Wireless Controller");
        assert!(state.connected);
        assert_eq!(state.device_label, "Wireless Controller");
        assert_eq!(state.left_stick, (0.0, 0.0));
        assert_eq!(state.right_stick, (0.0, 0.0));
        assert_eq!(state.buttons, Buttons::default());
    }
}
