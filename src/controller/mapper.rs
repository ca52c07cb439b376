//! # Controller Input Mapper Module
//!
//! This module handles parsing raw evdev events from the gamepad and
//! converting them into a [`GamepadState`] snapshot.
//!
//! ## Axis Codes (EV_ABS)
//!
//! | Axis | evdev Code | Use |
//! |------|------------|-----|
//! | Left Stick X | ABS_X | Motion X |
//! | Left Stick Y | ABS_Y | Motion Y |
//! | Right Stick X | ABS_Z | Camera X |
//! | Right Stick Y | ABS_RZ | Camera Y |
//! | L2 Trigger | ABS_RX | Slow down |
//! | R2 Trigger | ABS_RY | Speed up |
//!
//! ## Button Codes (EV_KEY)
//!
//! | Button | evdev Code |
//! |--------|------------|
//! | A | BTN_SOUTH |
//! | B | BTN_EAST |
//! | X | BTN_WEST |
//! | Y | BTN_NORTH |
//! | L1 | BTN_TL |
//! | R1 | BTN_TR |
//! | Start | BTN_START |
//! | Select | BTN_SELECT |

use evdev::{AbsoluteAxisType, InputEvent, InputEventKind, Key};

use super::calibration::{apply_deadzone, AxisRange, DEFAULT_STICK_DEADZONE};
use super::state::GamepadState;

/// Parses raw evdev events and maintains the latest gamepad snapshot.
///
/// Every handled event replaces the snapshot as a whole value.
///
/// # Thread Safety
///
/// `EventMapper` is not thread-safe. Use from a single task only and publish
/// snapshots through a channel.
///
/// # Examples
///
/// ```
/// use rover_link::controller::mapper::EventMapper;
///
/// let mapper = EventMapper::new("Wireless Controller");
/// assert!(mapper.state().connected);
/// assert_eq!(mapper.state().left_stick, (0.0, 0.0));
/// ```
#[derive(Debug)]
pub struct EventMapper {
    state: GamepadState,
    range: AxisRange,
    deadzone: f32,
}

impl EventMapper {
    /// Creates a mapper for a freshly attached device with default range and deadzone.
    #[must_use]
    pub fn new(device_label: &str) -> Self {
        Self::with_settings(device_label, AxisRange::default(), DEFAULT_STICK_DEADZONE)
    }

    #[must_use]
    pub fn with_settings(device_label: &str, range: AxisRange, deadzone: f32) -> Self {
        Self {
            state: GamepadState::attached(device_label),
            range,
            deadzone,
        }
    }

    /// Returns a reference to the current snapshot.
    #[must_use]
    pub fn state(&self) -> &GamepadState {
        &self.state
    }

    /// Processes a single evdev input event.
    ///
    /// Returns `true` if the event changed the snapshot.
    pub fn process_event(&mut self, event: &InputEvent) -> bool {
        let next = match event.kind() {
            InputEventKind::AbsAxis(axis) => self.apply_axis(axis, event.value()),
            InputEventKind::Key(key) => self.apply_key(key, event.value() != 0),
            // Sync and other event types
            _ => None,
        };

        match next {
            Some(next) if next != self.state => {
                self.state = next;
                true
            }
            _ => false,
        }
    }

    fn stick(&self, raw: i32) -> f32 {
        apply_deadzone(self.range.normalize_stick(raw), self.deadzone)
    }

    fn apply_axis(&self, axis: AbsoluteAxisType, value: i32) -> Option<GamepadState> {
        let current = &self.state;
        let next = match axis {
            AbsoluteAxisType::ABS_X => GamepadState {
                left_stick: (self.stick(value), current.left_stick.1),
                ..current.clone()
            },
            AbsoluteAxisType::ABS_Y => GamepadState {
                left_stick: (current.left_stick.0, self.stick(value)),
                ..current.clone()
            },
            AbsoluteAxisType::ABS_Z => GamepadState {
                right_stick: (self.stick(value), current.right_stick.1),
                ..current.clone()
            },
            AbsoluteAxisType::ABS_RZ => GamepadState {
                right_stick: (current.right_stick.0, self.stick(value)),
                ..current.clone()
            },
            AbsoluteAxisType::ABS_RX => GamepadState {
                left_trigger: self.range.normalize_trigger(value),
                ..current.clone()
            },
            AbsoluteAxisType::ABS_RY => GamepadState {
                right_trigger: self.range.normalize_trigger(value),
                ..current.clone()
            },
            // Gyro, accelerometer, d-pad
            _ => return None,
        };
        Some(next)
    }

    fn apply_key(&self, key: Key, pressed: bool) -> Option<GamepadState> {
        let mut buttons = self.state.buttons;
        match key {
            Key::BTN_SOUTH => buttons.a = pressed,
            Key::BTN_EAST => buttons.b = pressed,
            Key::BTN_WEST => buttons.x = pressed,
            Key::BTN_NORTH => buttons.y = pressed,
            Key::BTN_TL => buttons.l1 = pressed,
            Key::BTN_TR => buttons.r1 = pressed,
            Key::BTN_START => buttons.start = pressed,
            Key::BTN_SELECT => buttons.select = pressed,
            _ => return None,
        }
        Some(GamepadState {
            buttons,
            ..self.state.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::EventType;

    /// Helper to create an axis event for testing.
    fn make_axis_event(axis: AbsoluteAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::ABSOLUTE, axis.0, value)
    }

    /// Helper to create a key event for testing.
    fn make_key_event(key: Key, pressed: bool) -> InputEvent {
        InputEvent::new(EventType::KEY, key.code(), if pressed { 1 } else { 0 })
    }

    #[test]
    fn test_new_mapper_is_attached_and_centred() {
        let mapper = EventMapper::new("pad");
        let state = mapper.state();
        assert!(state.connected);
        assert_eq!(state.device_label, "pad");
        assert_eq!(state.left_stick, (0.0, 0.0));
        assert_eq!(state.right_stick, (0.0, 0.0));
    }

    #[test]
    fn test_left_stick_full_deflection() {
        let mut mapper = EventMapper::new("pad");
        assert!(mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 255)));
        assert!(mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Y, 0)));
        assert_eq!(mapper.state().left_stick, (1.0, -1.0));
    }

    #[test]
    fn test_right_stick_uses_z_axes() {
        let mut mapper = EventMapper::new("pad");
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Z, 0));
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RZ, 255));
        assert_eq!(mapper.state().right_stick, (-1.0, 1.0));
        assert_eq!(mapper.state().left_stick, (0.0, 0.0));
    }

    #[test]
    fn test_small_deflection_is_zeroed_at_source() {
        let mut mapper = EventMapper::new("pad");
        // 140 normalizes to ~0.098, inside the 0.15 deadzone.
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 140));
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RZ, 115));
        assert_eq!(mapper.state().left_stick.0, 0.0);
        assert_eq!(mapper.state().right_stick.1, 0.0);
    }

    #[test]
    fn test_deflection_outside_deadzone_is_kept() {
        let mut mapper = EventMapper::new("pad");
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 200));
        let x = mapper.state().left_stick.0;
        assert!((x - 0.5686).abs() < 0.001, "x = {}", x);
    }

    #[test]
    fn test_triggers_have_no_deadzone() {
        let mut mapper = EventMapper::new("pad");
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RX, 13));
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RY, 255));
        assert!(mapper.state().left_trigger > 0.0);
        assert_eq!(mapper.state().right_trigger, 1.0);
    }

    #[test]
    fn test_buttons() {
        let mut mapper = EventMapper::new("pad");
        mapper.process_event(&make_key_event(Key::BTN_SOUTH, true));
        mapper.process_event(&make_key_event(Key::BTN_TR, true));
        assert!(mapper.state().buttons.a);
        assert!(mapper.state().buttons.r1);

        mapper.process_event(&make_key_event(Key::BTN_SOUTH, false));
        assert!(!mapper.state().buttons.a);
    }

    #[test]
    fn test_unknown_events_are_ignored() {
        let mut mapper = EventMapper::new("pad");
        let before = mapper.state().clone();
        assert!(!mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, 1)));
        assert!(!mapper.process_event(&make_key_event(Key::BTN_THUMBL, true)));
        assert_eq!(mapper.state(), &before);
    }

    #[test]
    fn test_repeated_value_reports_no_change() {
        let mut mapper = EventMapper::new("pad");
        assert!(mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 0)));
        assert!(!mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 0)));
    }

    #[test]
    fn test_signed_axis_range() {
        let mut mapper =
            EventMapper::with_settings("xbox", AxisRange::new(-32768, 32767), 0.15);
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Y, -32768));
        assert_eq!(mapper.state().left_stick.1, -1.0);
    }
}
