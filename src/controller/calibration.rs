//! # Calibration Module
//!
//! Normalizes raw evdev axis values and applies the source deadzone.
//!
//! ## Deadzone
//!
//! Stick axes whose normalized magnitude is below the deadzone are stored as
//! exactly `0.0`. Values outside the deadzone pass through unchanged (no
//! rescaling), so a stick pushed to 0.5 reads 0.5 regardless of the deadzone.
//!
//! ## Usage
//!
//! ```
//! use rover_link::controller::calibration::{AxisRange, apply_deadzone};
//!
//! let range = AxisRange::new(0, 255);
//! assert!(range.normalize_stick(128).abs() < 0.01);
//! assert_eq!(apply_deadzone(0.1, 0.15), 0.0);
//! assert_eq!(apply_deadzone(0.5, 0.15), 0.5);
//! ```

/// Default stick deadzone applied at the source.
pub const DEFAULT_STICK_DEADZONE: f32 = 0.15;

/// Raw value range reported by the gamepad for sticks and triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    min: i32,
    max: i32,
}

impl Default for AxisRange {
    /// 8-bit HID range used by DualSense-style pads.
    fn default() -> Self {
        Self { min: 0, max: 255 }
    }
}

impl AxisRange {
    /// Creates a range. A degenerate range (`min >= max`) falls back to 0..255.
    #[must_use]
    pub fn new(min: i32, max: i32) -> Self {
        if min >= max {
            Self::default()
        } else {
            Self { min, max }
        }
    }

    #[must_use]
    pub fn min(&self) -> i32 {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> i32 {
        self.max
    }

    /// Converts a raw stick value to -1.0..=1.0, centre at the range midpoint.
    ///
    /// # Examples
    ///
    /// ```
    /// use rover_link::controller::calibration::AxisRange;
    ///
    /// let range = AxisRange::new(0, 255);
    /// assert!((range.normalize_stick(0) - (-1.0)).abs() < 0.01);
    /// assert!((range.normalize_stick(255) - 1.0).abs() < 0.01);
    /// ```
    #[must_use]
    pub fn normalize_stick(&self, raw: i32) -> f32 {
        let span = (self.max - self.min) as f32;
        let centered = (raw - self.min) as f32 / span * 2.0 - 1.0;
        centered.clamp(-1.0, 1.0)
    }

    /// Converts a raw trigger value to 0.0..=1.0.
    #[must_use]
    pub fn normalize_trigger(&self, raw: i32) -> f32 {
        let span = (self.max - self.min) as f32;
        ((raw - self.min) as f32 / span).clamp(0.0, 1.0)
    }
}

/// Zeroes a normalized axis value whose magnitude is below `deadzone`.
#[inline]
#[must_use]
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_stick_endpoints() {
        let range = AxisRange::default();
        assert_eq!(range.normalize_stick(0), -1.0);
        assert_eq!(range.normalize_stick(255), 1.0);
        assert!(range.normalize_stick(128).abs() < 0.01);
    }

    #[test]
    fn test_normalize_stick_signed_range() {
        let range = AxisRange::new(-32768, 32767);
        assert_eq!(range.normalize_stick(-32768), -1.0);
        assert_eq!(range.normalize_stick(32767), 1.0);
        assert!(range.normalize_stick(0).abs() < 0.001);
    }

    #[test]
    fn test_normalize_clamps_out_of_range() {
        let range = AxisRange::default();
        assert_eq!(range.normalize_stick(400), 1.0);
        assert_eq!(range.normalize_trigger(-10), 0.0);
    }

    #[test]
    fn test_normalize_trigger() {
        let range = AxisRange::default();
        assert_eq!(range.normalize_trigger(0), 0.0);
        assert_eq!(range.normalize_trigger(255), 1.0);
    }

    #[test]
    fn test_degenerate_range_falls_back() {
        assert_eq!(AxisRange::new(10, 10), AxisRange::default());
    }

    #[test]
    fn test_deadzone_zeroes_small_values() {
        for v in [0.0, 0.05, -0.05, 0.149, -0.149] {
            assert_eq!(apply_deadzone(v, DEFAULT_STICK_DEADZONE), 0.0, "value {}", v);
        }
    }

    #[test]
    fn test_deadzone_passes_large_values_unchanged() {
        assert_eq!(apply_deadzone(0.15, DEFAULT_STICK_DEADZONE), 0.15);
        assert_eq!(apply_deadzone(-0.7, DEFAULT_STICK_DEADZONE), -0.7);
    }

    #[test]
    fn test_deadzone_idempotent() {
        for v in [-1.0, -0.3, -0.1, 0.0, 0.12, 0.2, 1.0] {
            let once = apply_deadzone(v, DEFAULT_STICK_DEADZONE);
            assert_eq!(apply_deadzone(once, DEFAULT_STICK_DEADZONE), once);
        }
    }
}
