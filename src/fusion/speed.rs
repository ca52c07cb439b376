//! # Speed Modes
//!
//! Multiplier applied to the motion vector before transmission.
//!
//! Touch control uses one of three discrete modes selected by the operator.
//! With a gamepad attached the multiplier follows trigger pressure:
//!
//! | Input | Multiplier |
//! |-------|------------|
//! | R2 > 0.1 | 0.5 + 0.5 · R2 |
//! | L2 > 0.1 | 0.5 − 0.2 · L2 |
//! | neither | 0.5 |
//!
//! R2 wins when both triggers are pressed. The result always lies in 0.3..=1.0.

/// Lowest multiplier any mode can produce.
pub const MIN_MULTIPLIER: f32 = 0.3;
/// Highest multiplier any mode can produce.
pub const MAX_MULTIPLIER: f32 = 1.0;

/// Trigger pressure at or below which a trigger counts as released.
pub const TRIGGER_THRESHOLD: f32 = 0.1;

/// Discrete speed mode for touch control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SpeedMode {
    Slow,
    #[default]
    Standard,
    Fast,
}

impl SpeedMode {
    /// # Examples
    ///
    /// ```
    /// use rover_link::fusion::SpeedMode;
    ///
    /// assert_eq!(SpeedMode::Slow.multiplier(), 0.3);
    /// assert_eq!(SpeedMode::Fast.multiplier(), 1.0);
    /// ```
    #[must_use]
    pub fn multiplier(self) -> f32 {
        match self {
            SpeedMode::Slow => 0.3,
            SpeedMode::Standard => 0.5,
            SpeedMode::Fast => 1.0,
        }
    }

    /// Continuous multiplier from analog trigger pressure (0.0..=1.0 each).
    ///
    /// # Examples
    ///
    /// ```
    /// use rover_link::fusion::SpeedMode;
    ///
    /// assert_eq!(SpeedMode::from_triggers(0.0, 0.0), 0.5);
    /// assert_eq!(SpeedMode::from_triggers(0.0, 1.0), 1.0);
    /// assert!((SpeedMode::from_triggers(1.0, 0.0) - 0.3).abs() < 1e-6);
    /// ```
    #[must_use]
    pub fn from_triggers(l2: f32, r2: f32) -> f32 {
        Self::from_triggers_with_threshold(l2, r2, TRIGGER_THRESHOLD)
    }

    /// [`SpeedMode::from_triggers`] with a configurable release threshold.
    #[must_use]
    pub fn from_triggers_with_threshold(l2: f32, r2: f32, threshold: f32) -> f32 {
        let l2 = l2.clamp(0.0, 1.0);
        let r2 = r2.clamp(0.0, 1.0);

        let multiplier = if r2 > threshold {
            0.5 + 0.5 * r2
        } else if l2 > threshold {
            0.5 - 0.2 * l2
        } else {
            SpeedMode::Standard.multiplier()
        };

        multiplier.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER)
    }

    /// Parses `slow`, `standard` or `fast` (case-insensitive).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "slow" => Some(SpeedMode::Slow),
            "standard" => Some(SpeedMode::Standard),
            "fast" => Some(SpeedMode::Fast),
            _ => None,
        }
    }
}

impl std::fmt::Display for SpeedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SpeedMode::Slow => "slow",
            SpeedMode::Standard => "standard",
            SpeedMode::Fast => "fast",
        };
        f.write_str(name)
    }
}
