//! # Fusion Module
//!
//! Turns whichever input source is authoritative into the motion and camera
//! vectors sent on each tick.

pub mod engine;
pub mod speed;

pub use engine::{
    DriveCommand, FusedCommand, FusionSettings, InputFusionEngine, InputSource, StickInversion,
    TouchInput,
};
pub use speed::SpeedMode;
