//! # Session Module
//!
//! Lifecycles that tie the remote shell, the links and the input layer
//! together.
//!
//! This module handles:
//! - The drive session state machine and its 50 ms dispatch loop
//! - The handle the UI uses to push touch input and observe status
//! - LED and line-follow session setup and teardown

pub mod accessory;
pub mod control;
pub mod dispatch;
pub mod state;

pub use accessory::{LedSession, LineFollowSession};
pub use control::{ControlSession, SessionHandle};
pub use state::{SessionOutcome, SessionPhase, SessionStatus};
