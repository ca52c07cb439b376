//! # Remote Module
//!
//! Command execution on the robot host over SSH.
//!
//! This module handles:
//! - The authenticated remote session and one-shot exec channels
//! - Starting the control, camera and LED servers
//! - Interpreting the start script's status markers
//! - Buzzer playback

pub mod bootstrap;
pub mod buzzer;
pub mod probe;
pub mod ssh;

pub use probe::BootstrapReport;
pub use ssh::{RemoteShell, SshSession};
