//! # Link Module
//!
//! TCP channels to the robot's servers.
//!
//! This module handles:
//! - The fire-and-forget control socket (motion and camera vectors)
//! - Request/response accessory sockets (LED, line-follow)
//! - Newline-terminated line framing with bounded timeouts
//!
//! Each channel owns a distinct socket on a distinct port; none is shared
//! between two logical channels.

pub mod accessory;
pub mod control;
pub mod led;
pub mod line;
pub mod line_follow;

pub use accessory::AccessoryLink;
pub use control::{ControlFrame, ControlLink, ControlSender};
pub use led::{LedEffect, LedLink};
pub use line_follow::LineFollowLink;
