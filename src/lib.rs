//! # Rover Link Library
//!
//! Drive a networked wheeled robot from a gamepad or on-screen joysticks.
//!
//! This library boots the robot's servers over SSH, holds one fire-and-forget
//! control socket plus request/response sockets for the LED strip and the
//! line follower, and streams fused motion and camera vectors at a fixed rate.

pub mod config;
pub mod controller;
pub mod error;
pub mod fusion;
pub mod link;
pub mod remote;
pub mod session;
