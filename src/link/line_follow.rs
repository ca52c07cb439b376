//! # Line-Follow Link
//!
//! Request/response client for the line-follow server (port 5003).
//!
//! Replies carry a status prefix:
//!
//! | Reply | Result |
//! |-------|--------|
//! | `OK:<payload>` | `Ok(payload)` |
//! | `ERROR:<reason>` | `Err(Rejected(reason))` |
//! | anything else | `Err(UnexpectedReply(line))` |

use std::time::Duration;
use tracing::{info, warn};

use super::accessory::AccessoryLink;
use crate::error::{Result, RoverLinkError};

/// Default line-follow server port
pub const LINE_FOLLOW_PORT: u16 = 5003;

/// Slowest speed the server accepts
pub const MIN_SPEED: u8 = 10;
/// Fastest speed the server accepts
pub const MAX_SPEED: u8 = 100;

/// Map one reply line onto the line-follow result grammar.
///
/// # Examples
///
/// ```
/// use rover_link::link::line_follow::parse_reply;
///
/// assert_eq!(parse_reply("OK:Calibrated").unwrap(), "Calibrated");
/// assert!(parse_reply("ERROR:Not calibrated").is_err());
/// ```
pub fn parse_reply(reply: &str) -> Result<String> {
    if let Some(payload) = reply.strip_prefix("OK:") {
        Ok(payload.to_string())
    } else if let Some(reason) = reply.strip_prefix("ERROR:") {
        Err(RoverLinkError::Rejected(reason.to_string()))
    } else {
        Err(RoverLinkError::UnexpectedReply(reply.to_string()))
    }
}

/// Client for the line-follow server
#[derive(Debug)]
pub struct LineFollowLink {
    link: AccessoryLink,
    following: bool,
}

impl Default for LineFollowLink {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFollowLink {
    pub fn new() -> Self {
        Self {
            link: AccessoryLink::new("line-follow", None).with_keepalive(),
            following: false,
        }
    }

    pub async fn connect(
        &mut self,
        host: &str,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<()> {
        self.following = false;
        self.link
            .connect(host, port, connect_timeout, read_timeout)
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Whether the last successful command was `start`
    pub fn is_following(&self) -> bool {
        self.following
    }

    pub async fn calibrate(&mut self) -> Result<String> {
        self.command("calibrate").await
    }

    pub async fn start(&mut self) -> Result<String> {
        let payload = self.command("start").await?;
        self.following = true;
        Ok(payload)
    }

    pub async fn stop(&mut self) -> Result<String> {
        let payload = self.command("stop").await?;
        self.following = false;
        Ok(payload)
    }

    /// Set the follow speed, clamped to 10..=100 before sending
    pub async fn set_speed(&mut self, speed: i32) -> Result<String> {
        let clamped = speed.clamp(i32::from(MIN_SPEED), i32::from(MAX_SPEED));
        self.command(&format!("speed:{}", clamped)).await
    }

    /// Query follower state. Any reply that is not `OK:` is a failure.
    pub async fn status(&mut self) -> Result<String> {
        let reply = self.link.request("status").await?;
        match reply.strip_prefix("OK:") {
            Some(payload) => Ok(payload.to_string()),
            None => {
                let reason = reply.strip_prefix("ERROR:").unwrap_or(&reply);
                Err(RoverLinkError::Rejected(reason.to_string()))
            }
        }
    }

    /// Stop the robot if it is following, then close the connection.
    pub async fn shutdown(&mut self) {
        if self.following {
            if let Err(e) = self.stop().await {
                warn!("Line follower did not stop cleanly: {}", e);
            }
        }
        self.disconnect().await;
    }

    /// Close the connection. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        self.following = false;
        self.link.disconnect().await;
    }

    async fn command(&mut self, line: &str) -> Result<String> {
        let reply = self.link.request(line).await?;
        let result = parse_reply(&reply);
        match &result {
            Ok(payload) => info!("line-follow {}: {}", line, payload),
            Err(e) => warn!("line-follow {} failed: {}", line, e),
        }
        result
    }
}
