//! # LED Link
//!
//! Request/response client for the LED server (port 5556).
//!
//! Every command is answered by one line; `OK` is success and anything else
//! is a rejection.

use std::fmt;
use std::time::Duration;
use tracing::info;

use super::accessory::AccessoryLink;
use crate::error::{Result, RoverLinkError};

/// Default LED server port
pub const LED_PORT: u16 = 5556;

/// Lighting effects understood by the LED server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedEffect {
    Static,
    Rainbow,
    Blink,
    Breathe,
}

impl LedEffect {
    pub fn as_str(self) -> &'static str {
        match self {
            LedEffect::Static => "static",
            LedEffect::Rainbow => "rainbow",
            LedEffect::Blink => "blink",
            LedEffect::Breathe => "breathe",
        }
    }
}

impl fmt::Display for LedEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client for the LED strip server
#[derive(Debug)]
pub struct LedLink {
    link: AccessoryLink,
}

impl Default for LedLink {
    fn default() -> Self {
        Self::new()
    }
}

impl LedLink {
    pub fn new() -> Self {
        Self {
            link: AccessoryLink::new("LED", Some("QUIT")),
        }
    }

    pub async fn connect(
        &mut self,
        host: &str,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<()> {
        self.link
            .connect(host, port, connect_timeout, read_timeout)
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub async fn turn_on(&mut self) -> Result<()> {
        self.command("ON".to_string()).await
    }

    pub async fn turn_off(&mut self) -> Result<()> {
        self.command("OFF".to_string()).await
    }

    pub async fn set_color(&mut self, red: u8, green: u8, blue: u8) -> Result<()> {
        self.command(format!("COLOR {} {} {}", red, green, blue))
            .await
    }

    /// Brightness in percent, clamped to 0..=100
    pub async fn set_brightness(&mut self, percent: u8) -> Result<()> {
        self.command(format!("BRIGHTNESS {}", percent.min(100)))
            .await
    }

    pub async fn set_effect(&mut self, effect: LedEffect) -> Result<()> {
        self.command(format!("EFFECT {}", effect)).await
    }

    /// Sends `QUIT` and closes the socket. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        self.link.disconnect().await;
    }

    async fn command(&mut self, line: String) -> Result<()> {
        let reply = self.link.request(&line).await?;
        if reply == "OK" {
            info!("LED {}: OK", line);
            Ok(())
        } else {
            info!("LED {}: {}", line, reply);
            Err(RoverLinkError::Rejected(reply))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const SHORT: Duration = Duration::from_millis(200);

    /// Mock LED server replying `reply` to each line, or staying silent on `None`.
    async fn mock_led_server(reply: Option<&'static str>) -> (u16, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (r, mut w) = socket.into_split();
            let mut lines = BufReader::new(r).lines();
            let mut received = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                received.push(line);
                if let Some(reply) = reply {
                    w.write_all(format!("{}\n", reply).as_bytes()).await.unwrap();
                }
            }
            received
        });
        (port, handle)
    }

    async fn connected(port: u16) -> LedLink {
        let mut led = LedLink::new();
        led.connect("127.0.0.1", port, SHORT, SHORT).await.unwrap();
        led
    }

    #[tokio::test]
    async fn test_color_ok() {
        let (port, server) = mock_led_server(Some("OK")).await;
        let mut led = connected(port).await;

        assert!(led.set_color(255, 0, 0).await.is_ok());
        led.disconnect().await;

        assert_eq!(server.await.unwrap(), vec!["COLOR 255 0 0", "QUIT"]);
    }

    #[tokio::test]
    async fn test_color_rejected() {
        let (port, _server) = mock_led_server(Some("FAIL")).await;
        let mut led = connected(port).await;

        match led.set_color(255, 0, 0).await {
            Err(RoverLinkError::Rejected(reply)) => assert_eq!(reply, "FAIL"),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_color_timeout() {
        let (port, _server) = mock_led_server(None).await;
        let mut led = connected(port).await;

        let err = led.set_color(255, 0, 0).await.unwrap_err();
        assert!(matches!(err, RoverLinkError::Timeout), "got {:?}", err);
        assert!(!led.is_connected());
    }

    #[tokio::test]
    async fn test_command_lines() {
        let (port, server) = mock_led_server(Some("OK")).await;
        let mut led = connected(port).await;

        led.turn_on().await.unwrap();
        led.set_brightness(150).await.unwrap();
        led.set_effect(LedEffect::Rainbow).await.unwrap();
        led.turn_off().await.unwrap();
        led.disconnect().await;
        led.disconnect().await;

        assert_eq!(
            server.await.unwrap(),
            vec!["ON", "BRIGHTNESS 100", "EFFECT rainbow", "OFF", "QUIT"]
        );
    }

    #[tokio::test]
    async fn test_not_connected() {
        let mut led = LedLink::new();
        assert!(matches!(
            led.turn_on().await,
            Err(RoverLinkError::NotConnected(_))
        ));
    }

    #[test]
    fn test_effect_names() {
        assert_eq!(LedEffect::Static.to_string(), "static");
        assert_eq!(LedEffect::Breathe.as_str(), "breathe");
    }
}
