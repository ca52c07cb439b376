//! # Accessory Link
//!
//! Request/response channel shared by the LED and line-follow links.
//!
//! Every request blocks for exactly one reply line. The link takes `&mut self`
//! per request, so a second request cannot be issued before the first one
//! resolves; the channel has no request identifiers to match replies with.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::line::LineChannel;
use crate::error::{Result, RoverLinkError};

/// One request/response connection to an accessory server
#[derive(Debug)]
pub struct AccessoryLink {
    name: &'static str,
    channel: Option<LineChannel>,
    quit: Option<&'static str>,
    keepalive: bool,
}

impl AccessoryLink {
    /// Create a closed link; `quit` is the farewell line sent on disconnect
    pub fn new(name: &'static str, quit: Option<&'static str>) -> Self {
        Self {
            name,
            channel: None,
            quit,
            keepalive: false,
        }
    }

    /// Set `SO_KEEPALIVE` on every connection this link opens
    #[must_use]
    pub fn with_keepalive(mut self) -> Self {
        self.keepalive = true;
        self
    }

    pub fn keepalive(&self) -> bool {
        self.keepalive
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Open the connection, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns `Timeout` or `Io` if the server cannot be reached.
    pub async fn connect(
        &mut self,
        host: &str,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<()> {
        self.disconnect().await;

        let channel = if self.keepalive {
            LineChannel::connect_with_keepalive(host, port, connect_timeout, read_timeout).await?
        } else {
            LineChannel::connect(host, port, connect_timeout, read_timeout).await?
        };
        info!("Connected to {} server at {}", self.name, channel.peer());
        self.channel = Some(channel);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Send one line and wait for its reply
    ///
    /// Any failure drops the connection. A late reply to a timed-out request
    /// would otherwise be read as the answer to the next one.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if [`AccessoryLink::connect`] has not succeeded
    /// - `Timeout`, `NoResponse` or `Io` from the underlying channel
    pub async fn request(&mut self, line: &str) -> Result<String> {
        let name = self.name;
        let channel = self
            .channel
            .as_mut()
            .ok_or(RoverLinkError::NotConnected(name))?;

        debug!("{} -> {}", name, line);
        match channel.request(line).await {
            Ok(reply) => {
                debug!("{} <- {}", name, reply);
                Ok(reply)
            }
            Err(e) => {
                match e {
                    RoverLinkError::Timeout => {
                        warn!("{} server did not answer '{}' in time", name, line)
                    }
                    _ => warn!("{} link failed on '{}': {}", name, line, e),
                }
                if let Some(channel) = self.channel.take() {
                    channel.close().await;
                }
                Err(e)
            }
        }
    }

    /// Best-effort farewell and close. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        let Some(mut channel) = self.channel.take() else {
            return;
        };

        if let Some(quit) = self.quit {
            if let Err(e) = channel.write_line(quit).await {
                debug!("{} farewell not delivered: {}", self.name, e);
            }
        }
        channel.close().await;
        info!("Disconnected from {} server", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    const SHORT: Duration = Duration::from_millis(200);

    /// Answers each line with the next canned reply, then records the rest.
    async fn scripted_server(replies: Vec<&'static str>) -> (u16, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (r, mut w) = socket.into_split();
            let mut lines = BufReader::new(r).lines();
            let mut replies = replies.into_iter();
            let mut received = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                received.push(line);
                if let Some(reply) = replies.next() {
                    w.write_all(format!("{}\n", reply).as_bytes()).await.unwrap();
                }
            }
            received
        });
        (port, handle)
    }

    #[tokio::test]
    async fn test_request_before_connect() {
        let mut link = AccessoryLink::new("LED", Some("QUIT"));
        let err = link.request("ON").await.unwrap_err();
        assert!(matches!(err, RoverLinkError::NotConnected("LED")));
    }

    #[tokio::test]
    async fn test_sequential_requests_and_quit() {
        let (port, server) = scripted_server(vec!["OK", "OK"]).await;
        let mut link = AccessoryLink::new("LED", Some("QUIT"));
        link.connect("127.0.0.1", port, SHORT, SHORT).await.unwrap();

        assert_eq!(link.request("ON").await.unwrap(), "OK");
        assert_eq!(link.request("OFF").await.unwrap(), "OK");
        link.disconnect().await;
        link.disconnect().await;

        assert!(!link.is_connected());
        assert_eq!(server.await.unwrap(), vec!["ON", "OFF", "QUIT"]);
    }

    #[tokio::test]
    async fn test_keepalive_reaches_the_socket() {
        let (port, _server) = scripted_server(vec![]).await;
        let mut link = AccessoryLink::new("line-follow", None).with_keepalive();
        link.connect("127.0.0.1", port, SHORT, SHORT).await.unwrap();

        assert!(link.channel.as_ref().unwrap().keepalive());
    }

    #[tokio::test]
    async fn test_eof_drops_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut link = AccessoryLink::new("line-follow", None);
        link.connect("127.0.0.1", port, SHORT, SHORT).await.unwrap();

        let err = link.request("status").await.unwrap_err();
        assert!(
            matches!(err, RoverLinkError::NoResponse | RoverLinkError::Io(_)),
            "got {:?}",
            err
        );
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_timeout_drops_connection() {
        let (port, _server) = scripted_server(vec![]).await;
        let mut link = AccessoryLink::new("LED", None);
        link.connect("127.0.0.1", port, SHORT, SHORT).await.unwrap();

        let err = link.request("ON").await.unwrap_err();
        assert!(matches!(err, RoverLinkError::Timeout));
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_late_reply_is_not_taken_for_next_answer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (r, mut w) = socket.into_split();
            let mut lines = BufReader::new(r).lines();
            let _ = lines.next_line().await;
            tokio::time::sleep(Duration::from_millis(300)).await;
            let _ = w.write_all(b"FAIL\n").await;
            while let Ok(Some(_)) = lines.next_line().await {
                let _ = w.write_all(b"OK\n").await;
            }
        });

        let mut link = AccessoryLink::new("LED", Some("QUIT"));
        link.connect("127.0.0.1", port, SHORT, SHORT).await.unwrap();

        let err = link.request("COLOR 255 0 0").await.unwrap_err();
        assert!(matches!(err, RoverLinkError::Timeout));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let err = link.request("ON").await.unwrap_err();
        assert!(matches!(err, RoverLinkError::NotConnected("LED")), "got {:?}", err);
    }
}
