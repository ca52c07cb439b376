//! # Line Channel
//!
//! Newline-terminated ASCII lines over one TCP connection.
//!
//! Each channel exclusively owns its socket, the buffered reader and the
//! writer. Control, LED and line-follow traffic each get their own channel on
//! their own port.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Result, RoverLinkError};

/// A connected line-oriented TCP channel
#[derive(Debug)]
pub struct LineChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    read_timeout: Duration,
    keepalive: bool,
}

impl LineChannel {
    /// Open a TCP connection with `TCP_NODELAY` set
    ///
    /// # Errors
    ///
    /// - `Timeout` if the connection is not established within `connect_timeout`
    /// - `Io` if the connection is refused or the address cannot be resolved
    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        Self::open(host, port, connect_timeout, read_timeout, false).await
    }

    /// Like [`LineChannel::connect`], with `SO_KEEPALIVE` set on the socket
    pub async fn connect_with_keepalive(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        Self::open(host, port, connect_timeout, read_timeout, true).await
    }

    async fn open(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
        keepalive: bool,
    ) -> Result<Self> {
        debug!("Connecting to {}:{} (keepalive {})", host, port, keepalive);

        let stream = timeout(connect_timeout, dial(host, port, keepalive))
            .await
            .map_err(|_| RoverLinkError::Timeout)??;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            peer,
            read_timeout,
            keepalive,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn keepalive(&self) -> bool {
        self.keepalive
    }

    /// Write `line` followed by `\n` and flush
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        write_line(&mut self.writer, line).await
    }

    /// Read one line, waiting at most the channel's read timeout
    ///
    /// # Errors
    ///
    /// - `Timeout` if no full line arrives in time
    /// - `NoResponse` if the peer closed the stream
    /// - `Io` on socket errors
    pub async fn read_line(&mut self) -> Result<String> {
        let mut buf = String::new();
        let read = timeout(self.read_timeout, self.reader.read_line(&mut buf))
            .await
            .map_err(|_| RoverLinkError::Timeout)??;

        if read == 0 {
            return Err(RoverLinkError::NoResponse);
        }

        Ok(buf.trim_end_matches(&['\r', '\n'][..]).to_string())
    }

    /// Write one line and block for exactly one reply line
    pub async fn request(&mut self, line: &str) -> Result<String> {
        self.write_line(line).await?;
        self.read_line().await
    }

    /// Split into the buffered reader and the writer
    pub fn into_split(self) -> (BufReader<OwnedReadHalf>, OwnedWriteHalf) {
        (self.reader, self.writer)
    }

    /// Close writer then reader; the socket closes when both halves drop
    pub async fn close(self) {
        let Self {
            reader,
            mut writer,
            peer,
            ..
        } = self;
        if let Err(e) = writer.shutdown().await {
            debug!("Shutdown of {} failed: {}", peer, e);
        }
        drop(writer);
        drop(reader);
    }
}

/// Try each resolved address in turn, returning the last failure
async fn dial(host: &str, port: u16, keepalive: bool) -> Result<TcpStream> {
    let mut last_error = None;
    for addr in lookup_host((host, port)).await? {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_keepalive(keepalive)?;

        match socket.connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no address for {}", host),
            )
        })
        .into())
}

/// Write `line` followed by `\n` and flush
pub(crate) async fn write_line(writer: &mut OwnedWriteHalf, line: &str) -> Result<()> {
    let mut bytes = Vec::with_capacity(line.len() + 1);
    bytes.extend_from_slice(line.as_bytes());
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
