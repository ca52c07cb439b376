//! # Remote Shell
//!
//! Password-authenticated SSH session used to (re)start the robot's servers.
//!
//! libssh2 is blocking, so every session operation runs on the blocking
//! thread pool. Failures never escape as errors: `connect` reports a boolean
//! and `execute` folds transport problems into the returned text, which the
//! caller pattern-matches.
//!
//! Host keys are not verified. The robot lives on a closed LAN and its key
//! changes whenever the SD card is re-flashed.

use async_trait::async_trait;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Result, RoverLinkError};

/// Default SSH port
pub const SSH_PORT: u16 = 22;

/// Returned by `execute` when the command printed nothing
pub const NO_OUTPUT: &str = "Command executed with no output.";

/// Returned by `execute` when no session is open
pub const NOT_CONNECTED: &str = "Cannot execute command, not connected.";

/// Prefix of `execute` output when the exec channel itself failed
pub const EXCEPTION_PREFIX: &str = "Exception: ";

/// Remote command execution on the robot host
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteShell: Send {
    /// Open and authenticate a session, replacing any previous one
    async fn connect(&mut self, host: &str, user: &str, password: &str) -> bool;

    /// Run one command to completion and return its captured output
    async fn execute(&mut self, command: &str) -> String;

    /// Close the session. Safe to call repeatedly.
    async fn disconnect(&mut self);
}

/// Concatenate captured streams the way callers expect to scan them.
///
/// Every stdout line is kept, followed by every stderr line prefixed with
/// `ERROR: `. Whitespace-only output becomes [`NO_OUTPUT`].
///
/// # Examples
///
/// ```
/// use rover_link::remote::ssh::{assemble_output, NO_OUTPUT};
///
/// assert_eq!(assemble_output("ok\n", "bad\n"), "ok\nERROR: bad\n");
/// assert_eq!(assemble_output("", "  \n"), "ERROR:   \n");
/// assert_eq!(assemble_output("\n", ""), NO_OUTPUT);
/// ```
pub fn assemble_output(stdout: &str, stderr: &str) -> String {
    let mut output = String::with_capacity(stdout.len() + stderr.len());
    for line in stdout.lines() {
        output.push_str(line);
        output.push('\n');
    }
    for line in stderr.lines() {
        output.push_str("ERROR: ");
        output.push_str(line);
        output.push('\n');
    }

    if output.trim().is_empty() {
        NO_OUTPUT.to_string()
    } else {
        output
    }
}

/// [`RemoteShell`] backed by libssh2
pub struct SshSession {
    port: u16,
    timeout: Duration,
    exec_timeout: Duration,
    session: Option<ssh2::Session>,
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .field("exec_timeout", &self.exec_timeout)
            .field("connected", &self.session.is_some())
            .finish()
    }
}

impl SshSession {
    /// `timeout` bounds the TCP connect, the handshake and authentication.
    /// Remote commands run without a limit unless one is set with
    /// [`SshSession::with_exec_timeout`].
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self {
            port,
            timeout,
            exec_timeout: Duration::ZERO,
            session: None,
        }
    }

    /// Bound each remote command; `Duration::ZERO` waits until it exits
    #[must_use]
    pub fn with_exec_timeout(mut self, exec_timeout: Duration) -> Self {
        self.exec_timeout = exec_timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

#[async_trait]
impl RemoteShell for SshSession {
    async fn connect(&mut self, host: &str, user: &str, password: &str) -> bool {
        self.disconnect().await;

        let host = host.to_string();
        let user = user.to_string();
        let password = password.to_string();
        let (port, timeout) = (self.port, self.timeout);
        let target = format!("{}@{}:{}", user, host, port);

        let opened = tokio::task::spawn_blocking(move || {
            open_session(&host, port, &user, &password, timeout)
        })
        .await;

        match opened {
            Ok(Ok(session)) => {
                info!("SSH session open to {}", target);
                self.session = Some(session);
                true
            }
            Ok(Err(e)) => {
                warn!("SSH connection to {} failed: {}", target, e);
                false
            }
            Err(e) => {
                warn!("SSH connect task failed: {}", e);
                false
            }
        }
    }

    async fn execute(&mut self, command: &str) -> String {
        let Some(session) = self.session.clone() else {
            warn!("SSH exec without a session: {}", command);
            return NOT_CONNECTED.to_string();
        };

        debug!("SSH exec: {}", command);
        let owned = command.to_string();
        let limits = (libssh2_millis(self.exec_timeout), libssh2_millis(self.timeout));
        let ran = tokio::task::spawn_blocking(move || {
            session.set_timeout(limits.0);
            let result = run_command(&session, &owned);
            session.set_timeout(limits.1);
            result
        })
        .await;

        match ran {
            Ok(Ok((stdout, stderr))) => assemble_output(&stdout, &stderr),
            Ok(Err(e)) => {
                warn!("SSH exec '{}' failed: {}", command, e);
                format!("{}{}", EXCEPTION_PREFIX, e)
            }
            Err(e) => format!("{}{}", EXCEPTION_PREFIX, e),
        }
    }

    async fn disconnect(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        let closed = tokio::task::spawn_blocking(move || {
            session.disconnect(None, "session closed", None)
        })
        .await;

        match closed {
            Ok(Ok(())) => info!("SSH session closed"),
            Ok(Err(e)) => debug!("SSH disconnect: {}", e),
            Err(e) => debug!("SSH disconnect task failed: {}", e),
        }
    }
}

fn open_session(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    timeout: Duration,
) -> Result<ssh2::Session> {
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| RoverLinkError::Ssh(format!("cannot resolve {}", host)))?;
    let tcp = TcpStream::connect_timeout(&addr, timeout)?;

    let mut session = ssh2::Session::new()?;
    session.set_tcp_stream(tcp);
    session.set_timeout(libssh2_millis(timeout));
    session.handshake()?;
    session.userauth_password(user, password)?;

    if !session.authenticated() {
        return Err(RoverLinkError::Ssh("authentication failed".to_string()));
    }
    Ok(session)
}

/// libssh2 timeout value, where 0 disables the limit
fn libssh2_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

/// Exec one command, draining stdout then stderr before closing the channel
fn run_command(session: &ssh2::Session, command: &str) -> Result<(String, String)> {
    let mut channel = session.channel_session()?;
    channel.exec(command)?;

    let mut stdout = Vec::new();
    channel.read_to_end(&mut stdout)?;
    let mut stderr = Vec::new();
    channel.stderr().read_to_end(&mut stderr)?;

    channel.wait_close()?;
    if let Ok(status) = channel.exit_status() {
        debug!("'{}' exited with {}", command, status);
    }

    Ok((
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdout_lines_keep_newlines() {
        assert_eq!(assemble_output("a\nb", ""), "a\nb\n");
        assert_eq!(assemble_output("a\r\nb\r\n", ""), "a\nb\n");
    }

    #[test]
    fn test_stderr_lines_are_prefixed_after_stdout() {
        assert_eq!(
            assemble_output("started\n", "warn 1\nwarn 2\n"),
            "started\nERROR: warn 1\nERROR: warn 2\n"
        );
    }

    #[test]
    fn test_blank_output_is_sentinel() {
        assert_eq!(assemble_output("", ""), NO_OUTPUT);
        assert_eq!(assemble_output(" \n\t\n", ""), NO_OUTPUT);
    }

    #[test]
    fn test_commands_are_unbounded_by_default() {
        let shell = SshSession::new(SSH_PORT, Duration::from_secs(10));
        assert_eq!(shell.exec_timeout, Duration::ZERO);
        assert_eq!(libssh2_millis(shell.exec_timeout), 0);
        assert_eq!(libssh2_millis(shell.timeout), 10_000);

        let bounded = shell.with_exec_timeout(Duration::from_secs(30));
        assert_eq!(libssh2_millis(bounded.exec_timeout), 30_000);
    }

    #[tokio::test]
    async fn test_execute_without_session() {
        let mut shell = SshSession::new(SSH_PORT, Duration::from_secs(1));
        assert_eq!(shell.execute("uptime").await, NOT_CONNECTED);
        shell.disconnect().await;
        shell.disconnect().await;
        assert!(!shell.is_connected());
    }

    #[tokio::test]
    async fn test_connect_refused_is_false() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut shell = SshSession::new(port, Duration::from_millis(500));
        assert!(!shell.connect("127.0.0.1", "pi", "raspberry").await);
        assert!(!shell.is_connected());
    }

    #[tokio::test]
    #[ignore] // Requires a reachable SSH host
    async fn test_real_host_echo() {
        let mut shell = SshSession::new(SSH_PORT, Duration::from_secs(10));
        assert!(shell.connect("192.168.1.50", "pi", "raspberry").await);
        assert_eq!(shell.execute("echo hello").await, "hello\n");
        shell.disconnect().await;
    }

    #[tokio::test]
    #[ignore] // Requires a reachable SSH host
    async fn test_real_host_command_outlasts_login_timeout() {
        let mut shell = SshSession::new(SSH_PORT, Duration::from_secs(1));
        assert!(shell.connect("192.168.1.50", "pi", "raspberry").await);
        assert_eq!(shell.execute("sleep 3; echo done").await, "done\n");
        shell.disconnect().await;
    }
}
