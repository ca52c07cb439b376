//! # Accessory Sessions
//!
//! Scoped lifecycles for the LED and line-follow screens: SSH login, server
//! preparation, link connect, and ordered teardown.

use tracing::info;

use crate::config::Config;
use crate::error::{Result, RoverLinkError};
use crate::link::{LedLink, LineFollowLink};
use crate::remote::{bootstrap, RemoteShell};

async fn login<S: RemoteShell>(shell: &mut S, config: &Config) -> Result<()> {
    let robot = &config.robot;
    if shell.connect(&robot.host, &robot.user, &robot.password).await {
        Ok(())
    } else {
        Err(RoverLinkError::Ssh(format!(
            "login to {}@{} failed",
            robot.user, robot.host
        )))
    }
}

/// LED server session: restarts the server, then holds the LED link open
pub struct LedSession<S> {
    shell: S,
    led: LedLink,
}

impl<S: RemoteShell> LedSession<S> {
    /// # Errors
    ///
    /// - `Ssh` if the login fails
    /// - `Timeout` or `Io` if the restarted server cannot be reached
    pub async fn open(config: &Config, mut shell: S) -> Result<Self> {
        login(&mut shell, config).await?;
        info!("SSH connected. Starting LED server...");

        bootstrap::restart_led_server(
            &mut shell,
            &config.bootstrap,
            config.dispatch.led_restart_gap(),
            config.dispatch.server_settle(),
        )
        .await;

        let mut led = LedLink::new();
        if let Err(e) = led
            .connect(
                &config.robot.host,
                config.ports.led,
                config.timeouts.connect(),
                config.timeouts.led(),
            )
            .await
        {
            shell.disconnect().await;
            return Err(e);
        }

        Ok(Self { shell, led })
    }

    pub fn led(&mut self) -> &mut LedLink {
        &mut self.led
    }

    /// Close the LED link, then the SSH session
    pub async fn close(mut self) {
        self.led.disconnect().await;
        self.shell.disconnect().await;
    }
}

/// Line-follow session: holds the line-follow link open
pub struct LineFollowSession<S> {
    shell: S,
    link: LineFollowLink,
}

impl<S: RemoteShell> LineFollowSession<S> {
    /// # Errors
    ///
    /// - `Ssh` if the login fails
    /// - `Timeout` or `Io` if the line-follow server cannot be reached
    pub async fn open(config: &Config, mut shell: S) -> Result<Self> {
        login(&mut shell, config).await?;
        info!("SSH connected. Checking line-follow server...");
        tokio::time::sleep(config.dispatch.line_follow_settle()).await;

        let mut link = LineFollowLink::new();
        if let Err(e) = link
            .connect(
                &config.robot.host,
                config.ports.line_follow,
                config.timeouts.connect(),
                config.timeouts.line_follow(),
            )
            .await
        {
            shell.disconnect().await;
            return Err(e);
        }

        Ok(Self { shell, link })
    }

    pub fn link(&mut self) -> &mut LineFollowLink {
        &mut self.link
    }

    /// Stop the robot if it is following, then close link and SSH session
    pub async fn close(mut self) {
        self.link.shutdown().await;
        self.shell.disconnect().await;
    }
}
