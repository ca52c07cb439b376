//! # Server Bootstrap
//!
//! One-shot remote command sequences that (re)start the robot's servers
//! before a link connects.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use super::probe::{self, BootstrapReport};
use super::ssh::RemoteShell;
use crate::config::BootstrapConfig;

/// Run the start script and classify its output
pub async fn start_control_servers<S>(
    shell: &mut S,
    commands: &BootstrapConfig,
) -> (BootstrapReport, String)
where
    S: RemoteShell + ?Sized,
{
    info!("Starting control and camera servers");
    let output = shell.execute(&commands.start_command).await;
    let report = probe::interpret(&output);

    if !report.control_active {
        warn!("Control server did not report active");
    } else if !report.camera_available {
        warn!("Camera unavailable, continuing with control only");
    }
    (report, output)
}

/// Wait `delay`, then dump the server logs for diagnosis
pub async fn fetch_server_logs<S>(shell: &mut S, commands: &BootstrapConfig, delay: Duration) -> String
where
    S: RemoteShell + ?Sized,
{
    sleep(delay).await;
    let logs = shell.execute(&commands.log_command).await;
    for line in logs.lines() {
        warn!("remote: {}", line);
    }
    logs
}

/// Kill any running LED server and launch a detached replacement
///
/// Returns after `settle`, once the new server has had time to bind.
pub async fn restart_led_server<S>(
    shell: &mut S,
    commands: &BootstrapConfig,
    gap: Duration,
    settle: Duration,
) where
    S: RemoteShell + ?Sized,
{
    info!("Restarting LED server");
    shell.execute(&commands.led_kill_command).await;
    sleep(gap).await;
    shell.execute(&commands.led_start_command).await;
    sleep(settle).await;
}
