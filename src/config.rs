//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, RoverLinkError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub ports: PortConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Robot host and login
#[derive(Debug, Deserialize, Clone)]
pub struct RobotConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
}

/// TCP ports of the robot-side servers
#[derive(Debug, Deserialize, Clone)]
pub struct PortConfig {
    #[serde(default = "default_control_port")]
    pub control: u16,

    #[serde(default = "default_led_port")]
    pub led: u16,

    #[serde(default = "default_line_follow_port")]
    pub line_follow: u16,
}

/// Socket and session timeouts
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_control_read_timeout_ms")]
    pub control_read_timeout_ms: u64,

    #[serde(default = "default_led_timeout_ms")]
    pub led_timeout_ms: u64,

    #[serde(default = "default_line_follow_timeout_ms")]
    pub line_follow_timeout_ms: u64,

    #[serde(default = "default_ssh_timeout_ms")]
    pub ssh_timeout_ms: u64,

    /// Limit on a single remote command; 0 waits until it exits
    #[serde(default = "default_ssh_exec_timeout_ms")]
    pub ssh_exec_timeout_ms: u64,
}

/// Gamepad configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Empty means auto-detect.
    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_stick_deadzone")]
    pub stick_deadzone: f32,

    #[serde(default = "default_trigger_threshold")]
    pub trigger_threshold: f32,

    #[serde(default = "default_axis_min")]
    pub axis_min: i32,

    #[serde(default = "default_axis_max")]
    pub axis_max: i32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Input fusion and gating
#[derive(Debug, Deserialize, Clone)]
pub struct FusionConfig {
    /// Touch joystick radius in pixels.
    #[serde(default = "default_joystick_radius")]
    pub joystick_radius: f32,

    #[serde(default = "default_motion_threshold")]
    pub motion_threshold: f32,

    #[serde(default = "default_camera_threshold")]
    pub camera_threshold: f32,

    #[serde(default = "default_true")]
    pub invert_move_x: bool,

    #[serde(default = "default_true")]
    pub invert_move_y: bool,

    #[serde(default = "default_true")]
    pub invert_camera_x: bool,

    #[serde(default = "default_true")]
    pub invert_camera_y: bool,
}

/// Dispatch loop timing
#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_server_settle_ms")]
    pub server_settle_ms: u64,

    #[serde(default = "default_log_fetch_delay_ms")]
    pub log_fetch_delay_ms: u64,

    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// Pause between killing and relaunching the LED server
    #[serde(default = "default_led_restart_gap_ms")]
    pub led_restart_gap_ms: u64,

    /// Pause between SSH login and the line-follow connect
    #[serde(default = "default_line_follow_settle_ms")]
    pub line_follow_settle_ms: u64,
}

/// Remote commands run over SSH
#[derive(Debug, Deserialize, Clone)]
pub struct BootstrapConfig {
    #[serde(default = "default_start_command")]
    pub start_command: String,

    #[serde(default = "default_log_command")]
    pub log_command: String,

    #[serde(default = "default_led_kill_command")]
    pub led_kill_command: String,

    #[serde(default = "default_led_start_command")]
    pub led_start_command: String,

    /// The tune name is appended as the last argument.
    #[serde(default = "default_buzzer_command")]
    pub buzzer_command: String,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Empty disables the rolling log file.
    #[serde(default)]
    pub dir: String,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

// Default value functions
fn default_host() -> String { "192.168.1.50".to_string() }
fn default_user() -> String { "pi".to_string() }
fn default_password() -> String { "raspberry".to_string() }
fn default_ssh_port() -> u16 { 22 }

fn default_control_port() -> u16 { 5555 }
fn default_led_port() -> u16 { 5556 }
fn default_line_follow_port() -> u16 { 5003 }

fn default_connect_timeout_ms() -> u64 { 5000 }
fn default_control_read_timeout_ms() -> u64 { 5000 }
fn default_led_timeout_ms() -> u64 { 5000 }
fn default_line_follow_timeout_ms() -> u64 { 10000 }
fn default_ssh_timeout_ms() -> u64 { 10000 }
fn default_ssh_exec_timeout_ms() -> u64 { 0 }

fn default_stick_deadzone() -> f32 { 0.15 }
fn default_trigger_threshold() -> f32 { 0.1 }
fn default_axis_min() -> i32 { 0 }
fn default_axis_max() -> i32 { 255 }
fn default_poll_interval_ms() -> u64 { 2000 }

fn default_joystick_radius() -> f32 { 60.0 }
fn default_motion_threshold() -> f32 { 0.20 }
fn default_camera_threshold() -> f32 { 0.15 }
fn default_true() -> bool { true }

fn default_tick_interval_ms() -> u64 { 50 }
fn default_server_settle_ms() -> u64 { 2000 }
fn default_log_fetch_delay_ms() -> u64 { 500 }
fn default_stop_grace_ms() -> u64 { 100 }
fn default_led_restart_gap_ms() -> u64 { 500 }
fn default_line_follow_settle_ms() -> u64 { 1000 }

fn default_start_command() -> String {
    "sudo python3 '/home/pi/Android App/start_servers.py' 2>&1".to_string()
}
fn default_log_command() -> String {
    "echo '=== LOG JOYSTICK SERVER ===' && cat /tmp/joystick_server.log 2>&1 && echo '\\n=== LOG CAMERA STREAM ===' && cat /tmp/camera_stream.log 2>&1".to_string()
}
fn default_led_kill_command() -> String { "sudo pkill -f led_server.py".to_string() }
fn default_led_start_command() -> String {
    "sudo nohup python3 '/home/pi/Android App/led_server.py' > /tmp/led_server.log 2>&1 &".to_string()
}
fn default_buzzer_command() -> String {
    "sudo python3 '/home/pi/Android App/buzzer_control.py'".to_string()
}

fn default_file_prefix() -> String { "rover-link.log".to_string() }

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            user: default_user(),
            password: default_password(),
            ssh_port: default_ssh_port(),
        }
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            control: default_control_port(),
            led: default_led_port(),
            line_follow: default_line_follow_port(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            control_read_timeout_ms: default_control_read_timeout_ms(),
            led_timeout_ms: default_led_timeout_ms(),
            line_follow_timeout_ms: default_line_follow_timeout_ms(),
            ssh_timeout_ms: default_ssh_timeout_ms(),
            ssh_exec_timeout_ms: default_ssh_exec_timeout_ms(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            stick_deadzone: default_stick_deadzone(),
            trigger_threshold: default_trigger_threshold(),
            axis_min: default_axis_min(),
            axis_max: default_axis_max(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            joystick_radius: default_joystick_radius(),
            motion_threshold: default_motion_threshold(),
            camera_threshold: default_camera_threshold(),
            invert_move_x: true,
            invert_move_y: true,
            invert_camera_x: true,
            invert_camera_y: true,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            server_settle_ms: default_server_settle_ms(),
            log_fetch_delay_ms: default_log_fetch_delay_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            led_restart_gap_ms: default_led_restart_gap_ms(),
            line_follow_settle_ms: default_line_follow_settle_ms(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            start_command: default_start_command(),
            log_command: default_log_command(),
            led_kill_command: default_led_kill_command(),
            led_start_command: default_led_start_command(),
            buzzer_command: default_buzzer_command(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: String::new(),
            file_prefix: default_file_prefix(),
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn control_read(&self) -> Duration {
        Duration::from_millis(self.control_read_timeout_ms)
    }

    pub fn led(&self) -> Duration {
        Duration::from_millis(self.led_timeout_ms)
    }

    pub fn line_follow(&self) -> Duration {
        Duration::from_millis(self.line_follow_timeout_ms)
    }

    pub fn ssh(&self) -> Duration {
        Duration::from_millis(self.ssh_timeout_ms)
    }

    /// `Duration::ZERO` means no limit
    pub fn ssh_exec(&self) -> Duration {
        Duration::from_millis(self.ssh_exec_timeout_ms)
    }
}

impl DispatchConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn server_settle(&self) -> Duration {
        Duration::from_millis(self.server_settle_ms)
    }

    pub fn log_fetch_delay(&self) -> Duration {
        Duration::from_millis(self.log_fetch_delay_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn led_restart_gap(&self) -> Duration {
        Duration::from_millis(self.led_restart_gap_ms)
    }

    pub fn line_follow_settle(&self) -> Duration {
        Duration::from_millis(self.line_follow_settle_ms)
    }
}

fn invalid(msg: impl std::fmt::Display) -> RoverLinkError {
    RoverLinkError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rover_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.robot.host.trim().is_empty() {
            return Err(invalid("robot host cannot be empty"));
        }

        if self.robot.user.is_empty() {
            return Err(invalid("robot user cannot be empty"));
        }

        for (name, port) in [
            ("ssh_port", self.robot.ssh_port),
            ("control", self.ports.control),
            ("led", self.ports.led),
            ("line_follow", self.ports.line_follow),
        ] {
            if port == 0 {
                return Err(invalid(format!("{} port must be non-zero", name)));
            }
        }

        let channel_ports = [self.ports.control, self.ports.led, self.ports.line_follow];
        if channel_ports[0] == channel_ports[1]
            || channel_ports[0] == channel_ports[2]
            || channel_ports[1] == channel_ports[2]
        {
            return Err(invalid("control, led and line_follow ports must be distinct"));
        }

        for (name, value) in [
            ("connect_timeout_ms", self.timeouts.connect_timeout_ms),
            ("control_read_timeout_ms", self.timeouts.control_read_timeout_ms),
            ("led_timeout_ms", self.timeouts.led_timeout_ms),
            ("line_follow_timeout_ms", self.timeouts.line_follow_timeout_ms),
            ("ssh_timeout_ms", self.timeouts.ssh_timeout_ms),
        ] {
            if value == 0 || value > 60000 {
                return Err(invalid(format!("{} must be between 1 and 60000", name)));
            }
        }

        if self.timeouts.ssh_exec_timeout_ms > 600_000 {
            return Err(invalid("ssh_exec_timeout_ms must be at most 600000"));
        }

        if !(0.0..=0.5).contains(&self.controller.stick_deadzone) {
            return Err(invalid("stick_deadzone must be between 0.0 and 0.5"));
        }

        if !(0.0..1.0).contains(&self.controller.trigger_threshold) {
            return Err(invalid("trigger_threshold must be between 0.0 and 1.0"));
        }

        if self.controller.axis_min >= self.controller.axis_max {
            return Err(invalid("axis_min must be less than axis_max"));
        }

        if self.controller.poll_interval_ms == 0 || self.controller.poll_interval_ms > 60000 {
            return Err(invalid("poll_interval_ms must be between 1 and 60000"));
        }

        if self.fusion.joystick_radius.is_nan() || self.fusion.joystick_radius <= 0.0 {
            return Err(invalid("joystick_radius must be greater than 0"));
        }

        for (name, value) in [
            ("motion_threshold", self.fusion.motion_threshold),
            ("camera_threshold", self.fusion.camera_threshold),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(invalid(format!("{} must be between 0.0 and 1.0", name)));
            }
        }

        if self.dispatch.tick_interval_ms == 0 || self.dispatch.tick_interval_ms > 1000 {
            return Err(invalid("tick_interval_ms must be between 1 and 1000"));
        }

        if self.dispatch.server_settle_ms > 60000 {
            return Err(invalid("server_settle_ms must be at most 60000"));
        }

        if self.bootstrap.start_command.trim().is_empty() {
            return Err(invalid("bootstrap start_command cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[robot]
host = "10.0.0.7"

[ports]

[fusion]
joystick_radius = 80.0
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.robot.host, "10.0.0.7");
        assert_eq!(config.robot.user, "pi");
        assert_eq!(config.ports.control, 5555);
        assert_eq!(config.fusion.joystick_radius, 80.0);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config = Config::parse(include_str!("../config/default.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(config.robot.host, defaults.robot.host);
        assert_eq!(config.ports.control, defaults.ports.control);
        assert_eq!(config.dispatch.tick_interval_ms, defaults.dispatch.tick_interval_ms);
        assert_eq!(config.timeouts.ssh_exec_timeout_ms, defaults.timeouts.ssh_exec_timeout_ms);
        assert_eq!(config.bootstrap.start_command, defaults.bootstrap.start_command);
        assert_eq!(config.bootstrap.log_command, defaults.bootstrap.log_command);
        assert_eq!(config.bootstrap.led_start_command, defaults.bootstrap.led_start_command);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.ports.led, 5556);
        assert_eq!(config.ports.line_follow, 5003);
        assert_eq!(config.timeouts.line_follow_timeout_ms, 10000);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/rover-link.toml").unwrap_err();
        assert!(matches!(err, RoverLinkError::Io(_)));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = Config::parse("[robot\nhost = 1").unwrap_err();
        assert!(matches!(err, RoverLinkError::Config(_)));
    }

    #[test]
    fn test_empty_host() {
        let mut config = Config::default();
        config.robot.host = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_port() {
        let mut config = Config::default();
        config.ports.led = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_ports() {
        let mut config = Config::default();
        config.ports.led = config.ports.control;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_zero() {
        let mut config = Config::default();
        config.timeouts.led_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_too_high() {
        let mut config = Config::default();
        config.timeouts.connect_timeout_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_exec_timeout_bounds() {
        let mut config = Config::parse("[timeouts]\nssh_exec_timeout_ms = 30000\n").unwrap();
        assert_eq!(config.timeouts.ssh_exec(), Duration::from_secs(30));
        config.timeouts.ssh_exec_timeout_ms = 600_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deadzone_out_of_range() {
        let mut config = Config::default();
        config.controller.stick_deadzone = 0.6;
        assert!(config.validate().is_err());
        config.controller.stick_deadzone = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_axis_range_inverted() {
        let mut config = Config::default();
        config.controller.axis_min = 255;
        config.controller.axis_max = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_joystick_radius_zero() {
        let mut config = Config::default();
        config.fusion.joystick_radius = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = Config::default();
        config.fusion.motion_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_interval_bounds() {
        let mut config = Config::default();
        config.dispatch.tick_interval_ms = 0;
        assert!(config.validate().is_err());
        config.dispatch.tick_interval_ms = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_ssh_port(), 22);
        assert_eq!(default_control_port(), 5555);
        assert_eq!(default_led_port(), 5556);
        assert_eq!(default_line_follow_port(), 5003);
        assert_eq!(default_led_timeout_ms(), 5000);
        assert_eq!(default_line_follow_timeout_ms(), 10000);
        assert_eq!(default_stick_deadzone(), 0.15);
        assert_eq!(default_trigger_threshold(), 0.1);
        assert_eq!(default_poll_interval_ms(), 2000);
        assert_eq!(default_joystick_radius(), 60.0);
        assert_eq!(default_motion_threshold(), 0.20);
        assert_eq!(default_camera_threshold(), 0.15);
        assert_eq!(default_tick_interval_ms(), 50);
        assert_eq!(default_server_settle_ms(), 2000);
        assert_eq!(default_led_restart_gap_ms(), 500);
        assert_eq!(default_line_follow_settle_ms(), 1000);
    }

    #[test]
    fn test_timeout_durations() {
        let timeouts = TimeoutConfig::default();
        assert_eq!(timeouts.led(), Duration::from_secs(5));
        assert_eq!(timeouts.line_follow(), Duration::from_secs(10));
        assert_eq!(timeouts.ssh(), Duration::from_secs(10));
        // The start script can outlast the login timeout
        assert_eq!(timeouts.ssh_exec(), Duration::ZERO);

        let dispatch = DispatchConfig::default();
        assert_eq!(dispatch.tick(), Duration::from_millis(50));
        assert_eq!(dispatch.stop_grace(), Duration::from_millis(100));
    }
}
