//! # Rover Link
//!
//! Drive a networked wheeled robot from a gamepad over a low-latency TCP
//! control link, and poke its LED strip, line follower and buzzer.
//!
//! ```text
//! rover-link [-c config.toml] [drive [--speed slow|standard|fast]]
//! rover-link [-c config.toml] led <on|off|color R G B|brightness N|effect NAME>
//! rover-link [-c config.toml] line <calibrate|start|stop|status|speed N>
//! rover-link [-c config.toml] buzz <TUNE>
//! ```
//!
//! `drive` runs until Ctrl+C or until the control link is lost. `line start`
//! keeps the follower running until Ctrl+C, then stops it.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use rover_link::config::{Config, LoggingConfig};
use rover_link::controller::{GamepadMonitor, MonitorSettings};
use rover_link::fusion::SpeedMode;
use rover_link::link::LedEffect;
use rover_link::remote::buzzer::{self, Tune};
use rover_link::remote::{RemoteShell, SshSession};
use rover_link::session::{ControlSession, LedSession, LineFollowSession};

/// Used when no config path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Parser, Debug)]
#[command(name = "rover-link", version)]
#[command(about = "Drive a networked wheeled robot from a gamepad over TCP")]
struct Cli {
    /// Configuration file (defaults to config/default.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Stream gamepad motion and camera vectors until Ctrl+C
    Drive {
        /// Initial speed mode: slow, standard or fast
        #[arg(long, default_value = "standard", value_parser = parse_speed_mode)]
        speed: SpeedMode,
    },
    /// Restart the LED server and send it one command
    Led {
        #[command(subcommand)]
        action: LedAction,
    },
    /// Send one command to the line-follow server
    Line {
        #[command(subcommand)]
        action: LineAction,
    },
    /// Play a tune on the buzzer
    Buzz {
        #[arg(value_enum)]
        tune: CliTune,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq)]
enum LedAction {
    On,
    Off,
    Color {
        #[arg(value_parser = clap::value_parser!(u8))]
        red: u8,
        #[arg(value_parser = clap::value_parser!(u8))]
        green: u8,
        #[arg(value_parser = clap::value_parser!(u8))]
        blue: u8,
    },
    Brightness {
        /// Percent, 0 to 100
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        level: u8,
    },
    Effect {
        #[arg(value_enum, ignore_case = true)]
        effect: CliEffect,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq)]
enum LineAction {
    Calibrate,
    /// Start following and keep going until Ctrl+C
    Start,
    Stop,
    Status,
    /// Follow speed, clamped to 10..=100
    Speed {
        #[arg(allow_negative_numbers = true)]
        speed: i32,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum CliEffect {
    Static,
    Rainbow,
    Blink,
    Breathe,
}

impl From<CliEffect> for LedEffect {
    fn from(value: CliEffect) -> Self {
        match value {
            CliEffect::Static => LedEffect::Static,
            CliEffect::Rainbow => LedEffect::Rainbow,
            CliEffect::Blink => LedEffect::Blink,
            CliEffect::Breathe => LedEffect::Breathe,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum CliTune {
    #[value(name = "beep_short")]
    BeepShort,
    #[value(name = "beep_long")]
    BeepLong,
    #[value(name = "beep_double")]
    BeepDouble,
    #[value(name = "song_star_wars")]
    StarWars,
    #[value(name = "song_happy_birthday")]
    HappyBirthday,
    #[value(name = "song_super_mario")]
    SuperMario,
    #[value(name = "song_take_on_me")]
    TakeOnMe,
    #[value(name = "song_nokia_ringtone")]
    NokiaRingtone,
    #[value(name = "song_tetris")]
    Tetris,
    #[value(name = "song_imperial_march")]
    ImperialMarch,
    #[value(name = "song_jingle_bells")]
    JingleBells,
}

impl From<CliTune> for Tune {
    fn from(value: CliTune) -> Self {
        match value {
            CliTune::BeepShort => Tune::BeepShort,
            CliTune::BeepLong => Tune::BeepLong,
            CliTune::BeepDouble => Tune::BeepDouble,
            CliTune::StarWars => Tune::StarWars,
            CliTune::HappyBirthday => Tune::HappyBirthday,
            CliTune::SuperMario => Tune::SuperMario,
            CliTune::TakeOnMe => Tune::TakeOnMe,
            CliTune::NokiaRingtone => Tune::NokiaRingtone,
            CliTune::Tetris => Tune::Tetris,
            CliTune::ImperialMarch => Tune::ImperialMarch,
            CliTune::JingleBells => Tune::JingleBells,
        }
    }
}

fn parse_speed_mode(name: &str) -> Result<SpeedMode> {
    SpeedMode::parse(name).ok_or_else(|| anyhow!("expected slow, standard or fast"))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::load(DEFAULT_CONFIG_PATH).with_context(|| format!("loading {}", DEFAULT_CONFIG_PATH))
        }
        None => Ok(Config::default()),
    }
}

/// Console logging, plus a daily rolling file when `[logging] dir` is set
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = if config.dir.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&config.dir, &config.file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { config, command } = Cli::parse();
    let config = load_config(config.as_deref())?;

    let _log_guard = init_logging(&config.logging);
    info!("Rover Link v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Robot at {}@{}", config.robot.user, config.robot.host);

    let shell = SshSession::new(config.robot.ssh_port, config.timeouts.ssh())
        .with_exec_timeout(config.timeouts.ssh_exec());

    let command = command.unwrap_or(Commands::Drive {
        speed: SpeedMode::default(),
    });
    match command {
        Commands::Drive { speed } => drive(config, shell, speed).await,
        Commands::Led { action } => led_command(&config, shell, action).await,
        Commands::Line { action } => line_command(&config, shell, action).await,
        Commands::Buzz { tune } => buzz(&config, shell, tune.into()).await,
    }
}

/// Cancelled on the first Ctrl+C
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
        }
        trigger.cancel();
    });
    token
}

async fn drive(config: Config, shell: SshSession, speed: SpeedMode) -> Result<()> {
    let shutdown = shutdown_token();
    let monitor = GamepadMonitor::new(MonitorSettings::from(&config.controller));

    let session = ControlSession::new(config, shell)
        .with_gamepad_monitor(monitor)
        .with_parent_token(&shutdown);
    session.handle().set_speed_mode(speed);

    let mut status = session.handle().subscribe();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            info!(
                "status: {} (camera {}, input {})",
                current.message,
                if current.camera_available { "on" } else { "off" },
                current.gamepad_label.as_deref().unwrap_or("touch"),
            );
        }
    });

    let outcome = session.run().await;
    if outcome.is_failure() {
        bail!("session ended: {}", outcome);
    }
    Ok(())
}

async fn led_command(config: &Config, shell: SshSession, action: LedAction) -> Result<()> {
    let mut session = LedSession::open(config, shell)
        .await
        .context("starting LED session")?;

    let led = session.led();
    let result = match action {
        LedAction::On => led.turn_on().await,
        LedAction::Off => led.turn_off().await,
        LedAction::Color { red, green, blue } => led.set_color(red, green, blue).await,
        LedAction::Brightness { level } => led.set_brightness(level).await,
        LedAction::Effect { effect } => led.set_effect(effect.into()).await,
    };
    session.close().await;

    result.context("LED command failed")?;
    info!("LED command OK");
    Ok(())
}

async fn line_command(config: &Config, shell: SshSession, action: LineAction) -> Result<()> {
    let mut session = LineFollowSession::open(config, shell)
        .await
        .context("starting line-follow session")?;

    let link = session.link();
    let result = match action {
        LineAction::Calibrate => link.calibrate().await,
        LineAction::Start => link.start().await,
        LineAction::Stop => link.stop().await,
        LineAction::Status => link.status().await,
        LineAction::Speed { speed } => link.set_speed(speed).await,
    };

    match &result {
        Ok(payload) if action == LineAction::Start => {
            info!("{}", payload);
            info!("Following the line, press Ctrl+C to stop");
            shutdown_token().cancelled().await;
        }
        Ok(payload) => info!("{}", payload),
        Err(e) => warn!("line-follow: {}", e),
    }

    session.close().await;
    result.context("line-follow command failed")?;
    Ok(())
}

async fn buzz(config: &Config, mut shell: SshSession, tune: Tune) -> Result<()> {
    let robot = &config.robot;
    if !shell.connect(&robot.host, &robot.user, &robot.password).await {
        bail!("SSH connection to {} failed", robot.host);
    }

    let result = buzzer::play(&mut shell, &config.bootstrap.buzzer_command, tune).await;
    shell.disconnect().await;

    result.context("buzzer failed")?;
    info!("Played {}", tune);
    Ok(())
}
