//! # Buzzer
//!
//! Plays a tone or melody on the robot's buzzer by running its control
//! script over the remote shell.

use std::fmt;
use tracing::{info, warn};

use super::ssh::{RemoteShell, NOT_CONNECTED};
use crate::error::{Result, RoverLinkError};

/// Tunes the buzzer script knows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tune {
    BeepShort,
    BeepLong,
    BeepDouble,
    StarWars,
    HappyBirthday,
    SuperMario,
    TakeOnMe,
    NokiaRingtone,
    Tetris,
    ImperialMarch,
    JingleBells,
}

impl Tune {
    /// Argument passed to the buzzer script
    pub fn as_str(self) -> &'static str {
        match self {
            Tune::BeepShort => "beep_short",
            Tune::BeepLong => "beep_long",
            Tune::BeepDouble => "beep_double",
            Tune::StarWars => "song_star_wars",
            Tune::HappyBirthday => "song_happy_birthday",
            Tune::SuperMario => "song_super_mario",
            Tune::TakeOnMe => "song_take_on_me",
            Tune::NokiaRingtone => "song_nokia_ringtone",
            Tune::Tetris => "song_tetris",
            Tune::ImperialMarch => "song_imperial_march",
            Tune::JingleBells => "song_jingle_bells",
        }
    }
}

impl fmt::Display for Tune {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full shell command for `tune`, with stderr folded into stdout
pub fn command_for(script: &str, tune: Tune) -> String {
    format!("{} {} 2>&1", script, tune)
}

/// Whether the script's output reports a failure
pub fn output_failed(output: &str) -> bool {
    output.contains("ERROR") || output.contains("error")
}

/// Play `tune` and wait for the script to finish
///
/// # Errors
///
/// - `NotConnected` if the shell has no session
/// - `Rejected` carrying the script output if it reported an error
pub async fn play<S>(shell: &mut S, script: &str, tune: Tune) -> Result<String>
where
    S: RemoteShell + ?Sized,
{
    info!("Playing {} on the buzzer", tune);
    let output = shell.execute(&command_for(script, tune)).await;

    if output == NOT_CONNECTED {
        return Err(RoverLinkError::NotConnected("SSH session"));
    }
    if output_failed(&output) {
        warn!("Buzzer reported failure: {}", output.trim_end());
        return Err(RoverLinkError::Rejected(output));
    }
    Ok(output)
}
