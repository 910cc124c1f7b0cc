//! Parsing of interactive input lines.

use crate::error::InputError;

#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    Mute,
    Unmute,
    Stop,
    Background,
    Foreground,
    Voice(String),
    Speed(f32),
    Stats,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(HostCommand),
    /// A blank line: the current turn is complete.
    EndOfTurn,
    Text(String),
}

pub const HELP: &str = "\
Type text to speak it. A blank line ends the turn.
  /mute /unmute        silence or restore output
  /stop                interrupt the current turn
  /background          simulate the host backgrounding the app
  /foreground          simulate the host returning to the foreground
  /voice <id>          change the voice for new sentences
  /speed <x>           change the speed (0.25 to 4.0)
  /stats               print engine counters
  /quit                exit";

pub fn parse_line(line: &str) -> Result<Input, InputError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Input::EndOfTurn);
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Input::Text(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "mute" => HostCommand::Mute,
        "unmute" => HostCommand::Unmute,
        "stop" => HostCommand::Stop,
        "background" | "bg" => HostCommand::Background,
        "foreground" | "fg" => HostCommand::Foreground,
        "stats" => HostCommand::Stats,
        "help" => HostCommand::Help,
        "quit" | "exit" => HostCommand::Quit,
        "voice" => {
            if arg.is_empty() {
                return Err(InputError::InvalidArgument {
                    command: "voice",
                    reason: "expected a voice id".to_string(),
                });
            }
            HostCommand::Voice(arg.to_string())
        }
        "speed" => {
            let speed = arg.parse::<f32>().map_err(|_| InputError::InvalidArgument {
                command: "speed",
                reason: format!("{arg:?} is not a number"),
            })?;
            HostCommand::Speed(speed)
        }
        other => return Err(InputError::UnknownCommand(other.to_string())),
    };
    Ok(Input::Command(command))
}
