//! Tray menu and popup interactions as plain values.
//!
//! The console adapter reads one command per line:
//!
//! | line              | command              |
//! |-------------------|----------------------|
//! | `update`          | `Refresh`            |
//! | `window`, `open`  | `Open`               |
//! | `day 3`           | `Day(3)`             |
//! | `click 37.5`      | `Click(37.5)`        |
//! | `quit`, `exit`    | `Quit`               |

use std::str::FromStr;
use thiserror::Error;

use traytemp_weather::series::WINDOW_DAYS;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrayCommand {
    /// Fetch now
    Refresh,
    /// Fetch, then show the popup chart
    Open,
    /// Show one day of the chart, 0 being today
    Day(usize),
    /// Read out the temperature at a chart x position
    Click(f64),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("{command} needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("invalid argument for {command}: {value}")]
    InvalidArgument { command: &'static str, value: String },
}

impl FromStr for TrayCommand {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(CommandParseError::Empty)?.to_ascii_lowercase();
        let arg = words.next();

        match name.as_str() {
            "update" | "refresh" => Ok(TrayCommand::Refresh),
            "window" | "open" => Ok(TrayCommand::Open),
            "quit" | "exit" => Ok(TrayCommand::Quit),
            "day" => {
                let value = arg.ok_or(CommandParseError::MissingArgument {
                    command: "day",
                    expected: "a day number from 0 to 6",
                })?;
                value
                    .parse::<usize>()
                    .ok()
                    .filter(|d| *d < WINDOW_DAYS as usize)
                    .map(TrayCommand::Day)
                    .ok_or_else(|| CommandParseError::InvalidArgument {
                        command: "day",
                        value: value.to_string(),
                    })
            }
            "click" => {
                let value = arg.ok_or(CommandParseError::MissingArgument {
                    command: "click",
                    expected: "an hour position",
                })?;
                value
                    .parse::<f64>()
                    .ok()
                    .filter(|x| x.is_finite())
                    .map(TrayCommand::Click)
                    .ok_or_else(|| CommandParseError::InvalidArgument {
                        command: "click",
                        value: value.to_string(),
                    })
            }
            _ => Err(CommandParseError::Unknown(name)),
        }
    }
}
