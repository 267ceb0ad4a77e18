//! Parsing of operator console input.
//!
//! ```text
//! <name>: <message>      chat as <name> to everyone online
//! /join <name> [region]  put a player online
//! /leave <name>          take a player offline
//! /move <name> <region>  migrate a player to another region
//! /list                  show who is online
//! /help
//! ```

use thiserror::Error;

/// One operator action read from the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// A chat line typed on behalf of `sender`.
    Chat { sender: String, message: String },
    /// Region defaults to 0 when omitted.
    Join { name: String, region: usize },
    Leave { name: String },
    Move { name: String, region: usize },
    List,
    Help,
}

/// Why a console line was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '/{0}', try /help")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("'{0}' is not a region number")]
    InvalidRegion(String),
    #[error("expected '<name>: <message>'")]
    NotAChatLine,
}

/// One-line summary printed by `/help`.
pub const HELP: &str = "<name>: <message> | /join <name> [region] | /leave <name> | /move <name> <region> | /list";

fn region(raw: &str) -> Result<usize, ParseError> {
    raw.parse()
        .map_err(|_| ParseError::InvalidRegion(raw.to_string()))
}

/// Parses one line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let Some(command) = line.strip_prefix('/') {
        let mut words = command.split_whitespace();
        let verb = words.next().unwrap_or_default().to_lowercase();
        let args: Vec<&str> = words.collect();

        let parsed = match (verb.as_str(), args.as_slice()) {
            ("join", [name]) => ConsoleCommand::Join {
                name: name.to_string(),
                region: 0,
            },
            ("join", [name, r]) => ConsoleCommand::Join {
                name: name.to_string(),
                region: region(r)?,
            },
            ("join", _) => return Err(ParseError::Usage("/join <name> [region]")),
            ("leave", [name]) => ConsoleCommand::Leave {
                name: name.to_string(),
            },
            ("leave", _) => return Err(ParseError::Usage("/leave <name>")),
            ("move", [name, r]) => ConsoleCommand::Move {
                name: name.to_string(),
                region: region(r)?,
            },
            ("move", _) => return Err(ParseError::Usage("/move <name> <region>")),
            ("list", []) => ConsoleCommand::List,
            ("help", _) => ConsoleCommand::Help,
            (other, _) => return Err(ParseError::UnknownCommand(other.to_string())),
        };
        return Ok(Some(parsed));
    }

    let (sender, message) = line.split_once(':').ok_or(ParseError::NotAChatLine)?;
    let (sender, message) = (sender.trim(), message.trim_start());
    if sender.is_empty() || sender.contains(char::is_whitespace) || message.is_empty() {
        return Err(ParseError::NotAChatLine);
    }
    Ok(Some(ConsoleCommand::Chat {
        sender: sender.to_string(),
        message: message.to_string(),
    }))
}
