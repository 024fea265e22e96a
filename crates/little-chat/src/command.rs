//! Parsing of the lines typed into the terminal.

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

/// Help text listing every command.
pub const HELP: &str = "\
Type a message to send it to the current chat.

  /new             start a new chat
  /list            list all chats
  /switch <n>      switch to chat number n
  /rename <name>   rename the current chat
  /delete [n]      delete chat number n, or the current chat
  /clear           delete all chats
  /help            show this help
  /quit            exit";

/// A line typed into the terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Sends the text to the current chat.
    Send(String),
    /// Starts a new chat.
    New,
    /// Lists all chats.
    List,
    /// Switches to the chat at a 1-based position.
    Switch(usize),
    /// Renames the current chat.
    Rename(String),
    /// Deletes the chat at a 1-based position, or the current chat.
    Delete(Option<usize>),
    /// Deletes all chats.
    Clear,
    /// Shows the help text.
    Help,
    /// Exits.
    Quit,
}

impl Command {
    /// Parses a line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Self::Send(line.to_owned())));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        let command = match name {
            "new" => no_arg(name, arg, Self::New)?,
            "list" | "ls" => no_arg(name, arg, Self::List)?,
            "switch" | "sw" => Self::Switch(position(arg)?),
            "rename" => {
                if arg.is_empty() {
                    return Err(CommandError::MissingArgument("rename"));
                }
                Self::Rename(arg.to_owned())
            }
            "delete" | "rm" => {
                if arg.is_empty() {
                    Self::Delete(None)
                } else {
                    Self::Delete(Some(position(arg)?))
                }
            }
            "clear" => no_arg(name, arg, Self::Clear)?,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            _ => return Err(CommandError::UnknownCommand(name.to_owned())),
        };
        Ok(Some(command))
    }
}

fn no_arg(
    name: &str,
    arg: &str,
    command: Command,
) -> Result<Command, CommandError> {
    if arg.is_empty() {
        Ok(command)
    } else {
        Err(CommandError::UnexpectedArgument(name.to_owned()))
    }
}

fn position(arg: &str) -> Result<usize, CommandError> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CommandError::InvalidPosition(arg.to_owned())),
    }
}

/// The error returned for lines that look like a command but aren't one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// No command has this name.
    UnknownCommand(String),
    /// The command needs an argument.
    MissingArgument(&'static str),
    /// The command takes no argument.
    UnexpectedArgument(String),
    /// The argument is not a chat number.
    InvalidPosition(String),
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand(name) => {
                write!(f, "unknown command /{name}, try /help")
            }
            Self::MissingArgument(name) => {
                write!(f, "/{name} needs an argument")
            }
            Self::UnexpectedArgument(name) => {
                write!(f, "/{name} takes no argument")
            }
            Self::InvalidPosition(arg) if arg.is_empty() => {
                write!(f, "a chat number is required")
            }
            Self::InvalidPosition(arg) => {
                write!(f, "{arg:?} is not a chat number")
            }
        }
    }
}

impl StdError for CommandError {}
