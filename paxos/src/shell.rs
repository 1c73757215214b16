//! Commands of the demo shell.

use std::str::FromStr;

/// Help text of the shell.
pub const USAGE: &str = "\
Usage:
\tSet value: set <node> <value>
\tGet value: get <node>
\tTake a node's acceptor down: down <node>
\tBring it back: up <node>
\tHelp: help
\tQuit: quit";

/// One line of shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write `value` through the proposer of `node`.
    Set {
        /// Node index.
        node: usize,
        /// Value to propose.
        value: String,
    },
    /// Read through the proposer of `node`.
    Get {
        /// Node index.
        node: usize,
    },
    /// Make the acceptor of `node` unavailable.
    Down {
        /// Node index.
        node: usize,
    },
    /// Make the acceptor of `node` available again.
    Up {
        /// Node index.
        node: usize,
    },
    /// Print [`USAGE`].
    Help,
    /// Leave the shell.
    Quit,
}

/// Why a line is not a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Blank line.
    #[error("empty command")]
    Empty,
    /// First word is not a command.
    #[error("invalid input {0:?}")]
    Unknown(String),
    /// Wrong arguments for a known command.
    #[error("usage: {0}")]
    Usage(&'static str),
    /// Node argument is not an index.
    #[error("invalid node {0:?}")]
    Node(String),
}

fn node(arg: &str) -> Result<usize, ParseError> {
    arg.parse().map_err(|_| ParseError::Node(arg.to_owned()))
}

fn split(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (s, ""),
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::Empty);
        }
        let (cmd, rest) = split(s);
        let single = |usage| {
            let (arg, extra) = split(rest);
            if arg.is_empty() || !extra.is_empty() {
                Err(ParseError::Usage(usage))
            } else {
                node(arg)
            }
        };

        match cmd {
            "set" => {
                let (arg, value) = split(rest);
                if arg.is_empty() || value.is_empty() {
                    return Err(ParseError::Usage("set <node> <value>"));
                }
                Ok(Command::Set {
                    node: node(arg)?,
                    value: value.to_owned(),
                })
            }
            "get" => Ok(Command::Get {
                node: single("get <node>")?,
            }),
            "down" => Ok(Command::Down {
                node: single("down <node>")?,
            }),
            "up" => Ok(Command::Up {
                node: single("up <node>")?,
            }),
            "help" => Ok(Command::Help),
            "quit" => Ok(Command::Quit),
            other => Err(ParseError::Unknown(other.to_owned())),
        }
    }
}
