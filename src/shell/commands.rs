//! Static command table and line executor

use crate::config::firmware::{VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH};
use crate::config::shell::MAX_ARGS;
use core::fmt::Write;
use heapless::Vec;

/// Line ending used for console output
pub const NEWLINE: &str = "\r\n";

/// Errors returned when a line cannot be executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellError {
    /// First token does not name a command
    CommandNotFound,
    /// More than [`MAX_ARGS`] tokens on the line
    TooManyArgs,
    /// Line is not valid UTF-8
    InvalidInput,
    /// Output sink is full
    OutputOverflow,
}

impl From<core::fmt::Error> for ShellError {
    fn from(_: core::fmt::Error) -> Self {
        ShellError::OutputOverflow
    }
}

type Handler = fn(&[&str], &mut dyn Write) -> Result<(), ShellError>;

/// Entry of the command table
pub struct ShellCommand {
    pub name: &'static str,
    pub description: &'static str,
    pub handler: Handler,
}

/// Commands available on the console
pub static COMMANDS: &[ShellCommand] = &[
    ShellCommand {
        name: "hello",
        description: "say hello",
        handler: |_, out| Ok(write!(out, "world!{}", NEWLINE)?),
    },
    ShellCommand {
        name: "hi",
        description: "say hi",
        handler: |_, out| Ok(write!(out, "bye!{}", NEWLINE)?),
    },
    ShellCommand {
        name: "version",
        description: "print firmware version",
        handler: |_, out| {
            Ok(write!(
                out,
                "{} {}.{}.{}{}",
                env!("CARGO_PKG_NAME"),
                VERSION_MAJOR,
                VERSION_MINOR,
                VERSION_PATCH,
                NEWLINE
            )?)
        },
    },
];

/// Executes console lines against a command table
pub struct Shell {
    commands: &'static [ShellCommand],
}

impl Shell {
    pub fn new() -> Self {
        Self::with_commands(COMMANDS)
    }

    pub fn with_commands(commands: &'static [ShellCommand]) -> Self {
        Self { commands }
    }

    /// Run one line, writing its output (or an error message) to `out`.
    ///
    /// Empty lines produce no output.
    pub fn execute(&self, line: &[u8], out: &mut dyn Write) -> Result<(), ShellError> {
        let line = match core::str::from_utf8(line) {
            Ok(line) => line,
            Err(_) => {
                write!(out, "shell: invalid input{}", NEWLINE)?;
                return Err(ShellError::InvalidInput);
            }
        };

        let mut args: Vec<&str, MAX_ARGS> = Vec::new();
        for token in line.split_whitespace() {
            if args.push(token).is_err() {
                write!(out, "shell: too many arguments (max {}){}", MAX_ARGS, NEWLINE)?;
                return Err(ShellError::TooManyArgs);
            }
        }

        let Some(&name) = args.first() else {
            return Ok(());
        };

        if name == "help" {
            return self.help(out);
        }

        match self.commands.iter().find(|c| c.name == name) {
            Some(command) => {
                log::debug!("Shell: {}", name);
                (command.handler)(&args, out)
            }
            None => {
                write!(out, "shell: command not found: {}{}", name, NEWLINE)?;
                Err(ShellError::CommandNotFound)
            }
        }
    }

    fn help(&self, out: &mut dyn Write) -> Result<(), ShellError> {
        write!(out, "  help - list commands{}", NEWLINE)?;
        for command in self.commands {
            write!(out, "  {} - {}{}", command.name, command.description, NEWLINE)?;
        }
        Ok(())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}
