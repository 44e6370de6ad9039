//! Slash commands.
//!
//! Commands are registered into an explicit [`CommandRegistry`] at startup and
//! reached through the [`crate::session::SessionContext`] they are applied
//! with. A name that resolves to nothing yields [`ResolvedCommand::Invalid`],
//! which reports itself through the stream instead of failing.

mod clear;
mod config;
mod help;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use strum::Display;
use thiserror::Error;
use tracing::{debug, error};

use crate::error::Result;
use crate::session::SessionContext;
use crate::stream::MessageStyle;
use crate::tokenizer::{Completion, Cursor, TokenizeError};

pub use clear::ClearCommand;
pub use config::ConfigCommand;
pub use help::HelpCommand;

/// Prefix that marks a line of input as a command.
pub const COMMAND_SIGIL: char = '/';

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Not applicable to invalid command '{name}'")]
    NotApplicable { name: String },

    #[error("Command already registered: {0}")]
    Duplicate(String),

    #[error("{reason}")]
    InvalidArguments { command: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ArgumentKind {
    Required,
    Optional,
    /// One of a fixed set of words, listed as the argument's descriptions.
    Literal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArgument {
    pub kind: ArgumentKind,
    /// Alternative descriptions, shown joined with `|` in help text.
    pub descriptions: Vec<String>,
    /// Consumes every remaining argument. Only meaningful on the last one.
    pub repeatable: bool,
}

impl CommandArgument {
    fn new(kind: ArgumentKind, descriptions: &[&str]) -> Self {
        Self {
            kind,
            descriptions: descriptions.iter().map(|d| (*d).to_string()).collect(),
            repeatable: false,
        }
    }

    pub fn required(descriptions: &[&str]) -> Self {
        Self::new(ArgumentKind::Required, descriptions)
    }

    pub fn optional(descriptions: &[&str]) -> Self {
        Self::new(ArgumentKind::Optional, descriptions)
    }

    pub fn literal(words: &[&str]) -> Self {
        Self::new(ArgumentKind::Literal, words)
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    /// Help-text form: `<a|b>`, `[a|b]` or `a|b`, with `...` when repeatable.
    pub fn usage(&self) -> String {
        let alternatives = self.descriptions.join("|");
        let base = match self.kind {
            ArgumentKind::Required => format!("<{alternatives}>"),
            ArgumentKind::Optional => format!("[{alternatives}]"),
            ArgumentKind::Literal => alternatives,
        };
        if self.repeatable {
            format!("{base}...")
        } else {
            base
        }
    }

    fn accepts(&self, value: &str) -> bool {
        self.kind != ArgumentKind::Literal || self.descriptions.iter().any(|d| d == value)
    }
}

#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;

    fn arguments(&self) -> Vec<CommandArgument>;

    fn help_message(&self) -> &'static str;

    /// Hidden commands can be run but are not listed or completed.
    fn hidden(&self) -> bool {
        false
    }

    /// Candidates for the argument at `position`, given the arguments typed
    /// before it. Literal arguments offer their words by default.
    fn argument_autocompletions(
        &self,
        _ctx: &SessionContext,
        _arguments: &[String],
        position: usize,
    ) -> Vec<String> {
        argument_at(&self.arguments(), position)
            .filter(|arg| arg.kind == ArgumentKind::Literal)
            .map(|arg| arg.descriptions.clone())
            .unwrap_or_default()
    }

    async fn apply(&self, ctx: &SessionContext, args: &[String]) -> Result<()>;
}

fn argument_at(expected: &[CommandArgument], position: usize) -> Option<&CommandArgument> {
    expected
        .get(position)
        .or_else(|| expected.last().filter(|last| last.repeatable))
}

/// `/name` followed by the usage of each argument.
pub fn usage_of(command: &dyn Command) -> String {
    std::iter::once(format!("{COMMAND_SIGIL}{}", command.name()))
        .chain(command.arguments().iter().map(CommandArgument::usage))
        .collect::<Vec<_>>()
        .join(" ")
}

const USAGE_WIDTH: usize = 40;

/// Usage padded to a column, followed by the help message.
pub fn help_line(command: &dyn Command) -> String {
    format!("{:<USAGE_WIDTH$} {}", usage_of(command), command.help_message())
}

fn check_arguments(command: &dyn Command, args: &[String]) -> std::result::Result<(), CommandError> {
    let expected = command.arguments();
    let invalid = |reason: String| CommandError::InvalidArguments {
        command: command.name().to_string(),
        reason,
    };

    for (position, argument) in expected.iter().enumerate() {
        let values: &[String] = if argument.repeatable {
            args.get(position..).unwrap_or_default()
        } else {
            args.get(position..=position).unwrap_or_default()
        };

        if values.is_empty() && argument.kind != ArgumentKind::Optional {
            return Err(invalid(format!("Missing argument {}", argument.usage())));
        }
        if let Some(bad) = values.iter().find(|value| !argument.accepts(value)) {
            return Err(invalid(format!("Expected {}, got '{bad}'", argument.usage())));
        }
    }

    let takes_rest = expected.last().is_some_and(|last| last.repeatable);
    if !takes_rest && args.len() > expected.len() {
        return Err(invalid(format!(
            "Expected at most {} argument(s), got {}",
            expected.len(),
            args.len()
        )));
    }
    Ok(())
}

/// Placeholder for a name no command is registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCommand {
    name: String,
}

pub enum ResolvedCommand {
    Registered(Arc<dyn Command>),
    Invalid(InvalidCommand),
}

impl ResolvedCommand {
    pub fn name(&self) -> &str {
        match self {
            ResolvedCommand::Registered(command) => command.name(),
            ResolvedCommand::Invalid(invalid) => &invalid.name,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ResolvedCommand::Registered(_))
    }

    fn registered(&self) -> std::result::Result<&dyn Command, CommandError> {
        match self {
            ResolvedCommand::Registered(command) => Ok(command.as_ref()),
            ResolvedCommand::Invalid(invalid) => Err(CommandError::NotApplicable {
                name: invalid.name.clone(),
            }),
        }
    }

    pub fn arguments(&self) -> std::result::Result<Vec<CommandArgument>, CommandError> {
        Ok(self.registered()?.arguments())
    }

    pub fn help_message(&self) -> std::result::Result<&'static str, CommandError> {
        Ok(self.registered()?.help_message())
    }

    pub fn usage(&self) -> std::result::Result<String, CommandError> {
        Ok(usage_of(self.registered()?))
    }

    /// Runs the command. Argument mismatches and invalid names are reported
    /// to the user through the stream and are not errors.
    pub async fn apply(&self, ctx: &SessionContext, args: &[String]) -> Result<()> {
        let command = match self {
            ResolvedCommand::Registered(command) => command,
            ResolvedCommand::Invalid(invalid) => {
                ctx.stream.send_styled(
                    format!(
                        "{} is not a valid command. Use {COMMAND_SIGIL}help to see a list of all valid commands",
                        invalid.name
                    ),
                    MessageStyle::Error,
                );
                return Ok(());
            }
        };

        if let Err(e) = check_arguments(command.as_ref(), args) {
            ctx.stream.send_styled(
                format!("{e}\nUsage: {}", usage_of(command.as_ref())),
                MessageStyle::Error,
            );
            return Ok(());
        }

        debug!(command = command.name(), ?args, "Applying command");
        command.apply(ctx, args).await
    }
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in commands.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [Arc<dyn Command>; 3] = [
            Arc::new(HelpCommand),
            Arc::new(ConfigCommand),
            Arc::new(ClearCommand),
        ];
        for command in builtins {
            if let Err(e) = registry.register(command) {
                error!("Failed to register built-in command: {e}");
            }
        }
        registry
    }

    pub fn register(&mut self, command: Arc<dyn Command>) -> std::result::Result<(), CommandError> {
        let name = command.name().to_string();
        if self.commands.contains_key(&name) {
            return Err(CommandError::Duplicate(name));
        }
        debug!(command = %name, "Registering command");
        self.commands.insert(name, command);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> ResolvedCommand {
        match self.commands.get(name) {
            Some(command) => ResolvedCommand::Registered(Arc::clone(command)),
            None => ResolvedCommand::Invalid(InvalidCommand {
                name: name.to_string(),
            }),
        }
    }

    /// Visible commands sorted by name.
    pub fn visible(&self) -> Vec<&Arc<dyn Command>> {
        let mut commands: Vec<_> = self.commands.values().filter(|c| !c.hidden()).collect();
        commands.sort_by_key(|c| c.name());
        commands
    }

    pub fn names(&self) -> Vec<String> {
        self.visible().iter().map(|c| c.name().to_string()).collect()
    }

    /// One `usage  help` line per visible command.
    pub fn help_lines(&self) -> Vec<String> {
        self.visible()
            .into_iter()
            .map(|command| help_line(command.as_ref()))
            .collect()
    }

    /// Completions for a partially typed command line, sigil included.
    ///
    /// Lines that are not commands have no completions.
    pub fn completions(
        &self,
        ctx: &SessionContext,
        line: &str,
    ) -> std::result::Result<Vec<Completion>, TokenizeError> {
        let Some(rest) = line.strip_prefix(COMMAND_SIGIL) else {
            return Ok(Vec::new());
        };
        let cursor = Cursor::parse(rest)?;

        let Some((name, arguments)) = cursor.preceding.split_first() else {
            return Ok(cursor.complete(self.names()));
        };

        let candidates = match self.resolve(name) {
            ResolvedCommand::Registered(command) if !command.hidden() => {
                command.argument_autocompletions(ctx, arguments, cursor.position() - 1)
            }
            _ => Vec::new(),
        };
        Ok(cursor.complete(candidates))
    }
}
