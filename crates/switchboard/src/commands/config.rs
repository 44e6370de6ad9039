use super::Command;
use crate::error::Error;
use async_trait::async_trait;
use eyre::Result;
use shell_words::split;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command as ProcessCommand;
use switchboard_core::config::SessionConfig;

pub struct ConfigCommand {
    pub action: ConfigAction,
    /// File to operate on.
    pub path: PathBuf,
}

pub enum ConfigAction {
    Show,
    Edit,
    Reset,
}

#[async_trait]
impl Command for ConfigCommand {
    async fn execute(&self) -> Result<()> {
        match &self.action {
            ConfigAction::Show => self.show().map_err(Into::into),
            ConfigAction::Edit => self.edit().map_err(Into::into),
            ConfigAction::Reset => self.reset().map_err(Into::into),
        }
    }
}

impl ConfigCommand {
    fn show(&self) -> std::result::Result<(), Error> {
        let config = SessionConfig::load_from(&self.path)?;

        let mut stdout = std::io::stdout();
        writeln!(stdout, "Config file: {}", self.path.display())?;
        writeln!(stdout, "\n{}", toml::to_string_pretty(&config)?)?;
        Ok(())
    }

    fn edit(&self) -> std::result::Result<(), Error> {
        // Ensure the file exists
        if !self.path.exists() {
            SessionConfig::default().save_to(&self.path)?;
        }

        let (editor, mut args) = Self::parse_editor_command()?;
        args.push(self.path.to_string_lossy().to_string());

        let status = ProcessCommand::new(&editor)
            .args(&args)
            .status()
            .map_err(|err| {
                Error::Process(format!(
                    "Failed to launch editor '{editor}': {err}. Set $VISUAL or $EDITOR to a valid editor."
                ))
            })?;

        if !status.success() {
            return Err(Error::Process(format!(
                "Editor '{editor}' exited with status: {status}"
            )));
        }

        Ok(())
    }

    fn parse_editor_command() -> std::result::Result<(String, Vec<String>), Error> {
        let editor = std::env::var("VISUAL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| {
                std::env::var("EDITOR")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
            })
            .unwrap_or_else(|| {
                if cfg!(target_os = "windows") {
                    "notepad".to_string()
                } else {
                    "vi".to_string()
                }
            });

        Self::parse_editor_command_str(&editor)
    }

    fn parse_editor_command_str(editor: &str) -> std::result::Result<(String, Vec<String>), Error> {
        let parts = split(editor).map_err(|err| {
            Error::Process(format!(
                "Failed to parse editor command '{editor}': {err}. Set $VISUAL or $EDITOR to a valid editor."
            ))
        })?;

        let Some((command, args)) = parts.split_first() else {
            return Err(Error::Process(
                "Editor command is empty. Set $VISUAL or $EDITOR to a valid editor.".to_string(),
            ));
        };

        Ok((command.to_string(), args.to_vec()))
    }

    fn reset(&self) -> std::result::Result<(), Error> {
        let mut stdout = std::io::stdout();
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            writeln!(stdout, "Config reset to defaults")?;
        } else {
            writeln!(stdout, "No config file found")?;
        }
        Ok(())
    }
}
