use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Interactive session over an in-process event bus.
#[derive(Parser)]
#[command(version, about, long_about = None, author)]
pub struct Cli {
    /// Path to the configuration file (TOML format). Defaults to the first of
    /// ./.switchboard/config.toml and the user config file that exists
    #[arg(long, env = "SWITCHBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Milliseconds between streamed output chunks (overrides the config file)
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Directory for log files (overrides the config file)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Edit the configuration file in the default editor
    Edit,
    /// Reset the configuration to defaults
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_overrides() {
        let cli = Cli::try_parse_from(["switchboard", "--delay-ms", "0", "--config", "a.toml"])
            .unwrap();
        assert_eq!(cli.delay_ms, Some(0));
        assert_eq!(cli.config, Some(PathBuf::from("a.toml")));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parses_config_subcommand() {
        let cli = Cli::try_parse_from(["switchboard", "config", "reset"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigCommands::Reset
            })
        ));
    }
}
