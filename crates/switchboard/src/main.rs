use clap::Parser;
use eyre::Result;

use std::sync::Arc;
use switchboard::cli::{Cli, Commands, ConfigCommands};
use switchboard::commands::Command;
use switchboard::commands::config::{ConfigAction, ConfigCommand};
use switchboard::terminal::Terminal;
use switchboard_core::commands::CommandRegistry;
use switchboard_core::engine::EchoEngine;
use switchboard_core::session::{Session, SessionContext};
use switchboard_core::stream::SessionStream;
use tracing::{debug, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre for better error reports
    color_eyre::install()?;

    let cli = Cli::parse();

    // Load .env file if it exists
    switchboard::cli::config::load_env()?;

    if let Some(Commands::Config { action }) = &cli.command {
        let action = match action {
            ConfigCommands::Show => ConfigAction::Show,
            ConfigCommands::Edit => ConfigAction::Edit,
            ConfigCommands::Reset => ConfigAction::Reset,
        };
        let path = switchboard::cli::config::config_path(cli.config.as_deref())?;
        return ConfigCommand { action, path }.execute().await;
    }

    let config = switchboard::cli::config::load_config(&cli)?;

    // Initialize tracing (level configured via RUST_LOG env var)
    let log_path = switchboard_core::utils::tracing::init_tracing(config.log_dir.as_deref())?;
    debug!(log = %log_path.display(), ?config, "Starting session");

    let exit_word = config
        .exit_words
        .first()
        .cloned()
        .unwrap_or_else(|| "q".to_string());

    let stream = SessionStream::new();
    let ctx = SessionContext::new(
        stream.clone(),
        Arc::new(CommandRegistry::with_builtins()),
        config,
        Arc::new(EchoEngine::new()),
    );
    let terminal = Terminal::attach(&stream, exit_word);
    let session = tokio::spawn(Session::new(ctx).run());

    if let Err(e) = terminal.run().await {
        session.abort();
        return Err(e.into());
    }

    match session.await {
        Ok(result) => result?,
        Err(e) if e.is_cancelled() => warn!("Session task cancelled"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
