use async_trait::async_trait;

use super::{Command, CommandArgument};
use crate::config::Setting;
use crate::error::Result;
use crate::session::SessionContext;
use crate::stream::MessageStyle;

/// Shows or changes a runtime setting.
pub struct ConfigCommand;

#[async_trait]
impl Command for ConfigCommand {
    fn name(&self) -> &'static str {
        "config"
    }

    fn arguments(&self) -> Vec<CommandArgument> {
        let names = Setting::names();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        vec![
            CommandArgument::literal(&names),
            CommandArgument::optional(&["value"]),
        ]
    }

    fn help_message(&self) -> &'static str {
        "Show or set a setting for this session"
    }

    fn argument_autocompletions(
        &self,
        _ctx: &SessionContext,
        arguments: &[String],
        position: usize,
    ) -> Vec<String> {
        match position {
            0 => Setting::names(),
            1 => arguments
                .first()
                .and_then(|name| name.parse::<Setting>().ok())
                .map(|setting| setting.suggestions())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    async fn apply(&self, ctx: &SessionContext, args: &[String]) -> Result<()> {
        let Some(setting) = args.first().and_then(|name| name.parse::<Setting>().ok()) else {
            // Argument checking only lets known setting names through.
            return Ok(());
        };

        let Some(value) = args.get(1) else {
            let current = ctx.config().get(setting);
            ctx.stream.send(format!(
                "{setting}: {current}\n{}",
                setting.description()
            ));
            return Ok(());
        };

        let result = ctx.config.write().set(setting, value);
        match result {
            Ok(()) => {
                tracing::debug!(%setting, %value, "Setting updated");
                ctx.stream
                    .send_styled(format!("{setting} set to {value}"), MessageStyle::Success);
            }
            Err(e) => {
                ctx.stream.send_styled(e.to_string(), MessageStyle::Error);
            }
        }
        Ok(())
    }
}
