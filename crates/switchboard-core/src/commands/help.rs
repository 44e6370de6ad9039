use async_trait::async_trait;

use super::{Command, CommandArgument, ResolvedCommand, help_line};
use crate::error::Result;
use crate::session::SessionContext;
use crate::stream::MessageStyle;

pub struct HelpCommand;

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    fn arguments(&self) -> Vec<CommandArgument> {
        vec![CommandArgument::optional(&["command"])]
    }

    fn help_message(&self) -> &'static str {
        "Show information on available commands"
    }

    fn argument_autocompletions(
        &self,
        ctx: &SessionContext,
        _arguments: &[String],
        position: usize,
    ) -> Vec<String> {
        if position == 0 {
            ctx.commands.names()
        } else {
            Vec::new()
        }
    }

    async fn apply(&self, ctx: &SessionContext, args: &[String]) -> Result<()> {
        let Some(name) = args.first() else {
            ctx.stream.send(ctx.commands.help_lines().join("\n"));
            return Ok(());
        };

        match ctx.commands.resolve(name) {
            ResolvedCommand::Registered(command) => {
                ctx.stream.send(help_line(command.as_ref()));
            }
            ResolvedCommand::Invalid(_) => {
                ctx.stream
                    .send_styled(format!("Unknown command: {name}"), MessageStyle::Error);
            }
        }
        Ok(())
    }
}
