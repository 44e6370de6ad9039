//! Line-oriented terminal front end for a session.
//!
//! Talks to the session only through the stream: prints what arrives on the
//! default channel, answers input requests from stdin, and sends interrupts
//! on Ctrl-C while the engine is responding.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use colored::Colorize;
use serde_json::Value;
use switchboard_core::bus::Subscription;
use switchboard_core::commands::COMMAND_SIGIL;
use switchboard_core::stream::{
    MessageSource, MessageStyle, Outgoing, SessionStream, StreamMessage, channels,
};
use switchboard_core::tokenizer::Completion;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::Error;

const COMPLETION_KEY: char = '\t';
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Terminal {
    stream: SessionStream,
    output: Subscription<StreamMessage>,
    requests: Subscription<StreamMessage>,
    exits: Subscription<StreamMessage>,
    /// Answer sent when stdin reaches end of file.
    exit_word: String,
}

impl Terminal {
    /// Subscribes to the session's channels. Call before the session starts
    /// so nothing it publishes is missed.
    pub fn attach(stream: &SessionStream, exit_word: impl Into<String>) -> Self {
        Self {
            stream: stream.clone(),
            output: stream.listen(channels::DEFAULT),
            requests: stream.listen(channels::INPUT_REQUEST),
            exits: stream.listen(channels::SESSION_EXIT),
            exit_word: exit_word.into(),
        }
    }

    /// Runs until the session announces its exit or the stream closes.
    pub async fn run(mut self) -> Result<(), Error> {
        let mut lines = spawn_stdin_reader();
        let mut pending: Option<StreamMessage> = None;
        // Set while the engine is answering the last line sent.
        let mut responding = false;

        loop {
            tokio::select! {
                biased;

                event = self.output.get() => match event {
                    Ok(event) => print_message(event.payload())?,
                    Err(_) => break,
                },

                _ = self.exits.get() => break,

                event = self.requests.get(), if pending.is_none() => match event {
                    Ok(event) => {
                        let request = event.payload().clone();
                        responding = false;
                        print_prompt(is_plain(&request))?;
                        pending = Some(request);
                    }
                    Err(_) => break,
                },

                line = lines.recv(), if pending.is_some() => {
                    let Some(request) = pending.take() else {
                        continue;
                    };
                    let line = match line {
                        Some(line) => line,
                        None => {
                            debug!("Stdin closed, ending session");
                            writeln!(io::stdout())?;
                            self.answer(&request, self.exit_word.clone());
                            continue;
                        }
                    };

                    match line.strip_suffix(COMPLETION_KEY) {
                        Some(partial) if !is_plain(&request) => {
                            self.show_completions(partial).await?;
                            print_prompt(false)?;
                            pending = Some(request);
                        }
                        Some(partial) => self.answer(&request, partial.to_string()),
                        None => {
                            responding = starts_response(&request, &line);
                            self.answer(&request, line);
                        }
                    }
                }

                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        warn!("Failed to listen for Ctrl-C: {e}");
                        break;
                    }
                    match pending.take() {
                        Some(request) => {
                            writeln!(io::stdout())?;
                            self.answer(&request, self.exit_word.clone());
                        }
                        None if responding => {
                            debug!("Ctrl-C while responding, interrupting");
                            responding = false;
                            self.stream.interrupt(MessageSource::Client);
                        }
                        None => debug!("Ctrl-C with nothing to interrupt, ignoring"),
                    }
                }
            }
        }

        Ok(())
    }

    fn answer(&self, request: &StreamMessage, line: String) {
        self.stream
            .reply_to(request, Outgoing::new(line).source(MessageSource::Client));
    }

    async fn show_completions(&self, partial: &str) -> Result<(), Error> {
        let request = self.stream.send_message(
            Outgoing::new(partial)
                .channel(channels::COMPLETION_REQUEST)
                .source(MessageSource::Client),
        );
        let reply = match tokio::time::timeout(
            COMPLETION_TIMEOUT,
            self.stream.recv(&request.reply_channel()),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Ok(()),
            Err(_) => {
                warn!("No reply to completion request");
                return Ok(());
            }
        };

        let completions: Vec<Completion> = serde_json::from_value(reply.data)?;
        let mut stdout = io::stdout().lock();
        match completions.as_slice() {
            [] => writeln!(stdout, "{}", "No completions".dimmed())?,
            [only] => writeln!(stdout, "{}", apply_completion(partial, only))?,
            many => {
                let displays: Vec<&str> = many.iter().map(|c| c.display.as_str()).collect();
                writeln!(stdout, "{}", displays.join("  ").dimmed())?;
            }
        }
        Ok(())
    }
}

/// Forwards stdin lines from a dedicated thread; the channel closes on EOF.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn is_plain(request: &StreamMessage) -> bool {
    request
        .extra
        .get("plain")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Whether answering `request` with `line` hands a prompt to the engine,
/// rather than running a command or answering a yes/no question.
fn starts_response(request: &StreamMessage, line: &str) -> bool {
    let line = line.trim_start();
    !is_plain(request) && !line.is_empty() && !line.starts_with(COMMAND_SIGIL)
}

fn print_prompt(plain: bool) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    let prompt = if plain { "? " } else { "> " };
    write!(stdout, "{}", prompt.bold())?;
    stdout.flush()
}

fn print_message(message: &StreamMessage) -> io::Result<()> {
    let text = match &message.data {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    let text = match message.style() {
        Some(MessageStyle::Info) => text.cyan(),
        Some(MessageStyle::Success) => text.green(),
        Some(MessageStyle::Warning) => text.yellow(),
        Some(MessageStyle::Error) => text.red(),
        None => text.normal(),
    };
    let end = message
        .extra
        .get("end")
        .and_then(Value::as_str)
        .unwrap_or("\n");

    let mut stdout = io::stdout().lock();
    write!(stdout, "{text}{end}")?;
    stdout.flush()
}

/// The line that results from inserting `completion` at the end of `line`.
fn apply_completion(line: &str, completion: &Completion) -> String {
    let line_chars = line.chars().count();
    let keep = line_chars.saturating_sub(completion.position.unsigned_abs());
    let prefix: String = line.chars().take(keep).collect();
    format!("{prefix}{}", completion.text)
}
