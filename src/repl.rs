//! Line-oriented terminal shell.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use mentor_core::{ChatSession, Conversation, LanguageModel, ModelCatalog, Result};

const HELP: &str = "\
Commands:
  /model <id>    switch model
  /models        list available models
  /memory <k>    conversational memory length (1-10)
  /history       show stored turns
  /help          show this help
  /quit          end the session";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Model(&'a str),
    Models,
    Memory(&'a str),
    History,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_command(line: &str) -> Option<Command<'_>> {
    let rest = line.strip_prefix('/')?;
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    Some(match name {
        "model" => Command::Model(arg),
        "models" => Command::Models,
        "memory" => Command::Memory(arg),
        "history" => Command::History,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other),
    })
}

pub struct Repl<'a, M: LanguageModel> {
    conversation: &'a Conversation<M>,
    catalog: &'a ModelCatalog,
    session: ChatSession,
}

impl<'a, M: LanguageModel> Repl<'a, M> {
    pub fn new(
        conversation: &'a Conversation<M>,
        catalog: &'a ModelCatalog,
        session: ChatSession,
    ) -> Self {
        Self {
            conversation,
            catalog,
            session,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Drive the shell until `/quit` or end of input. Provider failures are
    /// shown and the loop continues.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        output
            .write_all(
                format!(
                    "Coding Mentor\nmodel: {}  memory: {}  (/help for commands)\n",
                    self.session.settings.model, self.session.settings.memory_length
                )
                .as_bytes(),
            )
            .await?;

        loop {
            output.write_all(b"> ").await?;
            output.flush().await?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();

            let reply = match parse_command(line) {
                Some(Command::Quit) => break,
                Some(command) => self.handle_command(command),
                None => match self.conversation.predict(&mut self.session, line).await {
                    Ok(Some(text)) => format!("Chatbot: {text}"),
                    Ok(None) => continue,
                    Err(err) => {
                        warn!(error = %err, "request failed");
                        format!("Error: {err}")
                    }
                },
            };
            output.write_all(reply.as_bytes()).await?;
            output.write_all(b"\n").await?;
        }
        output.flush().await?;
        Ok(())
    }

    fn handle_command(&mut self, command: Command<'_>) -> String {
        match command {
            Command::Model(id) => match self.session.set_model(self.catalog, id) {
                Ok(()) => format!("model set to {id}"),
                Err(err) => format!("Error: {err}"),
            },
            Command::Models => self
                .catalog
                .models()
                .iter()
                .map(|m| {
                    let marker = if *m == self.session.settings.model { "*" } else { " " };
                    format!("{marker} {m}")
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Command::Memory(arg) => match arg.parse::<usize>() {
                Ok(k) => match self.session.set_memory_length(k) {
                    Ok(()) => format!("memory length set to {k}"),
                    Err(err) => format!("Error: {err}"),
                },
                Err(_) => format!("Error: `{arg}` is not a number"),
            },
            Command::History => {
                let turns = self.session.history().all();
                if turns.is_empty() {
                    return "(no turns yet)".to_string();
                }
                turns
                    .iter()
                    .enumerate()
                    .map(|(i, t)| format!("[{}] You: {}\n    Chatbot: {}", i + 1, t.input(), t.output()))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            Command::Help => HELP.to_string(),
            Command::Unknown(name) => format!("unknown command `/{name}`; try /help"),
            Command::Quit => String::new(),
        }
    }
}
