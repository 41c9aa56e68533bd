//! Interactive chat loop.

use std::io::{self, Write};

use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use super::render::{app_lines, trace_lines, Transcript};
use crate::app::ChatApp;
use crate::error::AdkError;
use crate::models::format_agent_name;
use crate::state::ConversationState;

const HELP: &str = "Commands: /new, /trace, /apps, /agent <name>, /quit. Ctrl+C cancels a reply.";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Quit,
    NewSession,
    Trace,
    Apps,
    Agent(String),
    Help,
    Message(String),
    Empty,
    Unknown(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ReplCommand::Message(line.to_string());
        };
        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        match (name, arg) {
            ("quit" | "exit" | "q", _) => ReplCommand::Quit,
            ("new", _) => ReplCommand::NewSession,
            ("trace", _) => ReplCommand::Trace,
            ("apps", _) => ReplCommand::Apps,
            ("help", _) => ReplCommand::Help,
            ("agent", arg) if !arg.is_empty() => ReplCommand::Agent(arg.to_string()),
            _ => ReplCommand::Unknown(line.to_string()),
        }
    }
}

fn emit(text: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()
}

/// Run the REPL until `/quit`, end of input or Ctrl+C at the prompt.
pub async fn run_chat(app: &ChatApp, requested: Option<&str>) -> Result<()> {
    let apps = app.load_apps().await.wrap_err("Failed to list agent apps")?;
    if apps.is_empty() {
        bail!("No agent apps available on {}", app.client().base_url());
    }
    if let Some(name) = requested {
        if !apps.iter().any(|a| a == name) {
            bail!("Unknown app '{}'. Available: {}", name, apps.join(", "));
        }
        app.select_app(name);
    }

    let mut transcript = Transcript::new(true);
    let mut rx = app.subscribe();
    connect(app, &mut transcript, &mut rx).await?;
    emit(&format!("{}\n", HELP))?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        emit("> ")?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                emit("\n")?;
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Quit => break,
            ReplCommand::Empty => {}
            ReplCommand::Help => emit(&format!("{}\n", HELP))?,
            ReplCommand::Unknown(input) => emit(&format!("Unknown command: {}\n{}\n", input, HELP))?,
            ReplCommand::NewSession => {
                if let Err(e) = app.new_session().await {
                    tracing::debug!(error = %e, "New session failed");
                }
                show(&mut transcript, &mut rx)?;
            }
            ReplCommand::Agent(name) => {
                app.select_app(&name);
                connect(app, &mut transcript, &mut rx).await?;
            }
            ReplCommand::Apps => {
                let info = app.session_info();
                let lines = app_lines(&info.apps, info.selected_app.as_deref());
                emit(&format!("{}\n", lines.join("\n")))?;
            }
            ReplCommand::Trace => match app.fetch_trace().await {
                Ok(nodes) if nodes.is_empty() => emit("No trace data yet.\n")?,
                Ok(nodes) => emit(&format!("{}\n", trace_lines(&nodes).join("\n")))?,
                Err(e) => emit(&format!("Failed to fetch trace: {}\n", e))?,
            },
            ReplCommand::Message(text) => {
                send_and_render(app, &text, &mut transcript, &mut rx).await?;
            }
        }
    }
    Ok(())
}

async fn connect(
    app: &ChatApp,
    transcript: &mut Transcript,
    rx: &mut watch::Receiver<ConversationState>,
) -> Result<()> {
    let agent = app.session_info().selected_app.unwrap_or_default();
    emit(&format!("Agent: {}\n", format_agent_name(&agent)))?;
    if let Err(e) = app.connect().await {
        tracing::debug!(error = %e, "Connect failed");
    }
    show(transcript, rx)
}

fn show(transcript: &mut Transcript, rx: &mut watch::Receiver<ConversationState>) -> Result<()> {
    let state = rx.borrow_and_update().clone();
    emit(&transcript.update(&state))?;
    emit(&transcript.finish_turn(&state))?;
    Ok(())
}

/// Send one message, printing the reply as it streams. Ctrl+C cancels it.
async fn send_and_render(
    app: &ChatApp,
    text: &str,
    transcript: &mut Transcript,
    rx: &mut watch::Receiver<ConversationState>,
) -> Result<()> {
    let send = app.send(text);
    tokio::pin!(send);

    let result = loop {
        tokio::select! {
            result = &mut send => break result,
            _ = tokio::signal::ctrl_c() => {
                app.cancel();
            }
            Ok(()) = rx.changed() => {
                let state = rx.borrow_and_update().clone();
                emit(&transcript.update(&state))?;
            }
        }
    };

    match result {
        Ok(outcome) => tracing::debug!(?outcome, "Send finished"),
        Err(AdkError::NotConnected) => {
            emit("Not connected. Use /new to start a session.\n")?;
            return Ok(());
        }
        Err(e) => return Err(e).wrap_err("Send failed"),
    }
    show(transcript, rx)
}
