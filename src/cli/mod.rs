//! Command-line interface.
//!
//! - `args` - clap definition and config resolution
//! - `chat` - the interactive REPL
//! - `render` - terminal output for conversations and traces
//!
//! ```ignore
//! use adk_chat::cli::{run, Cli};
//! use clap::Parser;
//!
//! run(Cli::parse()).await?;
//! ```

pub mod args;
pub mod chat;
pub mod render;

pub use args::{Cli, Command, SessionCommand};

use color_eyre::eyre::WrapErr;
use color_eyre::Result;

use crate::app::ChatApp;
use crate::client::AdkClient;
use crate::config::ChatConfig;
use crate::models::{build_invocation_tree, filter_apps, SessionKey};
use crate::proxy::{start_proxy_server_on, ProxyState};

/// Execute the parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    let config = cli
        .resolve_config()
        .wrap_err("Failed to load configuration")?;

    match cli.command() {
        Command::Serve { .. } => serve(&config).await,
        Command::Apps => {
            let client = AdkClient::from_config(&config)?;
            let apps = client
                .list_apps()
                .await
                .wrap_err_with(|| format!("Failed to list apps on {}", config.base_url()))?;
            let apps = filter_apps(&apps, &config.allowed_apps);
            for line in render::app_lines(&apps, None) {
                println!("{}", line);
            }
            Ok(())
        }
        Command::Chat { app } => {
            let client = AdkClient::from_config(&config)?;
            let chat = ChatApp::new(client, &config);
            chat::run_chat(&chat, app.as_deref()).await
        }
        Command::Trace { session } => {
            let client = AdkClient::from_config(&config)?;
            let spans = client
                .fetch_trace(&session)
                .await
                .wrap_err_with(|| format!("Failed to fetch trace for {}", session))?;
            let tree = build_invocation_tree(&spans);
            if tree.is_empty() {
                println!("No trace data for session {}", session);
            }
            for line in render::trace_lines(&tree) {
                println!("{}", line);
            }
            Ok(())
        }
        Command::Session { action } => {
            let client = AdkClient::from_config(&config)?;
            match action {
                SessionCommand::Show { app, session } => {
                    let key = SessionKey::new(app, config.user.clone(), session);
                    let session = client
                        .get_session(&key)
                        .await
                        .wrap_err("Failed to fetch session")?;
                    println!("{}", serde_json::to_string_pretty(&session)?);
                }
                SessionCommand::Delete { app, session } => {
                    let key = SessionKey::new(app, config.user.clone(), session);
                    client
                        .delete_session(&key)
                        .await
                        .wrap_err("Failed to delete session")?;
                    println!("Deleted session {}", key.session);
                }
            }
            Ok(())
        }
    }
}

async fn serve(config: &ChatConfig) -> Result<()> {
    let state = ProxyState::from_config(config)?;
    let (handle, addr) = start_proxy_server_on(config.bind_addr, state)
        .await
        .wrap_err_with(|| format!("Failed to bind {}", config.bind_addr))?;
    println!("Proxy on http://{} -> {}", addr, config.base_url());

    tokio::select! {
        result = handle => result.wrap_err("Proxy task failed")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down proxy"),
    }
    Ok(())
}
