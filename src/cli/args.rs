//! Command-line definition.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ChatConfig;
use crate::error::AdkResult;

/// Terminal chat client and streaming proxy for ADK agent servers
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "adk-chat")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Base URL of the ADK server (overrides ADK_SERVER_URL)
    #[arg(long, global = true)]
    pub server_url: Option<String>,

    /// User id for sessions and runs
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Path to a JSON config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the streaming proxy
    Serve {
        /// Address to listen on (overrides ADK_CHAT_BIND)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
    /// List the available agent apps
    Apps,
    /// Chat with an agent (default)
    Chat {
        /// Agent app to talk to; defaults to the first available one
        #[arg(short, long)]
        app: Option<String>,
    },
    /// Print the invocation tree of a session
    Trace {
        session: String,
    },
    /// Inspect or delete a session
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Print a session as JSON
    Show { app: String, session: String },
    /// Delete a session
    Delete { app: String, session: String },
}

impl Default for Command {
    fn default() -> Self {
        Command::Chat { app: None }
    }
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or_default()
    }

    /// Layered config with the command-line flags applied last.
    pub fn resolve_config(&self) -> AdkResult<ChatConfig> {
        let mut config = ChatConfig::load(self.config.as_deref())?;
        if let Some(url) = &self.server_url {
            config = config.with_server_url(url.clone());
        }
        if let Some(user) = &self.user {
            config = config.with_user(user.clone());
        }
        if let Some(Command::Serve { bind: Some(addr) }) = &self.command {
            config = config.with_bind_addr(*addr);
        }
        Ok(config)
    }

    /// Default log filter when `RUST_LOG` is unset. Interactive commands
    /// stay quiet so log lines don't interleave with chat output.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if matches!(self.command, Some(Command::Serve { .. })) {
            "info"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_default_is_chat() {
        let cli = parse(&["adk-chat"]);
        assert_eq!(cli.command(), Command::Chat { app: None });
        assert_eq!(cli.log_filter(), "warn");
    }

    #[test]
    fn test_serve_with_bind() {
        let cli = parse(&["adk-chat", "serve", "--bind", "0.0.0.0:9000"]);
        assert_eq!(
            cli.command(),
            Command::Serve {
                bind: Some("0.0.0.0:9000".parse().unwrap())
            }
        );
        assert_eq!(cli.log_filter(), "info");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["adk-chat", "chat", "--app", "my_agent", "--user", "alice", "-d"]);
        assert_eq!(cli.user.as_deref(), Some("alice"));
        assert_eq!(cli.log_filter(), "debug");
        assert_eq!(
            cli.command(),
            Command::Chat {
                app: Some("my_agent".to_string())
            }
        );
    }

    #[test]
    fn test_session_subcommands() {
        let cli = parse(&["adk-chat", "session", "delete", "my_agent", "s_1"]);
        assert_eq!(
            cli.command(),
            Command::Session {
                action: SessionCommand::Delete {
                    app: "my_agent".to_string(),
                    session: "s_1".to_string()
                }
            }
        );
        assert!(Cli::try_parse_from(["adk-chat", "session", "show", "only_app"]).is_err());
    }

    #[test]
    fn test_trace_requires_session() {
        assert!(Cli::try_parse_from(["adk-chat", "trace"]).is_err());
        assert_eq!(
            parse(&["adk-chat", "trace", "s_9"]).command(),
            Command::Trace {
                session: "s_9".to_string()
            }
        );
    }

    #[test]
    #[serial]
    fn test_resolve_config_applies_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let cli = parse(&[
            "adk-chat",
            "--config",
            path.to_str().unwrap(),
            "--server-url",
            "http://flag:1",
            "serve",
            "--bind",
            "127.0.0.1:7000",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.server_url, "http://flag:1");
        assert_eq!(config.bind_addr.port(), 7000);
    }
}
