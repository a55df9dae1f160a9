pub mod chat;
pub mod config;
pub mod context;
pub mod ready;
pub mod run;

use clap::{Parser, Subcommand};

/// pm-agent: the Project Manager agent for a repository and its Kanban board.
#[derive(Debug, Parser)]
#[command(name = "pm-agent", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an interactive chat session (default when no subcommand is given).
    Chat,
    /// Send a single message to the agent and print the reply.
    Run {
        /// The message to send.
        message: String,
        /// Image to attach, as an https or data: URL. May be repeated.
        #[arg(long = "image")]
        images: Vec<String>,
        /// Output the full turn result as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Check a markdown ticket body against the Definition of Ready.
    Ready {
        /// Path to the markdown file.
        file: String,
        /// Output the readiness report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the context pack that would be sent for a message.
    Context {
        /// The message to build the pack for.
        message: String,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `PM_CONFIG` (or
/// `pm-agent.toml` by default).  Returns the parsed [`Config`] and the
/// path that was used.
///
/// [`Config`]: pm_domain::config::Config
pub fn load_config() -> anyhow::Result<(pm_domain::config::Config, String)> {
    let config_path = std::env::var("PM_CONFIG").unwrap_or_else(|_| "pm-agent.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        pm_domain::config::Config::default()
    };

    Ok((config, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_repeated_images() {
        let cli = Cli::try_parse_from([
            "pm-agent",
            "run",
            "hello",
            "--image",
            "https://example.com/a.png",
            "--image",
            "data:image/png;base64,AAAA",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Run { images, json, .. }) => {
                assert_eq!(images.len(), 2);
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["pm-agent"]).unwrap();
        assert!(cli.command.is_none());
    }
}
