use clap::Parser;

use pm_agent::cli::{Cli, Command, ConfigCommand};
use pm_agent::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to chat when no subcommand is given.
        None | Some(Command::Chat) => {
            let (config, _) = pm_agent::cli::load_config()?;
            let tracer_provider = telemetry::init_tracing(&config.observability);
            let result = pm_agent::cli::chat::chat(&config).await;
            telemetry::shutdown(tracer_provider);
            result
        }
        Some(Command::Run {
            message,
            images,
            json,
        }) => {
            let (config, _) = pm_agent::cli::load_config()?;
            let tracer_provider = telemetry::init_tracing(&config.observability);
            let result = pm_agent::cli::run::run(&config, message, images, json).await;
            telemetry::shutdown(tracer_provider);
            if let Err(e) = result {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Ready { file, json }) => {
            let ready = pm_agent::cli::ready::ready(&file, json)?;
            if !ready {
                std::process::exit(2);
            }
            Ok(())
        }
        Some(Command::Context { message }) => {
            let (config, _) = pm_agent::cli::load_config()?;
            let tracer_provider = telemetry::init_tracing(&config.observability);
            let result = pm_agent::cli::context::context(&config, message).await;
            telemetry::shutdown(tracer_provider);
            result
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = pm_agent::cli::load_config()?;
            let valid = pm_agent::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = pm_agent::cli::load_config()?;
            pm_agent::cli::config::show(&config)
        }
        Some(Command::Version) => {
            println!("pm-agent {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
