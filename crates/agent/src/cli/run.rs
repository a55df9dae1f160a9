//! `pm-agent run`: one-shot execution command.
//!
//! Sends a single message to the agent, prints the reply to stdout and
//! exits. Tool activity goes to stderr so stdout stays pipeable.

use pm_domain::config::Config;
use pm_domain::tool::ImageAttachment;

use crate::bootstrap;
use crate::runner::TurnInput;

/// Turn an `--image` argument into an attachment.
pub fn parse_image(raw: &str) -> anyhow::Result<ImageAttachment> {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("data:") {
        let media_type = rest
            .split_once(';')
            .map(|(mt, _)| mt.to_string())
            .filter(|mt| mt.starts_with("image/"))
            .ok_or_else(|| anyhow::anyhow!("data URL must carry an image/* media type"))?;
        return Ok(ImageAttachment {
            url: raw.to_string(),
            media_type: Some(media_type),
        });
    }
    if raw.starts_with("https://") {
        return Ok(ImageAttachment {
            url: raw.to_string(),
            media_type: None,
        });
    }
    anyhow::bail!("unsupported image reference '{raw}': expected an https:// or data: URL")
}

/// Execute a single agent turn and print the reply.
pub async fn run(
    config: &Config,
    message: String,
    images: Vec<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let runner = bootstrap::build_runner(config)?;

    let images = images
        .iter()
        .map(|raw| parse_image(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let input = TurnInput {
        message,
        images,
        ..TurnInput::default()
    };

    match runner.run(input).await {
        Ok(result) => {
            if json_output {
                let json = serde_json::to_string_pretty(&result)
                    .map_err(|e| anyhow::anyhow!("serializing turn result: {e}"))?;
                println!("{json}");
            } else {
                for call in &result.tool_calls {
                    eprintln!("\x1b[2m[tool: {}]\x1b[0m", call.name);
                }
                println!("{}", result.reply);
            }
            Ok(())
        }
        Err(e) => {
            if json_output {
                let json = serde_json::to_string_pretty(&serde_json::json!({ "error": e }))
                    .map_err(|e| anyhow::anyhow!("serializing turn error: {e}"))?;
                println!("{json}");
            }
            Err(e.into())
        }
    }
}
