//! `pm-agent context`: print the context pack for a message without
//! calling the model.

use pm_contextpack::ContextInput;
use pm_domain::config::Config;

use crate::bootstrap;

pub async fn context(config: &Config, message: String) -> anyhow::Result<()> {
    let builder = bootstrap::context_builder(config);
    let pack = builder
        .build(&ContextInput {
            message,
            ..ContextInput::default()
        })
        .await?;

    println!("{}", pack.text);

    let report = serde_json::to_string_pretty(&pack.report)
        .map_err(|e| anyhow::anyhow!("serializing context report: {e}"))?;
    eprintln!("{report}");
    Ok(())
}
