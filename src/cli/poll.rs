//! The poll command: configure, capture baselines, wait.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::types::Cli;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::LoggerImpl;
use crate::services::Poller;

/// Run one poll to completion.
///
/// Status lines go to stdout; logs go to stderr. Ctrl-C cancels the run.
pub async fn execute(cli: Cli) -> Result<()> {
    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    ConfigLoader::validate(&config).context("Invalid configuration")?;

    let _logger = LoggerImpl::init(&config.logging).context("Failed to initialize logging")?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    let mut poller = Poller::connect(&config.backend, &cli.queries, config.poll.clone())?
        .with_notifier(|line| println!("{line}"));
    for label in &cli.labels {
        poller
            .add_label(&label.name, &label.value, label.kind)
            .with_context(|| {
                format!(
                    "Failed to add label {}{}{:?}",
                    label.name,
                    label.kind.as_str(),
                    label.value
                )
            })?;
    }

    let summary = poller.initialize_baselines(&cancel).await?;
    for query in poller.queries() {
        let key = query.to_string();
        if let Some(baseline) = poller.baseline(&key) {
            println!("{key}: {baseline}");
        }
    }
    println!("baselines: {summary}");

    let settings = poller.config();
    poller
        .wait(settings.interval(), settings.timeout(), &cancel)
        .await?;
    println!("all queries converged");
    Ok(())
}
