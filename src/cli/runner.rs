//! CLI runner - executes commands

use crate::auth::{Credential, BEARER_TOKEN_ENV};
use crate::cli::commands::{Cli, Commands};
use crate::config::AppConfig;
use crate::dataset::{self, DatasetWriter};
use crate::decode::FieldDecoder;
use crate::engine::{IngestStats, StreamIngestor};
use crate::error::Result;
use crate::http::StreamClient;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let config = self.load_config()?;

        match &self.cli.command {
            Commands::Ingest { .. } => {
                let cancel = CancellationToken::new();
                let trigger = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("interrupt received, stopping after the current read");
                        trigger.cancel();
                    }
                });
                self.ingest(config, Credential::from_env(), &cancel).await
            }
            Commands::Dedupe { .. } => self.dedupe(&config),
        }
    }

    /// Load the config file and apply command-line overrides
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::load_or_default(self.cli.config.as_deref())?;

        match &self.cli.command {
            Commands::Ingest {
                max_attempts,
                output,
                url,
                on_record_error,
                read_timeout,
            } => {
                if max_attempts.is_some() {
                    config.retry.max_attempts = *max_attempts;
                }
                apply(&mut config.dataset.path, output.clone());
                apply(&mut config.stream.url, url.clone());
                apply(&mut config.records.on_error, *on_record_error);
                apply(&mut config.stream.read_timeout_secs, *read_timeout);
            }
            Commands::Dedupe { dataset } => {
                apply(&mut config.dataset.path, dataset.clone());
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Stream into the dataset until done, then print a summary line
    pub async fn ingest(
        &self,
        config: AppConfig,
        credential: Credential,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if credential.is_empty() {
            warn!(
                "{} is not set; the stream will reject the request",
                BEARER_TOKEN_ENV
            );
        }

        let format = config.dataset.format()?;
        let writer = DatasetWriter::open(&config.dataset.path, &format)?;
        let client = StreamClient::new(config.client_config(), credential)?;
        info!(
            url = %client.url(),
            dataset = %config.dataset.path.display(),
            "ingesting"
        );

        let mut ingestor = StreamIngestor::new(client, writer, config.ingest_config())
            .with_decoder(FieldDecoder::with_path(&config.stream.field_path));
        let result = ingestor.run(cancel).await;
        let closed = ingestor.into_writer().finish();
        let (stats, rows) = settle(result, closed)?;

        let summary = json!({
            "type": "INGEST",
            "dataset": config.dataset.path,
            "rows_appended": rows,
            "stats": stats,
        });
        println!("{summary}");
        Ok(())
    }

    /// Deduplicate the dataset and print a summary line
    pub fn dedupe(&self, config: &AppConfig) -> Result<()> {
        let format = config.dataset.format()?;
        let stats = dataset::dedupe(&config.dataset.path, &format)?;

        let summary = json!({
            "type": "DEDUPE",
            "dataset": config.dataset.path,
            "stats": stats,
        });
        println!("{summary}");
        Ok(())
    }
}

/// Combine the run outcome with closing the dataset. A run error wins; a
/// close failure behind it is only logged.
fn settle(result: Result<IngestStats>, closed: Result<u64>) -> Result<(IngestStats, u64)> {
    match (result, closed) {
        (Ok(stats), closed) => Ok((stats, closed?)),
        (Err(e), Ok(_)) => Err(e),
        (Err(e), Err(close)) => {
            warn!(error = %close, "failed to close dataset after aborted run");
            Err(e)
        }
    }
}

/// Replace `slot` when an override was given
fn apply<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
