use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use x402_payer::types::proto::JobState;
use x402_payer::{PayerConfig, PollOptions, X402Payer};

use crate::cli::{CliArgs, Command};

/// Loads `.env`, sets up logging, reads the config file and runs the selected command.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();
    let config = load_config(args.config)?;
    let payer = X402Payer::from_config(&config);

    match args.command {
        Command::Call {
            url,
            data,
            wait,
            max_amount,
        } => {
            let payer = match max_amount {
                Some(atomic) => payer.with_max_amount(atomic),
                None => payer,
            };
            let payload = data
                .as_deref()
                .map(serde_json::from_str::<serde_json::Value>)
                .transpose()?;
            let result = payer.send(&url, payload.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if let (true, Some(job)) = (wait, &result.job) {
                let cancellation = CancellationToken::new();
                let on_ctrl_c = cancellation.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        on_ctrl_c.cancel();
                    }
                });
                let mut options = PollOptions::default()
                    .with_max_attempts(config.max_poll_attempts())
                    .with_cancellation(cancellation);
                if let Some(interval) = config.poll_interval {
                    options = options.with_interval(interval);
                }
                let status = payer
                    .poll_with_progress(job, Some(options), |status| {
                        tracing::info!(attempt = status.attempts, state = ?status.state, "Job status");
                    })
                    .await?;
                println!("{}", serde_json::to_string_pretty(&status)?);
                if status.state == JobState::Failed {
                    return Err(status
                        .error
                        .unwrap_or_else(|| "job failed".to_string())
                        .into());
                }
            }
        }
        Command::Balance { chain, owner } => {
            let balance = payer.balance(&chain, owner.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&balance)?);
        }
    }
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<PayerConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => PayerConfig::load(&path)?,
        None => match PayerConfig::default_path() {
            Some(path) => PayerConfig::load_or_default(&path)?,
            None => PayerConfig::default(),
        },
    };
    Ok(config)
}
