//! Robot that turns form emails into case notes: a producer pass fans each
//! submission out into one queue task per identifier, and a consumer pass
//! resolves or creates a case per task and appends the submitted note.

mod clients;
mod email;
mod error;
mod robot_config;
mod stage;
#[cfg(test)]
mod testing;

use std::env;

use anyhow::Context;
use lib_api_clients::bucket::BucketClient;
use lib_api_clients::graph::GraphMailClient;
use lib_api_clients::nova::NovaClient;
use lib_api_clients::queue::OrchestratorQueue;
use lib_api_clients::smtp::SmtpRelay;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::robot_config::RobotConfig;

pub type HttpClient = reqwest::Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let cfg = RobotConfig::load()?;
    let http_client = reqwest::ClientBuilder::new().use_rustls_tls().build()?;

    // Only the producer pass, only the consumer pass, or both in sequence.
    let stage_arg = env::args().nth(1);
    match stage_arg.as_deref() {
        Some("mail") => run_producer(&cfg, &http_client).await?,
        Some("notes") => run_consumer(&cfg, &http_client).await?,
        None => {
            run_producer(&cfg, &http_client).await?;
            run_consumer(&cfg, &http_client).await?;
        }
        Some(other) => anyhow::bail!("Unknown stage '{other}', expected 'mail' or 'notes'"),
    }

    Ok(())
}

async fn run_producer(cfg: &RobotConfig, http_client: &HttpClient) -> anyhow::Result<()> {
    tracing::info!("Starting producer pass (mailbox -> queue)");

    let graph_token = required_env("GRAPH_ACCESS_TOKEN")?;
    let mail = GraphMailClient::new(http_client.clone(), graph_token, cfg.mailbox.user.clone());
    let queue = orchestrator_queue(http_client)?;
    let relay = SmtpRelay::new(cfg.smtp.server.clone(), cfg.smtp.port);

    stage::fanout::run(cfg, &mail, &queue, &relay).await?;
    Ok(())
}

async fn run_consumer(cfg: &RobotConfig, http_client: &HttpClient) -> anyhow::Result<()> {
    tracing::info!("Starting consumer pass (queue -> case notes)");

    let queue = orchestrator_queue(http_client)?;
    let nova = NovaClient::new(
        http_client.clone(),
        required_env("NOVA_API_URL")?,
        required_env("NOVA_ACCESS_TOKEN")?,
    );
    let bucket = BucketClient::new(
        http_client.clone(),
        required_env("BUCKET_CONNECTION_STRING")?,
    );

    stage::notes::run(cfg, &queue, &nova, &bucket).await?;
    Ok(())
}

fn orchestrator_queue(http_client: &HttpClient) -> anyhow::Result<OrchestratorQueue> {
    Ok(OrchestratorQueue::new(
        http_client.clone(),
        required_env("ORCHESTRATOR_API_URL")?,
        required_env("ORCHESTRATOR_API_KEY")?,
    ))
}

fn required_env(name: &str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{name} is not set"))
}
