// ABOUTME: HTTP service binary: reads configuration from flags or environment and serves /.
// ABOUTME: Installs a tracing subscriber filtered by RUST_LOG before starting the server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use digests_unfurl::server::{self, AppState};
use digests_unfurl::{load_rules_from_path, Unfurler};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "unfurl-server")]
#[command(about = "Serve link metadata over HTTP")]
struct Config {
    /// Address to listen on
    #[arg(long, env = "UNFURL_BIND", default_value = "0.0.0.0:8787")]
    bind: String,

    /// Bearer token required on every request
    #[arg(long, env = "API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Upstream request timeout in seconds
    #[arg(long, env = "UNFURL_TIMEOUT_SECS", default_value_t = 15)]
    timeout: u64,

    /// JSON rules file replacing the built-in rule table
    #[arg(long, env = "UNFURL_RULES")]
    rules: Option<PathBuf>,

    /// Allow fetching from private/local networks
    #[arg(long, env = "UNFURL_ALLOW_PRIVATE_NETWORKS")]
    allow_private_networks: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();

    let mut builder = Unfurler::builder()
        .timeout(Duration::from_secs(config.timeout))
        .allow_private_networks(config.allow_private_networks);
    if let Some(path) = &config.rules {
        let rules = load_rules_from_path(path)
            .with_context(|| format!("loading rules from {}", path.display()))?;
        info!(fields = rules.len(), path = %path.display(), "using custom rules");
        builder = builder.rules(Arc::new(rules));
    }

    if config.api_token.is_none() {
        info!("no API_TOKEN configured; requests are unauthenticated");
    }

    let state = AppState::new(builder.build(), config.api_token);
    server::serve(&config.bind, state).await
}
