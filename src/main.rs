use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use privacy_gateway::error::{GatewayError, Result};
use privacy_gateway::handlers::echo::EchoAppHandler;
use privacy_gateway::handlers::forward::ForwardingHttpHandler;
use privacy_gateway::handlers::http::BinaryHttpHandler;
use privacy_gateway::handlers::EncapsulationHandler;
use privacy_gateway::metrics::LogMetricsFactory;
use privacy_gateway::ohttp::gateway::{Gateway, BHTTP_LABELS, ECHO_LABELS};
use privacy_gateway::ohttp::keys::{default_suites, KeyConfig, KeyRegistry};
use privacy_gateway::server::{self, AppState, ECHO_ENDPOINT, GATEWAY_ENDPOINT};

#[derive(Parser)]
#[command(name = "privacy-gateway")]
#[command(about = "Oblivious HTTP gateway behind a relay")]
#[command(version)]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Key ID advertised for the gateway key.
    #[arg(long, default_value_t = 0)]
    key_id: u8,

    /// Hex-encoded 32-byte seed for the gateway key. An ephemeral key pair
    /// is generated when absent; clients then need a fresh config per run.
    #[arg(long)]
    key_seed: Option<String>,

    /// Host the forwarding handler may reach. Repeatable; no occurrences
    /// allows any target.
    #[arg(long = "allow-target")]
    allow_targets: Vec<String>,

    /// Serve descriptive error bodies (debug deployments only).
    #[arg(long)]
    debug_response: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.key_seed {
        Some(seed) => {
            let seed = hex::decode(seed)
                .map_err(|e| GatewayError::Config(format!("invalid key seed: {e}")))?;
            KeyConfig::from_seed(cli.key_id, &seed, default_suites())?
        }
        None => {
            tracing::warn!("no --key-seed given, generating an ephemeral key pair");
            KeyConfig::generate(cli.key_id, default_suites())?
        }
    };
    let gateway = Arc::new(Gateway::new(KeyRegistry::new(vec![config])?));

    let mut handlers = HashMap::new();
    handlers.insert(
        GATEWAY_ENDPOINT.to_string(),
        EncapsulationHandler::new(
            BHTTP_LABELS,
            gateway.clone(),
            Arc::new(BinaryHttpHandler::new(ForwardingHttpHandler::shared(
                cli.allow_targets,
            ))),
        ),
    );
    handlers.insert(
        ECHO_ENDPOINT.to_string(),
        EncapsulationHandler::new(ECHO_LABELS, gateway.clone(), Arc::new(EchoAppHandler)),
    );

    let state = AppState {
        gateway,
        handlers,
        metrics: Arc::new(LogMetricsFactory),
        debug_response: cli.debug_response,
    };

    server::serve(state, &cli.listen).await
}
