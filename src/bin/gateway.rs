// ABOUTME: Gateway service: binds to the SMSC and serves the HTTP send API
// ABOUTME: Settings come from an optional TOML file overlaid with environment variables

use argh::FromArgs;
use smpp_gateway::config::Settings;
use smpp_gateway::http::{AppState, router};
use smpp_gateway::logging::init_tracing;
use smpp_gateway::{GatewayBuilder, Store};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

/// SMPP gateway exposing an HTTP endpoint for sending SMS
#[derive(FromArgs)]
struct CliArgs {
    /// path to a TOML settings file
    #[argh(option, short = 'c')]
    config: Option<String>,

    /// emit logs as JSON
    #[argh(switch)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> smpp_gateway::Result<()> {
    let cli_args: CliArgs = argh::from_env();

    let mut settings = match &cli_args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply_env()?;
    settings.validate()?;
    if cli_args.json_logs {
        settings.logging.json = true;
    }
    init_tracing(&settings.logging)?;

    let store = Store::from_settings(&settings.store)?;
    let gateway = Arc::new(GatewayBuilder::from_settings(&settings).build(store));

    info!(
        host = %settings.smsc.host,
        port = settings.smsc.port,
        system_id = %settings.smsc.system_id,
        "Connecting to SMSC"
    );
    // Sends reconnect on demand, so a failed first bind is not fatal
    if let Err(e) = gateway.connect().await {
        warn!(error = %e, "Initial bind failed");
    }

    let server_name = match settings.http.server_name.as_str() {
        "" => env!("CARGO_PKG_NAME").to_string(),
        name => name.to_string(),
    };
    let app = router(Arc::new(AppState {
        gateway: gateway.clone(),
        server_name,
    }));

    let address = settings.http.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!(address = %address, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    gateway.disconnect().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT (Ctrl+C)"),
        _ = terminate => info!("received SIGTERM"),
    }
}
