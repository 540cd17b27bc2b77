// ABOUTME: One-shot sender: binds, submits one message, waits for its delivery receipt, unbinds
// ABOUTME: Prints the same outcome JSON the HTTP endpoint returns

use argh::FromArgs;
use smpp_gateway::client::{BindCredentials, GatewayBuilder, SubmitOptions};
use smpp_gateway::config::LoggingSettings;
use smpp_gateway::logging::init_tracing;
use smpp_gateway::store::MemoryStore;
use std::time::Duration;

/// Send a single SMS through an SMSC and wait for its delivery receipt
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the system id
    #[argh(option)]
    system_id: Option<String>,

    /// the password
    #[argh(option)]
    password: Option<String>,

    /// the hostname of IP address of the SMSC (default: localhost)
    #[argh(option)]
    host: Option<String>,

    /// the port to use when connecting to the SMSC (default: 2775)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// the message to send
    #[argh(option, short = 'm')]
    message: String,

    /// the recipient telephone number
    #[argh(option, short = 't')]
    to: String,

    /// the sender id shown on the handset
    #[argh(option, short = 'f')]
    from: Option<String>,

    /// seconds to wait for the delivery receipt (default: 30)
    #[argh(option)]
    wait: Option<u64>,
}

#[tokio::main]
async fn main() -> smpp_gateway::Result<()> {
    let cli_args: CliArgs = argh::from_env();

    init_tracing(&LoggingSettings {
        level: if cli_args.debugging { "debug" } else { "info" }.to_string(),
        json: false,
    })?;

    let host = cli_args.host.unwrap_or_else(|| "localhost".to_owned());
    let port = cli_args.port.unwrap_or(2775);
    let credentials = BindCredentials::transceiver(
        cli_args.system_id.unwrap_or_default(),
        cli_args.password.unwrap_or_default(),
    );

    if cli_args.debugging {
        println!("Connecting to {host}:{port}");
    }

    let gateway = GatewayBuilder::new(host, port, credentials)
        .submit_options(SubmitOptions::new(cli_args.from.unwrap_or_default()))
        .delivery_timeout(Duration::from_secs(cli_args.wait.unwrap_or(30)))
        .build(MemoryStore::new());

    if let Err(e) = gateway.connect().await {
        eprintln!("Connection/bind failed: {e}");
        return Err(e.into());
    }

    let outcome = gateway.send(&cli_args.to, &cli_args.message).await;
    println!("{}", serde_json::to_string(&outcome)?);

    gateway.disconnect().await;

    if outcome.is_success() {
        Ok(())
    } else {
        Err(outcome.message.into())
    }
}
