//! headerbridge CLI — follow a chain's head through a header listener.
//!
//! Usage:
//! ```bash
//! # Relay every new head of a node to stdout as JSON lines
//! headerbridge watch --url http://localhost:8545 --name rootchain --poll-interval-ms 2000
//!
//! # Fetch the current head once
//! headerbridge head --url http://localhost:8545
//! ```

use std::env;
use std::io::Write;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing_subscriber::EnvFilter;

use serde_json::{json, Value};

use headerbridge_core::{
    BlockSelector, ChainClient, HeaderRelay, Listener, ListenerBuilder, ListenerConfig,
    QueueConnector, QueueError,
};
use headerbridge_evm::HttpChainClient;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    init_tracing();

    let result = match args[1].as_str() {
        "watch" => cmd_watch(&args[2..]).await,
        "head" => cmd_head(&args[2..]).await,
        "info" => {
            cmd_info();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("headerbridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_usage() {
    println!("headerbridge {}", env!("CARGO_PKG_VERSION"));
    println!("Follow a chain's block headers through a listener\n");
    println!("USAGE:");
    println!("    headerbridge <COMMAND>\n");
    println!("COMMANDS:");
    println!("    watch    Relay each new head to stdout as a JSON line");
    println!("    head     Fetch the latest header once");
    println!("    info     Show listener defaults");
    println!("    version  Print version");
    println!("    help     Print this help\n");
    println!("WATCH FLAGS:");
    println!("    --url <URL>                JSON-RPC endpoint URL  [required]");
    println!("    --name <NAME>              Listener name          [default: listener]");
    println!("    --poll-interval-ms <MS>    Polling interval       [default: 5000]");
    println!("    --duration-secs <SECS>     Stop after this long   [default: until Ctrl-C]");
}

fn cmd_info() {
    let defaults = ListenerConfig::default();
    println!("HeaderBridge v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default acquisition mode: {}", defaults.mode);
    println!("  Default poll interval: {}ms", defaults.poll_interval_ms);
    println!("  Default shutdown timeout: {}ms", defaults.shutdown_timeout_ms);
    println!("  Chain clients: EVM over HTTP JSON-RPC");
}

async fn cmd_head(args: &[String]) -> Result<()> {
    let url = parse_flag(args, "--url").ok_or_else(|| anyhow!("--url is required"))?;
    let client = HttpChainClient::default_for(&url)?;

    match client.header_by_number(BlockSelector::Latest).await? {
        Some(header) => println!("{}", serde_json::to_string_pretty(&header)?),
        None => println!("no header at latest"),
    }
    Ok(())
}

async fn cmd_watch(args: &[String]) -> Result<()> {
    let url = parse_flag(args, "--url").ok_or_else(|| anyhow!("--url is required"))?;
    let mut builder = ListenerBuilder::new();
    if let Some(name) = parse_flag(args, "--name") {
        builder = builder.name(name);
    }
    if let Some(ms) = parse_flag(args, "--poll-interval-ms") {
        builder = builder.poll_interval_ms(ms.parse().context("--poll-interval-ms")?);
    }
    let duration = parse_flag(args, "--duration-secs")
        .map(|s| s.parse::<u64>().map(Duration::from_secs))
        .transpose()
        .context("--duration-secs")?;

    let mut listener = HeaderRelay::new(
        builder.build_config(),
        || Ok(Arc::new(HttpChainClient::default_for(&url)?) as Arc<dyn ChainClient>),
        Arc::new(StdoutQueue),
    )?;
    listener.start()?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
        _ = sleep_or_forever(duration) => tracing::info!("duration elapsed"),
        _ = listener.closed() => tracing::warn!("listener shut down on its own"),
    }

    listener.stop().await?;
    Ok(())
}

async fn sleep_or_forever(duration: Option<Duration>) {
    match duration {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

/// Queue connector that writes each published message to stdout.
struct StdoutQueue;

#[async_trait]
impl QueueConnector for StdoutQueue {
    async fn publish(&self, route: &str, payload: Value) -> Result<(), QueueError> {
        let line = format_message(route, &payload);
        writeln!(std::io::stdout().lock(), "{line}").map_err(|e| QueueError::Publish {
            route: route.to_string(),
            reason: e.to_string(),
        })
    }
}

/// One JSON line per message: `{"route": ..., "payload": ...}`.
fn format_message(route: &str, payload: &Value) -> String {
    json!({ "route": route, "payload": payload }).to_string()
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use headerbridge_core::Header;

    #[test]
    fn message_line_carries_route_and_header() {
        let header = Header {
            number: 7,
            hash: "0x07".into(),
            parent_hash: "0x06".into(),
            timestamp: 1_700_000_000,
        };
        let payload = serde_json::to_value(&header).unwrap();
        let line = format_message(&HeaderRelay::route_for("rootchain"), &payload);

        assert!(!line.contains('\n'));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["route"], "rootchain.header");
        assert_eq!(parsed["payload"]["number"], 7);
        assert_eq!(parsed["payload"]["hash"], "0x07");
    }

    #[test]
    fn flags_are_read_by_name() {
        let args: Vec<String> = ["--url", "http://localhost:8545", "--name", "rootchain"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(parse_flag(&args, "--name").as_deref(), Some("rootchain"));
        assert_eq!(parse_flag(&args, "--poll-interval-ms"), None);
    }
}
