//! Listen for print jobs and write them to a spool directory.
//!
//! Demonstrates:
//! - Building a manager with a directory render sink
//! - Connecting with a token and enabling printing
//! - Opening every job as soon as it is available
//!
//! Usage:
//!   cargo run --example listen -- ws://print.local:9000/client
//!   cargo run --example listen -- ws://print.local:9000/client --token secret --spool ./spool
//!   cargo run --example listen -- ws://print.local:9000/client --debug

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use printlink::{
    ConnectOptions, ConnectTarget, ConnectionManager, DirectorySink, PrintEvent, RenderSink,
};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_SPOOL: &str = "./spool";

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    host: String,
    token: Option<String>,
    spool: PathBuf,
    debug: bool,
}

impl Args {
    /// Parse command-line arguments.
    fn parse() -> anyhow::Result<Self> {
        let mut args = std::env::args().skip(1);
        let mut host = None;
        let mut token = None;
        let mut spool = PathBuf::from(DEFAULT_SPOOL);
        let mut debug = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--token" => token = Some(args.next().context("--token needs a value")?),
                "--spool" => spool = args.next().context("--spool needs a value")?.into(),
                "--debug" => debug = true,
                _ => host = Some(arg),
            }
        }

        Ok(Self {
            host: host.context("missing server address")?,
            token,
            spool,
            debug,
        })
    }
}

// ============================================================================
// Main
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug { "printlink=debug" } else { "printlink=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse()?;
    init_logging(args.debug);

    let spool = args.spool.clone();
    let manager = ConnectionManager::builder()
        .render_sink(move || Arc::new(DirectorySink::new(spool.clone())) as Arc<dyn RenderSink>)
        .build();

    // Split "ws://host:port/path" into host and path for the target.
    let mut target = ConnectTarget::new(&args.host);
    if let Ok(url) = url::Url::parse(&args.host)
        && url.path() != "/"
    {
        target = ConnectTarget::new(args.host.trim_end_matches(url.path())).with_path(url.path());
    }
    if let Some(token) = &args.token {
        target = target.with_token(token);
    }

    let mut events = manager
        .connect(target, ConnectOptions::default())
        .context("invalid connection settings")?;
    let id = events.connection_id();

    println!("=== Listening on {} (spool: {}) ===", args.host, args.spool.display());

    loop {
        tokio::select! {
            event = events.next_event() => {
                let Some(event) = event else { break };
                match event {
                    PrintEvent::Connected => {
                        println!("[connected] enabling printing");
                        manager.enable_printing(id);
                    }
                    PrintEvent::JobAvailable { job_id, file_name, file_length } => {
                        println!("[job {job_id}] {file_name} ({file_length} bytes)");
                        manager.open_printable(id, job_id);
                    }
                    PrintEvent::ChunkReceived { .. } => {}
                    other => println!("[event] {other:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                manager.shutdown();
            }
        }
    }

    Ok(())
}
