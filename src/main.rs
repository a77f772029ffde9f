// src/main.rs
//! Xexun decoder - listens for trackers and prints positions as JSON lines

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use xexun_decoder::{config::DecoderConfig, *};

#[derive(Debug, Parser)]
#[command(name = "xexun-decoder", version, about = "Decode Xexun tracker sentences")]
struct Cli {
    /// Config file (defaults to ~/.config/xexun-decoder/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Accept tracker connections and print decoded positions
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// Disconnect every connection this many milliseconds after connect (0 disables)
        #[arg(long)]
        reset_delay: Option<u64>,
        /// Cancel the pending disconnect once the connection sends a valid sentence
        #[arg(long)]
        cancel_on_decode: bool,
    },
    /// Decode sentences given on the command line
    Decode {
        #[arg(required = true)]
        sentences: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => DecoderConfig::load_from(path)?,
        None => DecoderConfig::load()?,
    };
    let registry = Arc::new(MemoryRegistry::from_table(&config.devices));

    match cli.command {
        Command::Serve {
            host,
            port,
            reset_delay,
            cancel_on_decode,
        } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(delay) = reset_delay {
                config.reset_delay_ms = delay;
            }
            config.cancel_on_decode |= cancel_on_decode;

            tracing::info!(
                devices = registry.len(),
                reset_delay_ms = config.reset_delay_ms,
                "Starting decoder"
            );
            serve(config, registry).await
        }
        Command::Decode { sentences } => {
            let mut failed = 0;
            for sentence in &sentences {
                match decode(sentence.trim(), registry.as_ref()) {
                    Ok(position) => println!("{}", serde_json::to_string(&position)?),
                    Err(e) => {
                        eprintln!("{}: {}", e, sentence);
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} of {} sentences failed to decode", failed, sentences.len());
            }
            Ok(())
        }
    }
}

async fn serve(config: DecoderConfig, registry: Arc<MemoryRegistry>) -> anyhow::Result<()> {
    let listener = DecoderServer::bind(&config.listen_addr())
        .await
        .with_context(|| format!("Failed to listen on {}", config.listen_addr()))?;
    let server = DecoderServer::new(registry, config.reset_policy());

    let (tx, mut rx) = mpsc::channel::<Position>(256);
    let printer = tokio::spawn(async move {
        while let Some(position) = rx.recv().await {
            match serde_json::to_string(&position) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::warn!("Failed to serialize position: {}", e),
            }
        }
    });

    tokio::select! {
        _ = server.run(listener, tx) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    printer.abort();
    Ok(())
}
