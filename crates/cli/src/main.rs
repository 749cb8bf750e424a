use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dom::{ElementId, MemoryDocument};
use preloader::{create_preloader, spawn_discovery, PreloaderConfig, PreloaderStats, Transition};
use sniffer::HeaderSniffer;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "gif-preloader")]
#[command(about = "Detect animated GIFs from their first bytes", long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base URL for root-relative image sources
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sniff image headers and print what they declare
    Sniff {
        urls: Vec<String>,

        /// Print one JSON object per line
        #[arg(long)]
        json: bool,
    },

    /// Run the preloader over an in-memory page holding these images
    Watch {
        urls: Vec<String>,

        /// Give up after this many seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PreloaderConfig::load(path).await?,
        None => PreloaderConfig::default(),
    };
    if cli.base_url.is_some() {
        config.base_url = cli.base_url.clone();
    }

    match cli.command {
        Command::Sniff { urls, json } => sniff(&config, &urls, json).await,
        Command::Watch { urls, timeout } => {
            let limit = Duration::from_secs(timeout);
            match tokio::time::timeout(limit, watch(&config, &urls)).await {
                Ok(result) => result,
                Err(_) => Err(format!("gave up after {}s", timeout).into()),
            }
        }
    }
}

async fn sniff(
    config: &PreloaderConfig,
    urls: &[String],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let sniffer = config.build_sniffer()?;

    for url in urls {
        let result = sniffer.sniff(url).await;

        if json {
            let line = match &result {
                Ok(header) => serde_json::json!({
                    "url": url,
                    "header": header,
                    "gif": header.is_gif(),
                }),
                Err(e) => serde_json::json!({
                    "url": url,
                    "error": e.to_string(),
                }),
            };
            println!("{}", line);
            continue;
        }

        match result {
            Ok(header) => println!(
                "{}: {} {}x{}{}",
                url,
                header.signature_str(),
                header.width,
                header.height,
                if header.is_gif() { " (gif)" } else { "" }
            ),
            Err(e) => println!("{}: inconclusive ({})", url, e),
        }
    }

    Ok(())
}

/// Drive every image through its lifecycle, synthesizing load events as
/// each watcher asks for them.
async fn watch(
    config: &PreloaderConfig,
    urls: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let sniffer: Arc<dyn HeaderSniffer> = Arc::new(config.build_sniffer()?);
    let document = MemoryDocument::new();

    let handle = create_preloader(document.clone(), sniffer, config);
    let mut events = handle.subscribe();
    let _discovery = spawn_discovery(document.observe(), handle.clone());

    let srcs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let images = document.insert_images(document.root(), &srcs)?;
    let names: HashMap<ElementId, &str> =
        images.iter().copied().zip(srcs.iter().copied()).collect();

    // Progress is read from the registry, so a lagged receiver cannot stall the loop.
    while !settled(&handle.stats().await?, images.len()) {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(n)) => {
                tracing::warn!("Missed {} transitions", n);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let name = names.get(&event.element).copied().unwrap_or("?");
        println!("{} {:?}", name, event.transition);

        // Placeholder is up: the image finishes loading, then plays through once more.
        if matches!(event.transition, Transition::Mounted(_) | Transition::Replaying) {
            document.finish_load(event.element)?;
            handle.load_completed(event.element).await?;
        }
    }

    while let Ok(event) = events.try_recv() {
        let name = names.get(&event.element).copied().unwrap_or("?");
        println!("{} {:?}", name, event.transition);
    }

    let stats = handle.stats().await?;
    tracing::info!(
        "Watched {} images, {} sniffed, {} overlays left",
        stats.tracked,
        stats.sniffs_started,
        stats.overlays
    );
    Ok(())
}

/// Every image has been registered and no watcher has work left.
fn settled(stats: &PreloaderStats, images: usize) -> bool {
    stats.tracked >= images && stats.active == 0
}
