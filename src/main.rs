//! Triangular arbitrage pipeline entry point.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tri_arb::api::{create_router, AppState};
use tri_arb::arbitrage::{enumerate_paths, load_paths, save_paths, ArbitrageDetector, SharedPaths};
use tri_arb::broker::MemoryBroker;
use tri_arb::cache::{CacheWriter, MemoryPriceCache};
use tri_arb::config::Config;
use tri_arb::error::ArbError;
use tri_arb::feed::{relay_queue, Publisher, StreamIngestor, TungsteniteConnector};
use tri_arb::market::{ExchangeClient, InverseResolver, SymbolUniverse};
use tri_arb::metrics;
use tri_arb::utils::{shutdown_signal, stopped};

/// Streaming triangular arbitrage detector.
#[derive(Parser, Debug)]
#[command(name = "tri-arb")]
#[command(about = "Streams best bid/ask quotes and scans currency triangles for arbitrage")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// HTTP server port for health/metrics.
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Symbols per streaming connection.
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Precomputed path file to scan instead of enumerating.
    #[arg(long, global = true)]
    paths_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run ingestion, cache writer, detector and HTTP API (default).
    Run,

    /// Print the symbol universe and the selected stream symbols.
    Discover,

    /// Enumerate triangular paths and write the path file.
    EnumeratePaths {
        /// Output file.
        #[arg(long, default_value = "paths.csv")]
        out: PathBuf,
    },

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    let loaded = Config::load();

    // Initialize logging
    let (log_level, log_json) = match &loaded {
        Ok(c) => (c.rust_log.clone(), c.log_json),
        Err(_) => ("info".to_string(), false),
    };
    let verbose = args.verbose || loaded.as_ref().is_ok_and(|c| c.verbose);
    init_tracing(verbose, &log_level, log_json);

    // Handle subcommands
    if let Some(Command::CheckConfig) = args.command {
        return cmd_check_config(loaded, &args);
    }

    let config = apply_overrides(loaded.map_err(ArbError::from)?, &args)
        .validated()
        .map_err(|e| {
            error!("Failed to load configuration: {}", e);
            e
        })?;

    match args.command {
        Some(Command::Discover) => cmd_discover(&config).await,
        Some(Command::EnumeratePaths { ref out }) => cmd_enumerate_paths(&config, out).await,
        Some(Command::Run) | None => cmd_run(config).await,
        Some(Command::CheckConfig) => Ok(()),
    }
}

fn init_tracing(verbose: bool, log_level: &str, json: bool) {
    let filter = if verbose {
        EnvFilter::new("tri_arb=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn apply_overrides(mut config: Config, args: &Args) -> Config {
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(file) = &args.paths_file {
        config.paths_file = Some(file.display().to_string());
    }
    config
}

/// Check configuration validity.
fn cmd_check_config(loaded: Result<Config, envy::Error>, args: &Args) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("TRI-ARB - CONFIGURATION CHECK");
    println!("======================================================================");

    // Load configuration
    print!("Loading configuration... ");
    let config = match loaded {
        Ok(c) => {
            println!("OK");
            apply_overrides(c, args)
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    // Validate configuration
    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    // Check path file
    if let Some(file) = &config.paths_file {
        print!("Reading path file... ");
        match load_paths(Path::new(file)) {
            Ok(paths) => println!("OK ({} paths)", paths.len()),
            Err(e) => {
                println!("FAILED");
                println!("  Error: {}", e);
                return Err(anyhow::anyhow!("Path file invalid"));
            }
        }
    }

    // Show configuration summary
    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  REST URL: {}", config.exchange_rest_url);
    println!("  Stream URL: {}", config.exchange_ws_url);
    println!("  Symbols: {} lowest volume + [{}]", config.symbol_limit, config.extra_symbols);
    println!("  Chunk Size: {}", config.chunk_size);
    println!("  Relay: {} (capacity {})", config.relay_topic, config.relay_capacity);
    println!("  Cache TTL: {}ms", config.cache_ttl_ms);
    println!("  Poll Interval: {}ms", config.poll_interval_ms);
    println!("  Paths: {}", config.paths_file.as_deref().unwrap_or("enumerated at startup"));
    println!("  HTTP Port: {}", config.port);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Print the universe and the stream-symbol selection.
async fn cmd_discover(config: &Config) -> anyhow::Result<()> {
    let client = ExchangeClient::new(config)?;
    let universe = client.fetch_universe().await?;
    let symbols = client.stream_symbols(config.symbol_limit, &config.extra_symbols()).await?;

    println!("======================================================================");
    println!("TRI-ARB - SYMBOL DISCOVERY");
    println!("======================================================================");
    println!("  Currencies: {}", universe.currencies.len());
    println!("  Known pairs: {}", universe.pairs.len());
    println!("  Stream symbols: {}", symbols.len());
    println!("----------------------------------------------------------------------");
    println!("Currencies:");
    let currencies: Vec<String> = universe.sorted_currencies().iter().map(|c| c.to_string()).collect();
    for row in currencies.chunks(12) {
        println!("  {}", row.join(" "));
    }
    println!("----------------------------------------------------------------------");
    println!("Stream symbols (ascending quote volume):");

    let names: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();
    for row in names.chunks(10) {
        println!("  {}", row.join(" "));
    }
    println!("======================================================================");

    Ok(())
}

/// Enumerate paths from the live universe and save them.
async fn cmd_enumerate_paths(config: &Config, out: &Path) -> anyhow::Result<()> {
    let client = ExchangeClient::new(config)?;
    let universe = client.fetch_universe().await?;

    let paths = enumerate_paths(&universe.pairs, &universe.currencies);
    save_paths(out, &paths)?;

    println!("Wrote {} paths to {}", paths.len(), out.display());
    Ok(())
}

fn resolve_paths(config: &Config, universe: &SymbolUniverse) -> tri_arb::Result<SharedPaths> {
    let paths = match &config.paths_file {
        Some(file) => load_paths(Path::new(file))?,
        None => enumerate_paths(&universe.pairs, &universe.currencies),
    };

    if paths.is_empty() {
        warn!("No triangular paths to scan");
    }
    Ok(paths.into())
}

/// Run every pipeline stage in one process.
async fn cmd_run(config: Config) -> anyhow::Result<()> {
    let chunk_size = config
        .chunk_size()
        .ok_or_else(|| anyhow::anyhow!("CHUNK_SIZE must be at least 1"))?;

    // Initialize metrics
    let prometheus = PrometheusBuilder::new().install_recorder()?;
    metrics::init_metrics();

    // Bootstrap: universe, stream symbols, paths
    let client = ExchangeClient::new(&config)?;
    let universe = client.fetch_universe().await?;
    let symbols = client.stream_symbols(config.symbol_limit, &config.extra_symbols()).await?;
    let paths = resolve_paths(&config, &universe)?;

    info!(
        symbols = symbols.len(),
        chunks = symbols.len().div_ceil(chunk_size.get()),
        paths = paths.len(),
        "Bootstrap complete"
    );

    // Shared stop signal
    let (stop_tx, stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);
    {
        let stop_tx = stop_tx.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            let _ = stop_tx.send(true);
        });
    }

    // Start HTTP server
    let app_state = AppState::new(symbols.len(), paths.len()).with_prometheus(prometheus);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone());
    let server = tokio::spawn({
        let stop = stop_rx.clone();
        async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(stopped(stop))
                .await
        }
    });

    // Relay -> broker -> cache writer
    let (relay_tx, relay_rx) = relay_queue(config.relay_capacity);
    let (broker, consumer) = MemoryBroker::channel(&config.relay_topic);
    info!(topic = broker.topic(), capacity = config.relay_capacity, "Relay queue and broker ready");
    let publisher = tokio::spawn(Publisher::new(broker, config.relay_topic.clone()).run(relay_rx));

    let cache = Arc::new(MemoryPriceCache::new());
    let resolver = InverseResolver::new(Arc::new(universe.currencies));
    info!(currencies = resolver.currency_count(), ttl_ms = config.cache_ttl_ms, "Cache writer ready");
    let writer = CacheWriter::new(cache.clone(), resolver, config.cache_ttl());
    let writer_task = tokio::spawn(async move { writer.run(consumer).await });

    let janitor = tokio::spawn({
        let cache = cache.clone();
        let stop = stop_rx.clone();
        let every = config.cache_ttl();
        async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cache.purge_expired();
                    }
                    _ = stopped(stop.clone()) => break,
                }
            }
        }
    });

    // Detector
    let detector = ArbitrageDetector::new(cache, paths, config.poll_interval());
    let detector_task = tokio::spawn({
        let stop = stop_rx.clone();
        let state = app_state.clone();
        async move {
            detector
                .run(stop, |report| {
                    let state = state.clone();
                    async move { state.record_pass(&report).await }
                })
                .await
        }
    });

    // Ingestion runs in the foreground until stopped or a connection fails
    info!("Starting stream ingestion...");
    let ingestor = StreamIngestor::new(TungsteniteConnector, config.exchange_ws_url.clone(), relay_tx);
    let ingested = ingestor.run(&symbols, chunk_size, stop_rx).await;
    if let Err(e) = &ingested {
        error!(error = %e, "Stream ingestion failed, shutting down");
    }
    let _ = stop_tx.send(true);

    // Streams are joined; the publisher drains the relay, then the writer
    // drains the broker.
    let published = publisher.await?;
    let written = writer_task.await?;
    let passes = detector_task.await?;
    janitor.await?;
    if let Err(e) = server.await? {
        warn!(error = %e, "HTTP server error");
    }

    info!(
        published = published.as_ref().map(|r| r.published).unwrap_or_default(),
        cache_writes = written.writes,
        passes,
        "Shutdown complete"
    );

    ingested?;
    published?;
    Ok(())
}
