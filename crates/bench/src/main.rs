//! Benchmark server entry point.
//!
//! Loads configuration, sets up logging, connects the storage backend,
//! loads the world cache and serves until a termination signal arrives.

mod cli;
mod config;
mod signals;

use std::error::Error;
use std::sync::Arc;

use bench_server::{create_server, Backend, MemoryBackend};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::CliArgs;
use crate::config::{AppConfig, DatabaseSettings, LoggingSettings};
use crate::signals::shutdown_signal;

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
fn setup_logging(config: &LoggingSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .init();
    }

    info!("🔧 Logging initialized with level: {}", config.level);
}

/// Reads the configuration file and applies command-line overrides.
async fn load_config(args: &CliArgs) -> Result<AppConfig, Box<dyn Error>> {
    let mut config = AppConfig::load_from_file(&args.config_path).await?;

    if let Some(bind_address) = &args.bind_address {
        config.server.bind_address = bind_address.clone();
    }
    if let Some(log_level) = &args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    if let Some(backend) = &args.backend {
        config.database.backend = backend.clone();
    }

    config
        .validate()
        .map_err(|e| format!("Configuration validation failed: {e}"))?;
    Ok(config)
}

async fn connect_backend(
    settings: &DatabaseSettings,
    world_count: usize,
) -> Result<Arc<dyn Backend>, Box<dyn Error>> {
    match settings.backend.as_str() {
        "memory" => {
            info!("🧮 Using in-memory tables with {} worlds", world_count);
            Ok(Arc::new(MemoryBackend::new(world_count)))
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let backend =
                bench_server::PgBackend::connect(&settings.url, settings.connections).await?;
            Ok(Arc::new(backend))
        }
        other => Err(format!("Backend '{other}' is not available in this build").into()),
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn Error>> {
    info!("📋 Configuration Summary:");
    info!("  🌐 Bind address: {}", config.server.bind_address);
    info!("  🗃️ Backend: {}", config.database.backend);
    info!(
        "  🌍 Worlds: {} | cache: {} | max queries: {}",
        config.workload.world_count, config.workload.cache_size, config.workload.max_queries
    );

    let server_config = config.to_server_config()?;
    let backend = connect_backend(&config.database, server_config.world_count).await?;

    // A cache that cannot be loaded in full stops startup here.
    let server = Arc::new(create_server(server_config, backend).await?);
    let listeners = server.bind_listeners()?;

    let mut server_task = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.serve(listeners).await }
    });

    info!("🛑 Press Ctrl+C to gracefully shutdown");

    tokio::select! {
        finished = &mut server_task => {
            finished??;
            return Ok(());
        }
        signal = shutdown_signal() => {
            info!("📡 Received {}", signal?);
        }
    }

    info!("🛑 Shutdown signal received, initiating graceful shutdown...");
    server.shutdown();
    server_task.await??;

    let pools = server.handlers().pools();
    info!(
        "📊 Encoder pool: {} created, {} reused",
        pools.encoder.stats().created,
        pools.encoder.stats().reused
    );
    info!("✅ Benchmark server shutdown complete");
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = CliArgs::parse();

    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to start application: {e}");
            std::process::exit(1);
        }
    };

    setup_logging(&config.logging);

    if let Err(e) = run(config).await {
        error!("❌ Application error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
