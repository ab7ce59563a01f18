//! Command-line entry point: loads a TOML config, validates it, and runs the
//! consumer with a SIGINT/SIGTERM-triggered graceful shutdown. Grounded on
//! the teacher's `abp-cli::main` (`clap`-derived `Cli`/`Commands`,
//! `tracing_subscriber::EnvFilter` toggled by `--debug`, `#[tokio::main]`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use erp_events_config::{config_json_schema, load_config, validate_config};
use erp_events_consumer::{Consumer, ConsumerState, SubscribeRequest};
use erp_events_middleware::{
    CorrelationHandler, CorrelationHeaders, Deserializer, DeserializerConfig, IdempotencyGuard,
    IdempotencyGuardConfig, Pipeline, SchemaValidator, SchemaValidatorConfig,
};
use erp_events_processor::{HandlerRegistry, Processor};
use erp_events_store::{InMemoryProcessedEventStore, PostgresProcessedEventStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const EXIT_RUNTIME_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "erp-events", version, about = "ERP event consumption runtime")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a TOML configuration file.
    ValidateConfig {
        /// Path to the configuration file.
        file: PathBuf,
    },

    /// Print the configuration JSON Schema to stdout.
    PrintSchema,

    /// Run the consumer against the broker configured in `file`.
    Run {
        /// Path to the configuration file.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("erp_events=debug")
    } else {
        EnvFilter::new("erp_events=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::ValidateConfig { file } => cmd_validate_config(&file),
        Commands::PrintSchema => cmd_print_schema(),
        Commands::Run { file } => cmd_run(&file).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(EXIT_RUNTIME_ERROR);
    }
}

fn cmd_validate_config(file: &std::path::Path) -> Result<()> {
    let config = load_config(file)?;
    match validate_config(&config) {
        Ok(()) => {
            println!("valid");
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                eprintln!("error: {error}");
            }
            anyhow::bail!("{} configuration error(s)", errors.len());
        }
    }
}

fn cmd_print_schema() -> Result<()> {
    let schema = config_json_schema()?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

async fn cmd_run(file: &std::path::Path) -> Result<()> {
    let config = load_config(file)?;
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "invalid configuration");
        }
        anyhow::bail!("{} configuration error(s)", errors.len());
    }

    let connection_config = erp_events_consumer::ConnectionConfig {
        hostname: config.connection.hostname.clone(),
        port: config.connection.port,
        user: config.connection.user.clone(),
        password: config.connection.password.clone(),
        vhost: config.connection.vhost.clone(),
        heartbeat_secs: config.connection.heartbeat,
        timeout_ms: config.connection.timeout,
        connection_name: config.connection.connection_name.clone(),
        explicit_url: config.connection.explicit_url.clone().or(config.connection.url.clone()),
        prefetch: config.consumer.prefetch,
        max_reconnect_attempts: 10,
        reconnect_initial_delay_ms: 1_000,
        reconnect_max_delay_ms: 30_000,
        shutdown_timeout_ms: config.shutdown_timeout_ms,
    };

    let topology = erp_events_consumer::TopologyConfig {
        exchanges: config.exchanges.clone(),
        queues: config.queues.clone(),
        bindings: config.bindings.clone(),
    };

    let store: Arc<dyn erp_events_store::ProcessedEventStore> = if config.idempotency.enabled
        && !config.idempotency.connection_string.is_empty()
    {
        let pool = sqlx::PgPool::connect(&config.idempotency.connection_string)
            .await
            .context("connect to idempotency store")?;
        Arc::new(PostgresProcessedEventStore::new(pool))
    } else {
        Arc::new(InMemoryProcessedEventStore::new())
    };

    let schema_registry = Arc::new(
        config
            .schema_validator
            .schemas_dir
            .as_ref()
            .map(|dir| erp_events_schema::SchemaRegistry::new(Some(PathBuf::from(dir))))
            .unwrap_or_else(erp_events_schema::SchemaRegistry::in_memory),
    );

    let pipeline = Pipeline::new()
        .stage(Deserializer::new(DeserializerConfig::default()))
        .stage(CorrelationHandler::new(CorrelationHeaders::default()))
        .stage(SchemaValidator::new(
            schema_registry,
            SchemaValidatorConfig {
                enabled: config.schema_validator.enabled,
                throw_on_error: config.schema_validator.throw_on_error,
                validate_envelope: config.schema_validator.validate_envelope,
                validate_payload: config.schema_validator.validate_payload,
            },
        ))
        .stage(IdempotencyGuard::new(
            store,
            IdempotencyGuardConfig {
                consumer_name: config.consumer.consumer_name.clone(),
                cache_capacity: 1000,
                prune_interval_seconds: 3600,
                prune_older_than_seconds: config.idempotency.ttl_seconds as i64,
            },
        ));

    // Application handlers are registered by the embedding binary; this CLI
    // runs with no registered handlers, acking every delivery with a warning
    // per the "missing handler" policy.
    let registry = HandlerRegistry::new();
    let processor = Arc::new(Processor::new(pipeline, registry));

    let consumer = Arc::new(Consumer::new(
        connection_config,
        topology.clone(),
        config.retry.clone(),
        processor,
    ));

    consumer.connect().await.context("connect to broker")?;

    let mut consumer_tags = Vec::new();
    let mut streams = Vec::new();
    for queue in &topology.queues {
        let stream = consumer
            .subscribe(SubscribeRequest {
                queue: queue.name.clone(),
                consumer_tag: Some(format!("{}-{}", config.consumer.consumer_name, queue.name)),
                exclusive: false,
                args: None,
            })
            .await
            .with_context(|| format!("subscribe to queue '{}'", queue.name))?;
        consumer_tags.push(format!("{}-{}", config.consumer.consumer_name, queue.name));
        streams.push(stream);
    }

    tracing::info!(queues = topology.queues.len(), "consumer started");

    let run_handles: Vec<_> = streams
        .into_iter()
        .map(|stream| {
            let consumer = Arc::clone(&consumer);
            tokio::spawn(async move { consumer.run(stream).await })
        })
        .collect();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT, shutting down");
        }
        _ = terminate_signal() => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }

    let shutdown_result = consumer.shutdown(&consumer_tags).await;
    for handle in run_handles {
        let _ = handle.await;
    }

    debug_assert!(matches!(consumer.state(), ConsumerState::Closed));
    shutdown_result.context("graceful shutdown")
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    term.recv().await;
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}
