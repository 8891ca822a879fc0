use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use cache::{Cache, Clock, MemoryCache, SystemClock};
use config::AppConfig;
use read_model::MetroDataService;
use wmata::WmataClient;

mod api;
mod cache;
mod cli;
mod config;
mod dal;
mod error;
mod model;
mod read_model;
mod sync;
mod utils;
mod wmata;

#[derive(Parser)]
#[command(name = "wmata_metro", about = "WMATA Metro data sync and API service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API server
    Serve,
    /// Sync lines, stations and paths from the WMATA API
    Sync {
        /// Check cache integrity before syncing
        #[arg(long)]
        validate: bool,
    },
    /// Fetch lines once and report hourly request usage
    TestConnection,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    _ = dotenv();
    let args = Cli::parse();

    let _log_guard = init_telemetry()?;

    let config = AppConfig::from_env()?;

    let pool = sqlx::PgPool::connect(&config.database_url)
        .await
        .context("couldn't connect to the database")?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new(clock.clone()));
    let client = Arc::new(WmataClient::new(&config.wmata, cache.clone(), clock)?);
    let service = Arc::new(MetroDataService::new(pool, client.clone(), cache));

    match args.command {
        Command::Serve => api::serve(service, &config).await,
        Command::Sync { validate } => cli::run_sync(&service, validate).await,
        Command::TestConnection => cli::run_test_connection(&client).await,
    }
}

fn init_telemetry() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(
            SpanExporter::builder()
                .with_tonic()
                .with_timeout(Duration::from_millis(1000))
                .with_endpoint(
                    dotenvy::var("OTLP_ENDPOINT").unwrap_or("http://localhost:4317".to_string()),
                )
                .with_protocol(opentelemetry_otlp::Protocol::Grpc)
                .build()?,
        )
        .with_resource(
            Resource::builder_empty()
                .with_attributes(vec![KeyValue::new("service.name", "wmata_metro")])
                .build(),
        )
        .build();

    let tracer = provider.tracer("wmata_metro");

    let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let appender = tracing_appender::rolling::daily("./logs", "wmata_metro.log");
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(appender);

    // A layer that logs events to rolling files.
    let file_log = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_appender)
        .with_ansi(false)
        .pretty();

    Registry::default()
        .with(telemetry_layer)
        .with(file_log)
        .with(env_filter)
        .init();

    Ok(guard)
}
