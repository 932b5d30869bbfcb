//! Log Distributor — weighted fan-out with bounded retry and a persistent
//! in-memory retry queue, sitting between log emitters and backend sinks.
//!
//! ## Configuration
//!
//! Configuration is loaded from a JSON file whose path is the first CLI
//! argument, falling back to `local_config.json`:
//!
//! ```text
//! log-distributor [CONFIG_PATH]
//! ```
//!
//! See [`log_distributor::config::Config`] for the schema.
//!
//! ## Logging
//!
//! `RUST_LOG` controls verbosity (default `info`), same as the rest of this
//! project's services.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use log_distributor::config::Config;
use log_distributor::dispatcher::Dispatcher;
use log_distributor::queue::{spawn_worker, RetryQueue};
use log_distributor::server::{build_router, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let argv: Vec<String> = std::env::args().collect();
    if matches!(argv.get(1).map(String::as_str), Some("-h") | Some("--help")) {
        print_usage();
        return ExitCode::SUCCESS;
    }
    let config_path = Config::path_from_args(argv.into_iter());

    info!("Starting Log Distributor service...");

    let config = match Config::from_file(&config_path) {
        Ok(config) => {
            info!(
                config_path = %config_path,
                port = config.port,
                sinks = config.sinks.len(),
                total_weight = config.total_weight,
                fan_out_concurrency = config.fan_out_concurrency,
                "configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, config_path = %config_path, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let dispatcher = match Dispatcher::new() {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(e) => {
            error!(error = %e, "failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };

    let sinks = Arc::new(config.sinks.clone());
    let retry_queue = Arc::new(RetryQueue::new());
    let fan_out_semaphore = Arc::new(Semaphore::new(config.fan_out_concurrency));
    let queue_cycle_interval = config.queue_cycle_interval;
    let port = config.port;

    let state = Arc::new(AppState {
        config: Arc::new(config),
        sinks: Arc::clone(&sinks),
        dispatcher: Arc::clone(&dispatcher),
        retry_queue: Arc::clone(&retry_queue),
        fan_out_semaphore,
    });

    // Background retry-queue worker: sleeps, then re-dispatches queued
    // messages against untried sinks, forever (§4.E).
    let _queue_worker = spawn_worker(retry_queue, sinks, dispatcher, queue_cycle_interval);

    let app = build_router(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, bind_addr = %bind_addr, "failed to bind listening socket");
            return ExitCode::FAILURE;
        }
    };

    info!(bind_addr = %bind_addr, "Log Distributor listening");

    // No graceful-shutdown drain: a ctrl_c listener lets the operator exit
    // the process cleanly, but in-flight dispatch and queued messages are
    // not drained first — that is explicitly out of scope for the core.
    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!(error = %e, "server exited with error");
                return ExitCode::FAILURE;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, exiting");
        }
    }

    ExitCode::SUCCESS
}

fn print_usage() {
    println!("log-distributor [CONFIG_PATH]");
    println!();
    println!("  CONFIG_PATH   Path to a JSON config file (default: local_config.json)");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();
}
