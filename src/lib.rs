//! Log Distributor
//!
//! A weighted, fault-tolerant fan-out distributor sitting between log
//! emitters and a set of backend sink analyzers:
//!
//! - **message**: wire data model shared with emitters and sinks
//! - **config**: JSON config file loading and validation
//! - **selector**: weighted-random sink selection
//! - **dispatcher**: per-message dispatch with in-line retry and backoff
//! - **queue**: the retry queue and its background re-dispatch worker
//! - **scheduler**: bounded-concurrency fan-out of a packet's messages
//! - **server**: the `/logs`, `/health`, and `/queue` HTTP endpoints
//!
//! # Example
//!
//! ```no_run
//! use log_distributor::config::Config;
//! use log_distributor::dispatcher::Dispatcher;
//! use log_distributor::queue::RetryQueue;
//! use log_distributor::server::{build_router, AppState};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_file("local_config.json").expect("failed to load config");
//!     let state = Arc::new(AppState {
//!         sinks: Arc::new(config.sinks.clone()),
//!         dispatcher: Arc::new(Dispatcher::new().expect("failed to build dispatcher")),
//!         retry_queue: Arc::new(RetryQueue::new()),
//!         fan_out_semaphore: Arc::new(tokio::sync::Semaphore::new(config.fan_out_concurrency)),
//!         config: Arc::new(config),
//!     });
//!
//!     let app = build_router(state);
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod health_probe;
pub mod message;
pub mod queue;
pub mod scheduler;
pub mod selector;
pub mod server;

pub use config::{Config, ConfigError, SinkDescriptor};
pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher, DispatchStatsSnapshot};
pub use message::{LogLevel, LogMessage, LogPacket};
pub use queue::{QueuedMessage, RetryQueue};
pub use server::{build_router, AppState};
