//! Optional, off-by-default active health probing of sinks.
//!
//! The project's original dispatcher carried a commented-out
//! `isAnalyzerHealthy` stub that would call `GET /health` on each sink
//! before selection. This module is that stub's faithful, compiling
//! equivalent — kept isolated so the core selection semantics (select over
//! *all* configured sinks, reroute via the retry queue on failure) remain
//! the default path. Nothing in `scheduler` or `queue` calls this today;
//! wiring it in is a config-flag decision left to a deployment, not the
//! core.

use std::time::Duration;

use reqwest::Client;

use crate::config::SinkDescriptor;

/// Probe a single sink's `/health` endpoint with a short timeout.
///
/// Returns `true` only on a `200 OK` response within `timeout`; any
/// transport error, timeout, or non-200 status is treated as unhealthy.
pub async fn is_sink_healthy(client: &Client, sink: &SinkDescriptor, timeout: Duration) -> bool {
    let url = format!("{}/health", sink.endpoint.trim_end_matches('/'));
    match client.get(&url).timeout(timeout).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

/// Filter `sinks` down to those that currently report healthy.
///
/// Not called by default selection path (§9 design note); a deployment
/// that wants active probing ahead of selection would call this before
/// `select_weighted` and fall back to the full set if it returns empty.
pub async fn healthy_sinks<'a>(
    client: &Client,
    sinks: &'a [SinkDescriptor],
    timeout: Duration,
) -> Vec<&'a SinkDescriptor> {
    let mut healthy = Vec::with_capacity(sinks.len());
    for sink in sinks {
        if is_sink_healthy(client, sink, timeout).await {
            healthy.push(sink);
        }
    }
    healthy
}
