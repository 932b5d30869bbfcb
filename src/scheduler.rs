//! Fan-out scheduler (§4.B): dispatches every message from one packet
//! concurrently, subject to a process-wide concurrency cap.
//!
//! The cap is a [`tokio::sync::Semaphore`] of fixed capacity; acquiring a
//! permit before dispatch and releasing it on every exit path (success,
//! terminal failure, or enqueue) is handled automatically by RAII — the
//! permit simply goes out of scope when the per-message task completes.

use std::sync::Arc;

use tracing::info;

use crate::dispatcher::DispatchOutcome;
use crate::message::LogMessage;
use crate::server::AppState;
use crate::selector::select_weighted;

/// Dispatch every message in `messages` concurrently, bounded by
/// `state.fan_out_semaphore`. Returns once every message has either
/// succeeded, been classified terminal, or been enqueued.
///
/// No ordering guarantee is made across messages; ordering within a single
/// message's own retry sequence remains total (enforced by the dispatcher).
pub async fn fan_out(messages: Vec<LogMessage>, state: Arc<AppState>) {
    if messages.is_empty() {
        return;
    }

    let mut tasks = Vec::with_capacity(messages.len());
    for message in messages {
        let state = Arc::clone(&state);
        tasks.push(tokio::spawn(async move {
            dispatch_one(message, state).await;
        }));
    }

    for task in tasks {
        // A panicking dispatch task should not take down the scheduler;
        // log and move on rather than propagating the join error.
        if let Err(e) = task.await {
            tracing::error!(error = %e, "dispatch task panicked");
        }
    }
}

async fn dispatch_one(message: LogMessage, state: Arc<AppState>) {
    let _permit = state
        .fan_out_semaphore
        .acquire()
        .await
        .expect("semaphore is never closed");

    let candidates: Vec<&_> = state.sinks.iter().collect();
    let Some(sink) = select_weighted(&candidates) else {
        // Unreachable in practice: config validation guarantees at least
        // one sink with positive weight, so the initial candidate set is
        // never empty.
        tracing::error!(message_id = %message.id, "no sinks configured for initial dispatch");
        return;
    };

    let message_id = message.id.clone();
    let sink_id = sink.id.clone();

    match state
        .dispatcher
        .dispatch_with_retry(message, sink, &state.retry_queue)
        .await
    {
        DispatchOutcome::Success => {
            info!(message_id = %message_id, sink_id = %sink_id, "delivered");
        }
        DispatchOutcome::Terminal(_) => {
            // Logged by the dispatcher itself; nothing further to do.
        }
        DispatchOutcome::Exhausted(_) => {
            // Already enqueued by the dispatcher; nothing further to do.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SinkDescriptor};
    use crate::dispatcher::Dispatcher;
    use crate::message::LogLevel;
    use crate::queue::RetryQueue;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    fn test_state(sinks: Vec<SinkDescriptor>, cap: usize) -> Arc<AppState> {
        Arc::new(AppState {
            sinks: Arc::new(sinks),
            dispatcher: Arc::new(Dispatcher::new().unwrap()),
            retry_queue: Arc::new(RetryQueue::new()),
            fan_out_semaphore: Arc::new(Semaphore::new(cap)),
            config: Arc::new(Config {
                port: 0,
                sinks: vec![],
                total_weight: 1.0,
                fan_out_concurrency: cap,
                queue_cycle_interval: Duration::from_secs(2),
            }),
        })
    }

    fn message(id: &str) -> LogMessage {
        LogMessage {
            id: id.to_string(),
            timestamp: chrono::Utc::now(),
            level: LogLevel::Info,
            source: "test".to_string(),
            message: "body".to_string(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let state = test_state(
            vec![SinkDescriptor {
                id: "a".to_string(),
                weight: 1.0,
                endpoint: "http://127.0.0.1:1/unreachable".to_string(),
                timeout: Duration::from_millis(50),
                retry_count: 0,
            }],
            2,
        );
        fan_out(vec![], state).await;
    }

    #[tokio::test]
    async fn unreachable_sink_enqueues_message_after_exhausting_retries() {
        let state = test_state(
            vec![SinkDescriptor {
                id: "a".to_string(),
                weight: 1.0,
                endpoint: "http://127.0.0.1:1/unreachable".to_string(),
                timeout: Duration::from_millis(50),
                retry_count: 0,
            }],
            2,
        );

        fan_out(vec![message("m-1")], Arc::clone(&state)).await;

        let snapshot = state.retry_queue.snapshot().await;
        assert_eq!(snapshot.queue_size, 1);
    }
}
