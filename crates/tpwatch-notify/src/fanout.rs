//! Fan-out delivery to several sinks.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::warn;

use tpwatch_feed::BoxFuture;
use tpwatch_position::{EventSink, PositionEvent, SinkError};
use tpwatch_telemetry::Metrics;

/// Delivers every event to all inner sinks concurrently.
///
/// A failing sink does not stop delivery to the others. Each failure is
/// counted under the inner sink's name; the combined result is an error
/// naming every sink that failed.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }
}

impl EventSink for FanoutSink {
    fn name(&self) -> &str {
        "fanout"
    }

    fn publish<'a>(&'a self, event: &'a PositionEvent) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(async move {
            let results = join_all(self.sinks.iter().map(|sink| sink.publish(event))).await;

            let failures: Vec<String> = results
                .into_iter()
                .filter_map(Result::err)
                .map(|e| {
                    warn!(sink = %e.sink, error = %e.message, "Sink delivery failed");
                    Metrics::sink_failure(&e.sink);
                    e.to_string()
                })
                .collect();

            if failures.is_empty() {
                Ok(())
            } else {
                Err(SinkError::new(self.name(), failures.join("; ")))
            }
        })
    }
}
