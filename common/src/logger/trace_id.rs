use std::fmt;

use tracing::{Level, Span};
use uuid::Uuid;

/// Correlation ID attached to one event stream / dispatcher run.
#[derive(Clone, Debug)]
pub struct TraceId(Uuid);

impl Default for TraceId {
    fn default() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.as_hyphenated().fmt(f)
    }
}

/// Root span for one event-stream processing loop.
pub fn stream_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::span!(Level::INFO, "stream", task = name, trace_id = %trace_id)
}
