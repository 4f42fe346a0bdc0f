//! Event dispatch loop.
//!
//! Bridges an async event source (anything feeding the mpsc channel, usually
//! a [`market::provider::MarketDataProvider`]) to the synchronous
//! [`SignalEngine`] and forwards emitted decisions to a handler callback.

use std::sync::Arc;

use market::types::NormalizedEvent;
use tokio::sync::mpsc::Receiver;
use tracing::{error, warn};

use crate::combiner::Decision;
use crate::engine::SignalEngine;
use crate::error::EngineError;

/// A callback type for reacting to decisions.
pub type DecisionHandler = Arc<dyn Fn(Decision) + Send + Sync>;

pub struct Dispatcher {
    engine: SignalEngine,
    rx: Receiver<NormalizedEvent>,
    handler: DecisionHandler,
}

impl Dispatcher {
    pub fn new(engine: SignalEngine, rx: Receiver<NormalizedEvent>, handler: DecisionHandler) -> Self {
        Self {
            engine,
            rx,
            handler,
        }
    }

    /// Main loop: consumes events until the channel closes and forwards
    /// decisions to the handler.
    ///
    /// Out-of-order events are logged and skipped; the stream keeps flowing.
    /// Returns the engine so callers can inspect or reuse its state.
    pub async fn run(mut self) -> SignalEngine {
        while let Some(event) = self.rx.recv().await {
            match self.engine.process(&event) {
                Ok(Some(decision)) => (self.handler)(decision),
                Ok(None) => {}
                Err(EngineError::OutOfOrderEvent {
                    instrument,
                    last_ts_us,
                    event_ts_us,
                }) => {
                    warn!(
                        %instrument,
                        last_ts_us,
                        event_ts_us,
                        "dropping out-of-order event"
                    );
                }
                Err(e) => error!(error = %e, "event processing failed"),
            }
        }
        self.engine
    }
}
