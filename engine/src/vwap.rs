//! Multi-horizon VWAP aggregation.
//!
//! One [`VwapEngine`] owns, per instrument, one [`WindowState`] per
//! configured horizon. Instruments are created lazily on their first event.
//!
//! All horizons for an instrument share the same event stream, so they agree
//! on the last-seen timestamp. The ordering check therefore either admits an
//! event into every window or rejects it from every window; a partial update
//! cannot happen.

use std::collections::HashMap;

use market::types::{EventKind, Instrument, NormalizedEvent};

use crate::config::WindowSpec;
use crate::error::EngineError;
use crate::rolling_window::{VwapSnapshot, WindowState};

#[derive(Debug)]
pub struct VwapEngine {
    specs: Vec<WindowSpec>,
    states: HashMap<Instrument, Vec<WindowState>>,
}

impl VwapEngine {
    pub fn new(specs: Vec<WindowSpec>) -> Self {
        Self {
            specs,
            states: HashMap::new(),
        }
    }

    /// Fold one event into every horizon for its instrument.
    ///
    /// Trades are admitted as samples; quotes and liquidations only advance
    /// each window's eviction boundary.
    pub fn process(&mut self, event: &NormalizedEvent) -> Result<(), EngineError> {
        let windows = self
            .states
            .entry(event.instrument.clone())
            .or_insert_with(|| self.specs.iter().map(|s| WindowState::new(*s)).collect());

        for window in windows.iter_mut() {
            let result = match event.kind {
                EventKind::Trade => window.update(event.ts_us, event.price, event.volume),
                EventKind::Quote | EventKind::Liquidation => window.observe(event.ts_us),
            };
            result.map_err(|e| EngineError::OutOfOrderEvent {
                instrument: event.instrument.clone(),
                last_ts_us: e.last_ts_us,
                event_ts_us: event.ts_us,
            })?;
        }
        Ok(())
    }

    /// Snapshots for every horizon, in configuration order.
    pub fn snapshots_for(&self, instrument: &Instrument) -> Result<Vec<VwapSnapshot>, EngineError> {
        self.states
            .get(instrument)
            .map(|windows| windows.iter().map(WindowState::snapshot).collect())
            .ok_or_else(|| EngineError::UnknownInstrument(instrument.clone()))
    }

    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.states.keys()
    }

    /// Teardown hook for instruments no longer traded.
    pub fn remove_instrument(&mut self, instrument: &Instrument) {
        self.states.remove(instrument);
    }
}
