//! Liquidation-cluster trigger.
//!
//! Unlike the other two detectors this one is stateful: it keeps a small
//! per-instrument window of liquidation timestamps (bounded by both the
//! lookback duration and a hard capacity, independent of the VWAP horizons)
//! and fires once the in-lookback count reaches the configured minimum
//! cluster size.

use std::collections::{HashMap, VecDeque};

use market::types::{Instrument, NormalizedEvent};
use rust_decimal::Decimal;

use super::{CandidateSignal, TriggerKind};
use crate::config::LiquidationConfig;
use crate::num::micros;

#[derive(Debug)]
pub struct LiquidationClusterDetector {
    cfg: LiquidationConfig,
    /// Liquidation timestamps per instrument, oldest first.
    windows: HashMap<Instrument, VecDeque<i64>>,
}

impl LiquidationClusterDetector {
    pub fn new(cfg: LiquidationConfig) -> Self {
        Self {
            cfg,
            windows: HashMap::new(),
        }
    }

    /// Record one liquidation event and evaluate the cluster.
    pub fn on_liquidation(&mut self, event: &NormalizedEvent) -> Option<CandidateSignal> {
        let window = self.windows.entry(event.instrument.clone()).or_default();

        if window.len() >= self.cfg.capacity {
            window.pop_front();
        }
        window.push_back(event.ts_us);

        let cutoff = event.ts_us - micros(self.cfg.lookback);
        while window.front().is_some_and(|ts| *ts < cutoff) {
            window.pop_front();
        }

        let count = Decimal::from(window.len());
        if count < self.cfg.band.low() {
            return None;
        }

        Some(CandidateSignal {
            kind: TriggerKind::LiquidationCluster,
            instrument: event.instrument.clone(),
            confidence: self.cfg.band.score(count),
            metric: count,
            ts_us: event.ts_us,
        })
    }

    /// Teardown hook for instruments no longer traded.
    pub fn remove_instrument(&mut self, instrument: &Instrument) {
        self.windows.remove(instrument);
    }
}
