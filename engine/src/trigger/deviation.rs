//! Price-deviation trigger.
//!
//! Fires when the event price strays from the reference horizon's VWAP by at
//! least the configured threshold ratio. Pure function of
//! (event, snapshot, config); direction survives in the signed metric.

use market::types::NormalizedEvent;

use super::{CandidateSignal, TriggerKind};
use crate::config::DeviationConfig;
use crate::rolling_window::VwapSnapshot;

/// Evaluate one event against the reference VWAP.
///
/// Returns `None` while the window has no VWAP yet (zero accumulated
/// volume): a warm-up guard, not an error.
pub fn price_deviation(
    event: &NormalizedEvent,
    reference: &VwapSnapshot,
    cfg: &DeviationConfig,
) -> Option<CandidateSignal> {
    let vwap = reference.vwap?;
    if vwap.is_zero() {
        return None;
    }

    let deviation = (event.price - vwap) / vwap;
    if deviation.abs() < cfg.band.low() {
        return None;
    }

    Some(CandidateSignal {
        kind: TriggerKind::PriceDeviation,
        instrument: event.instrument.clone(),
        confidence: cfg.band.score(deviation.abs()),
        metric: deviation,
        ts_us: event.ts_us,
    })
}
