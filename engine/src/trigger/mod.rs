//! Trigger detectors.
//!
//! Each detector consumes the incoming event plus the relevant VWAP
//! snapshot(s) and emits at most one [`CandidateSignal`]. Confidence always
//! comes from the shared [`crate::config::ConfidenceBand`] shape, so every
//! detector scales linearly from 0 at its threshold to 1 at saturation.
//! Candidates are ephemeral: the combiner consumes them immediately.

pub mod deviation;
pub mod liquidation;
pub mod volume;

pub use deviation::price_deviation;
pub use liquidation::LiquidationClusterDetector;
pub use volume::volume_spike;

use market::types::Instrument;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    PriceDeviation,
    VolumeSpike,
    LiquidationCluster,
}

/// Every detector kind the combiner waits on before closing a batch early.
pub const ALL_KINDS: [TriggerKind; 3] = [
    TriggerKind::PriceDeviation,
    TriggerKind::VolumeSpike,
    TriggerKind::LiquidationCluster,
];

/// One detector's proposed trigger, pre-combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSignal {
    pub kind: TriggerKind,
    pub instrument: Instrument,
    /// In `[0, 1]`, from the detector's confidence band.
    pub confidence: Decimal,
    /// The metric that produced the candidate: signed deviation ratio,
    /// volume ratio, or liquidation count.
    pub metric: Decimal,
    pub ts_us: i64,
}
