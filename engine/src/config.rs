//! Engine configuration.
//!
//! Everything here is supplied once at construction and immutable for the
//! engine's lifetime. The engine never reads ambient state (env vars, files);
//! whatever loads configuration hands a fully-built [`EngineConfig`] to
//! [`crate::SignalEngine::new`], which rejects invalid values immediately.

use std::time::Duration;

use rust_decimal::Decimal;

use crate::error::EngineError;
use crate::num::clamp01;
use crate::trigger::TriggerKind;

/// One rolling horizon: time bound plus a hard sample-count ceiling.
///
/// The capacity bound keeps memory constant regardless of event rate; the
/// duration bound is the staleness rule. Whichever fires first evicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub duration: Duration,
    pub capacity: usize,
}

impl WindowSpec {
    pub fn new(duration: Duration, capacity: usize) -> Result<Self, EngineError> {
        let spec = Self { duration, capacity };
        spec.validate()?;
        Ok(spec)
    }

    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        if self.duration.is_zero() {
            return Err(EngineError::Configuration(
                "window duration must be positive".into(),
            ));
        }
        if self.capacity == 0 {
            return Err(EngineError::Configuration(
                "window capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Shared confidence shape for all detectors:
/// `clamp((value - low) / (high - low), 0, 1)`.
///
/// `low` doubles as the trigger threshold, `high` as the saturation point.
/// `high > low` is enforced at construction, so `score` never divides by
/// zero. Fields stay private to protect that invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceBand {
    low: Decimal,
    high: Decimal,
}

impl ConfidenceBand {
    pub fn new(low: Decimal, high: Decimal) -> Result<Self, EngineError> {
        if high <= low {
            return Err(EngineError::Configuration(format!(
                "confidence band high ({high}) must exceed low ({low})"
            )));
        }
        Ok(Self { low, high })
    }

    /// Trigger threshold.
    pub fn low(&self) -> Decimal {
        self.low
    }

    /// Saturation point.
    pub fn high(&self) -> Decimal {
        self.high
    }

    /// Linear confidence over the band, clamped to `[0, 1]`.
    pub fn score(&self, value: Decimal) -> Decimal {
        clamp01((value - self.low) / (self.high - self.low))
    }
}

/// Price-deviation detector parameters.
///
/// `band.low` is the minimum absolute deviation ratio (e.g. `0.01` = 1%),
/// `band.high` the saturation deviation.
#[derive(Debug, Clone, Copy)]
pub struct DeviationConfig {
    /// Index into `EngineConfig::windows` for the reference horizon.
    pub reference_window: usize,
    pub band: ConfidenceBand,
}

/// Volume-spike detector parameters.
///
/// `band.low` is the minimum ratio of event volume to the reference window's
/// mean per-sample volume; `band.high` the saturation multiplier.
#[derive(Debug, Clone, Copy)]
pub struct VolumeSpikeConfig {
    /// Index into `EngineConfig::windows` for the reference horizon.
    pub reference_window: usize,
    pub band: ConfidenceBand,
}

/// Liquidation-cluster detector parameters.
///
/// The detector keeps its own small per-instrument window of liquidation
/// timestamps, independent of the VWAP horizons. `band.low` is the minimum
/// cluster size, `band.high` the saturation count.
#[derive(Debug, Clone, Copy)]
pub struct LiquidationConfig {
    pub lookback: Duration,
    /// Hard bound on retained liquidation timestamps per instrument.
    pub capacity: usize,
    pub band: ConfidenceBand,
}

/// Per-kind combination weights. Need not sum to 1; each must be positive.
#[derive(Debug, Clone, Copy)]
pub struct TriggerWeights {
    pub price_deviation: Decimal,
    pub volume_spike: Decimal,
    pub liquidation_cluster: Decimal,
}

impl TriggerWeights {
    pub fn for_kind(&self, kind: TriggerKind) -> Decimal {
        match kind {
            TriggerKind::PriceDeviation => self.price_deviation,
            TriggerKind::VolumeSpike => self.volume_spike,
            TriggerKind::LiquidationCluster => self.liquidation_cluster,
        }
    }

    fn validate(&self) -> Result<(), EngineError> {
        for (name, w) in [
            ("price_deviation", self.price_deviation),
            ("volume_spike", self.volume_spike),
            ("liquidation_cluster", self.liquidation_cluster),
        ] {
            if w <= Decimal::ZERO {
                return Err(EngineError::Configuration(format!(
                    "weight for {name} must be positive, got {w}"
                )));
            }
        }
        Ok(())
    }
}

/// Trigger combiner parameters.
#[derive(Debug, Clone, Copy)]
pub struct CombinerConfig {
    pub weights: TriggerWeights,
    /// Minimum combined confidence for a Decision to be emitted.
    pub emission_threshold: Decimal,
    /// Candidates within this span of a batch's first candidate are grouped.
    pub coalescing_interval: Duration,
    /// Minimum quiet time per instrument after an emitted Decision.
    pub cooldown: Duration,
}

/// Full, validated engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Rolling horizons, shared by all instruments. Snapshot order follows
    /// this order.
    pub windows: Vec<WindowSpec>,
    pub deviation: DeviationConfig,
    pub volume_spike: VolumeSpikeConfig,
    pub liquidation: LiquidationConfig,
    pub combiner: CombinerConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.windows.is_empty() {
            return Err(EngineError::Configuration(
                "at least one window must be configured".into(),
            ));
        }
        for spec in &self.windows {
            spec.validate()?;
        }
        for (name, idx) in [
            ("deviation", self.deviation.reference_window),
            ("volume_spike", self.volume_spike.reference_window),
        ] {
            if idx >= self.windows.len() {
                return Err(EngineError::Configuration(format!(
                    "{name} reference window index {idx} out of range ({} windows)",
                    self.windows.len()
                )));
            }
        }
        if self.liquidation.lookback.is_zero() {
            return Err(EngineError::Configuration(
                "liquidation lookback must be positive".into(),
            ));
        }
        if self.liquidation.capacity == 0 {
            return Err(EngineError::Configuration(
                "liquidation window capacity must be positive".into(),
            ));
        }
        self.combiner.weights.validate()?;
        let threshold = self.combiner.emission_threshold;
        if threshold < Decimal::ZERO || threshold > Decimal::ONE {
            return Err(EngineError::Configuration(format!(
                "emission threshold must be within [0, 1], got {threshold}"
            )));
        }
        if self.combiner.coalescing_interval.is_zero() {
            return Err(EngineError::Configuration(
                "coalescing interval must be positive".into(),
            ));
        }
        if self.combiner.cooldown.is_zero() {
            return Err(EngineError::Configuration(
                "cooldown must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Baseline fixture shared by unit tests across the crate.
#[cfg(test)]
pub(crate) fn test_config() -> EngineConfig {
    use rust_decimal_macros::dec;

    fn band(low: Decimal, high: Decimal) -> ConfidenceBand {
        ConfidenceBand::new(low, high).expect("valid band")
    }

    EngineConfig {
        windows: vec![
            WindowSpec::new(Duration::from_secs(60), 128).unwrap(),
            WindowSpec::new(Duration::from_secs(3600), 4096).unwrap(),
        ],
        deviation: DeviationConfig {
            reference_window: 0,
            band: band(dec!(0.01), dec!(0.05)),
        },
        volume_spike: VolumeSpikeConfig {
            reference_window: 0,
            band: band(dec!(3), dec!(10)),
        },
        liquidation: LiquidationConfig {
            lookback: Duration::from_secs(10),
            capacity: 64,
            band: band(dec!(3), dec!(6)),
        },
        combiner: CombinerConfig {
            weights: TriggerWeights {
                price_deviation: dec!(0.5),
                volume_spike: dec!(0.5),
                liquidation_cluster: dec!(1),
            },
            emission_threshold: dec!(0.6),
            coalescing_interval: Duration::from_secs(1),
            cooldown: Duration::from_secs(30),
        },
    }
}
