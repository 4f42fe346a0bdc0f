//! Signal engine.
//!
//! Ties the pipeline together: every normalized event flows through the VWAP
//! layer first (so reference snapshots already include it), then through the
//! detectors, and the resulting candidates into the combiner. One event in,
//! at most one [`Decision`] out.

use market::types::{EventKind, Instrument, NormalizedEvent};
use tracing::{debug, info};

use crate::combiner::{Decision, TriggerCombiner};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::num::to_bps;
use crate::rolling_window::VwapSnapshot;
use crate::trigger::{CandidateSignal, LiquidationClusterDetector, price_deviation, volume_spike};
use crate::vwap::VwapEngine;

pub struct SignalEngine {
    config: EngineConfig,
    vwap: VwapEngine,
    liquidations: LiquidationClusterDetector,
    combiner: TriggerCombiner,
}

impl SignalEngine {
    /// Build an engine from a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            vwap: VwapEngine::new(config.windows.clone()),
            liquidations: LiquidationClusterDetector::new(config.liquidation),
            combiner: TriggerCombiner::new(config.combiner),
            config,
        })
    }

    /// Process one event end to end.
    ///
    /// Out-of-order events fail with [`EngineError::OutOfOrderEvent`] before
    /// any detector runs; the caller decides whether that is fatal (the
    /// dispatcher logs and keeps going).
    pub fn process(&mut self, event: &NormalizedEvent) -> Result<Option<Decision>, EngineError> {
        self.vwap.process(event)?;
        let snapshots = self.vwap.snapshots_for(&event.instrument)?;

        // Every event kind carries a price, so all of them face the
        // deviation detector. Quotes carry no volume; liquidations do, and
        // additionally feed the cluster detector.
        let mut candidates: Vec<CandidateSignal> = Vec::new();
        let dev_ref = &snapshots[self.config.deviation.reference_window];
        candidates.extend(price_deviation(event, dev_ref, &self.config.deviation));

        if matches!(event.kind, EventKind::Trade | EventKind::Liquidation) {
            let vol_ref = &snapshots[self.config.volume_spike.reference_window];
            candidates.extend(volume_spike(event, vol_ref, &self.config.volume_spike));
        }
        if event.kind == EventKind::Liquidation {
            candidates.extend(self.liquidations.on_liquidation(event));
        }

        for candidate in &candidates {
            debug!(
                instrument = %candidate.instrument,
                kind = ?candidate.kind,
                confidence = %candidate.confidence,
                metric_bps = %to_bps(candidate.metric),
                "trigger candidate"
            );
        }

        let decision = self
            .combiner
            .observe(&event.instrument, event.ts_us, candidates);
        if let Some(d) = &decision {
            info!(
                instrument = %d.instrument,
                confidence = %d.confidence,
                contributing = d.contributing.len(),
                cooldown_until_us = d.cooldown_until_us,
                "trigger decision emitted"
            );
        }
        Ok(decision)
    }

    /// Current VWAP snapshots for an instrument, one per horizon.
    pub fn snapshots_for(&self, instrument: &Instrument) -> Result<Vec<VwapSnapshot>, EngineError> {
        self.vwap.snapshots_for(instrument)
    }

    /// Most recent emitted decision for an instrument, if any.
    pub fn last_decision(&self, instrument: &Instrument) -> Option<&Decision> {
        self.combiner.last_decision(instrument)
    }

    /// Drop all per-instrument state (windows, liquidation history,
    /// combiner batches and cooldowns) for an instrument no longer traded.
    pub fn remove_instrument(&mut self, instrument: &Instrument) {
        self.vwap.remove_instrument(instrument);
        self.liquidations.remove_instrument(instrument);
        self.combiner.remove_instrument(instrument);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const SEC: i64 = 1_000_000;

    fn btc() -> Instrument {
        Instrument::new("BTC-USD")
    }

    fn trade(price: Decimal, volume: Decimal, ts_us: i64) -> NormalizedEvent {
        NormalizedEvent::trade(btc(), price, volume, None, ts_us).unwrap()
    }

    fn liq(ts_us: i64) -> NormalizedEvent {
        NormalizedEvent::liquidation(btc(), dec!(100), dec!(1), None, ts_us).unwrap()
    }

    #[test]
    fn rejects_invalid_configuration_up_front() {
        let mut cfg = test_config();
        cfg.windows.clear();
        assert!(matches!(
            SignalEngine::new(cfg),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn calm_stream_emits_no_decision() {
        let mut engine = SignalEngine::new(test_config()).unwrap();
        for i in 0..20 {
            let decision = engine.process(&trade(dec!(100), dec!(1), i * SEC)).unwrap();
            assert!(decision.is_none());
        }
        let snaps = engine.snapshots_for(&btc()).unwrap();
        assert_eq!(snaps[0].vwap, Some(dec!(100)));
    }

    #[test]
    fn deviation_and_volume_spike_combine_into_a_decision() {
        // Bands: deviation 1%..5%, volume 3x..10x, weights 0.5/0.5,
        // threshold 0.6.
        let mut engine = SignalEngine::new(test_config()).unwrap();
        for i in 0..10 {
            engine.process(&trade(dec!(100), dec!(1), i * SEC)).unwrap();
        }

        // Price jumps to 110 on 10 volume. Post-admission the window holds
        // vwap 105 and mean volume 20/11, so deviation is ~4.76% (conf
        // ~0.94) and the volume ratio 5.5x (conf ~0.357); the weighted
        // average is ~0.649. All three kinds never arrive, so the decision
        // comes from the coalescing flush two seconds later.
        engine
            .process(&trade(dec!(110), dec!(10), 10 * SEC))
            .unwrap();
        let decision = engine
            .process(&trade(dec!(104), dec!(0.5), 12 * SEC))
            .unwrap()
            .expect("flushed batch emits");

        assert_eq!(decision.instrument, btc());
        assert_eq!(decision.contributing.len(), 2);
        assert!(decision.confidence >= dec!(0.6));
    }

    #[test]
    fn liquidation_cluster_feeds_the_combiner() {
        let mut cfg = test_config();
        cfg.combiner.emission_threshold = dec!(0.3);
        let mut engine = SignalEngine::new(cfg).unwrap();

        // Liquidations arrive one per second. Count 3 scores 0 in band
        // (3, 6) and its batch is flushed and discarded a second later;
        // count 4 scores 1/3, which clears 0.3 when the next event flushes.
        let mut decision = None;
        for i in 0..5 {
            if let Some(d) = engine.process(&liq(i * SEC)).unwrap() {
                decision = Some(d);
            }
        }
        let decision = decision.expect("cluster decision");
        assert_eq!(decision.contributing.len(), 1);
        assert_eq!(
            decision.contributing[0].kind,
            crate::trigger::TriggerKind::LiquidationCluster
        );
    }

    #[test]
    fn liquidation_price_feeds_the_price_detectors() {
        let mut engine = SignalEngine::new(test_config()).unwrap();
        for i in 0..10 {
            engine.process(&trade(dec!(100), dec!(1), i * SEC)).unwrap();
        }

        // Liquidation prints at 110, 10% above the VWAP of 100 (past the 5%
        // saturation) on 10x the mean volume. It must produce deviation and
        // volume candidates even though a single liquidation is far below
        // the minimum cluster size.
        let liquidation =
            NormalizedEvent::liquidation(btc(), dec!(110), dec!(10), None, 10 * SEC).unwrap();
        engine.process(&liquidation).unwrap();

        let quote = NormalizedEvent::quote(btc(), dec!(100.5), 12 * SEC).unwrap();
        let decision = engine
            .process(&quote)
            .unwrap()
            .expect("deviating liquidation emits on flush");

        let kinds: Vec<_> = decision.contributing.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                crate::trigger::TriggerKind::PriceDeviation,
                crate::trigger::TriggerKind::VolumeSpike,
            ]
        );
        assert_eq!(decision.confidence, Decimal::ONE);

        // The liquidation never entered the VWAP sums.
        let snaps = engine.snapshots_for(&btc()).unwrap();
        assert_eq!(snaps[0].vwap, Some(dec!(100)));
        assert_eq!(snaps[0].count, 10);
    }

    #[test]
    fn out_of_order_event_leaves_engine_usable() {
        let mut engine = SignalEngine::new(test_config()).unwrap();
        engine.process(&trade(dec!(100), dec!(1), 10 * SEC)).unwrap();

        assert!(matches!(
            engine.process(&trade(dec!(100), dec!(1), 5 * SEC)),
            Err(EngineError::OutOfOrderEvent { .. })
        ));

        engine.process(&trade(dec!(100), dec!(1), 11 * SEC)).unwrap();
        assert_eq!(engine.snapshots_for(&btc()).unwrap()[0].count, 2);
    }

    #[test]
    fn remove_instrument_clears_every_layer() {
        let mut engine = SignalEngine::new(test_config()).unwrap();
        for i in 0..5 {
            engine.process(&liq(i * SEC)).unwrap();
        }
        engine.process(&trade(dec!(100), dec!(1), 6 * SEC)).unwrap();

        engine.remove_instrument(&btc());
        assert!(engine.snapshots_for(&btc()).is_err());
        assert!(engine.last_decision(&btc()).is_none());

        // Fresh state: two liquidations are below the minimum cluster again.
        engine.process(&liq(0)).unwrap();
        engine.process(&liq(SEC)).unwrap();
        assert!(engine.snapshots_for(&btc()).is_ok());
    }
}
