//! Trigger combiner.
//!
//! Per instrument, a two-state machine: while Armed, candidates are grouped
//! into a batch that closes when the coalescing interval elapses or every
//! detector kind has contributed; emitting a [`Decision`] enters Cooldown,
//! which rejects candidates until stream time reaches the cooldown-until
//! timestamp. Time only advances through event timestamps, so an expired
//! batch is flushed on the next `observe` call for that instrument. A batch
//! below the emission threshold is discarded without entering cooldown.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use market::types::Instrument;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::CombinerConfig;
use crate::num::{clamp01, micros};
use crate::trigger::{ALL_KINDS, CandidateSignal, TriggerKind};

/// Finalized trigger decision, handed to the external sink exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub instrument: Instrument,
    /// Timestamp of the latest contributing candidate.
    pub ts_us: i64,
    /// Weighted-average confidence over the contributing candidates,
    /// clamped to `[0, 1]`.
    pub confidence: Decimal,
    /// Ordered by candidate timestamp, then kind.
    pub contributing: Vec<CandidateSignal>,
    /// No further Decision for this instrument before this stream time.
    pub cooldown_until_us: i64,
}

/// Open coalescing batch for one instrument.
#[derive(Debug)]
struct Batch {
    opened_ts_us: i64,
    /// At most one candidate per kind; ties resolved on insert.
    by_kind: HashMap<TriggerKind, CandidateSignal>,
}

#[derive(Debug, Default)]
struct InstrumentState {
    batch: Option<Batch>,
    cooldown_until_us: Option<i64>,
    last_decision: Option<Decision>,
}

#[derive(Debug)]
pub struct TriggerCombiner {
    cfg: CombinerConfig,
    states: HashMap<Instrument, InstrumentState>,
}

impl TriggerCombiner {
    pub fn new(cfg: CombinerConfig) -> Self {
        Self {
            cfg,
            states: HashMap::new(),
        }
    }

    /// Advance the instrument's combiner clock to `ts_us` and fold in any
    /// new candidates. Returns at most one finalized [`Decision`].
    ///
    /// Called once per processed event, with however many candidates the
    /// detectors produced for it (often none; that is what flushes an
    /// expired batch).
    pub fn observe(
        &mut self,
        instrument: &Instrument,
        ts_us: i64,
        candidates: Vec<CandidateSignal>,
    ) -> Option<Decision> {
        let interval_us = micros(self.cfg.coalescing_interval);
        let state = self.states.entry(instrument.clone()).or_default();

        // Cooldown -> Armed once stream time reaches cooldown-until.
        if state
            .cooldown_until_us
            .is_some_and(|until| ts_us >= until)
        {
            state.cooldown_until_us = None;
        }

        // Flush an open batch whose coalescing interval elapsed.
        let mut decision = None;
        if state
            .batch
            .as_ref()
            .is_some_and(|b| ts_us - b.opened_ts_us >= interval_us)
        {
            if let Some(batch) = state.batch.take() {
                decision = Self::finalize(&self.cfg, instrument, batch, state);
            }
        }

        if state.cooldown_until_us.is_some() {
            // Rejecting, not deferring: cooldown candidates are dropped.
            return decision;
        }

        for candidate in candidates {
            let batch = state.batch.get_or_insert_with(|| Batch {
                opened_ts_us: candidate.ts_us,
                by_kind: HashMap::new(),
            });
            match batch.by_kind.entry(candidate.kind) {
                Entry::Vacant(slot) => {
                    slot.insert(candidate);
                }
                Entry::Occupied(mut slot) => {
                    // Higher confidence wins representation; on equal
                    // confidence the earlier candidate, already in the
                    // slot by stream order, is kept.
                    if candidate.confidence > slot.get().confidence {
                        slot.insert(candidate);
                    }
                }
            }
        }

        // Close early once every configured kind has contributed.
        if state
            .batch
            .as_ref()
            .is_some_and(|b| b.by_kind.len() == ALL_KINDS.len())
        {
            if let Some(batch) = state.batch.take() {
                // The flush above cannot also have emitted here: emission
                // enters cooldown, which drops candidates before this point.
                decision = Self::finalize(&self.cfg, instrument, batch, state);
            }
        }

        decision
    }

    /// Most recent emitted decision for an instrument, if any.
    pub fn last_decision(&self, instrument: &Instrument) -> Option<&Decision> {
        self.states
            .get(instrument)
            .and_then(|s| s.last_decision.as_ref())
    }

    /// Teardown hook for instruments no longer traded.
    pub fn remove_instrument(&mut self, instrument: &Instrument) {
        self.states.remove(instrument);
    }

    fn finalize(
        cfg: &CombinerConfig,
        instrument: &Instrument,
        batch: Batch,
        state: &mut InstrumentState,
    ) -> Option<Decision> {
        let mut weighted = Decimal::ZERO;
        let mut total_weight = Decimal::ZERO;
        for (kind, candidate) in &batch.by_kind {
            let weight = cfg.weights.for_kind(*kind);
            weighted += weight * candidate.confidence;
            total_weight += weight;
        }
        if total_weight.is_zero() {
            return None;
        }
        let confidence = clamp01(weighted / total_weight);

        if confidence < cfg.emission_threshold {
            // Discarded batch: stays Armed, no cooldown.
            return None;
        }

        let mut contributing: Vec<CandidateSignal> = batch.by_kind.into_values().collect();
        contributing.sort_by(|a, b| a.ts_us.cmp(&b.ts_us).then(a.kind.cmp(&b.kind)));

        let ts_us = contributing
            .iter()
            .map(|c| c.ts_us)
            .max()
            .unwrap_or(batch.opened_ts_us);
        let cooldown_until_us = ts_us + micros(cfg.cooldown);

        let decision = Decision {
            instrument: instrument.clone(),
            ts_us,
            confidence,
            contributing,
            cooldown_until_us,
        };

        state.cooldown_until_us = Some(cooldown_until_us);
        state.last_decision = Some(decision.clone());
        Some(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TriggerWeights;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const SEC: i64 = 1_000_000;

    fn cfg() -> CombinerConfig {
        CombinerConfig {
            weights: TriggerWeights {
                price_deviation: dec!(0.5),
                volume_spike: dec!(0.5),
                liquidation_cluster: dec!(0.5),
            },
            emission_threshold: dec!(0.6),
            coalescing_interval: Duration::from_secs(1),
            cooldown: Duration::from_secs(30),
        }
    }

    fn btc() -> Instrument {
        Instrument::new("BTC-USD")
    }

    fn candidate(kind: TriggerKind, confidence: Decimal, ts_us: i64) -> CandidateSignal {
        CandidateSignal {
            kind,
            instrument: btc(),
            confidence,
            metric: confidence,
            ts_us,
        }
    }

    #[test]
    fn below_threshold_batch_emits_nothing_and_keeps_armed() {
        // Two 0.5-confidence candidates average to 0.5, which misses the
        // 0.6 emission threshold: no Decision, and no cooldown either.
        let mut combiner = TriggerCombiner::new(cfg());

        assert!(combiner
            .observe(
                &btc(),
                0,
                vec![
                    candidate(TriggerKind::PriceDeviation, dec!(0.5), 0),
                    candidate(TriggerKind::VolumeSpike, dec!(0.5), 0),
                ],
            )
            .is_none());

        // Interval elapses with no decision...
        assert!(combiner.observe(&btc(), 2 * SEC, vec![]).is_none());

        // ...and the combiner is still Armed: a strong batch emits.
        combiner.observe(
            &btc(),
            3 * SEC,
            vec![
                candidate(TriggerKind::PriceDeviation, dec!(0.9), 3 * SEC),
                candidate(TriggerKind::VolumeSpike, dec!(0.8), 3 * SEC),
            ],
        );
        let decision = combiner
            .observe(&btc(), 5 * SEC, vec![])
            .expect("strong batch emits after interval");
        assert_eq!(decision.confidence, dec!(0.85));
    }

    #[test]
    fn batch_closes_early_when_all_kinds_contribute() {
        let mut combiner = TriggerCombiner::new(cfg());

        let decision = combiner
            .observe(
                &btc(),
                0,
                vec![
                    candidate(TriggerKind::PriceDeviation, dec!(0.9), 0),
                    candidate(TriggerKind::VolumeSpike, dec!(0.8), 0),
                    candidate(TriggerKind::LiquidationCluster, dec!(0.7), 0),
                ],
            )
            .expect("all kinds present closes immediately");

        assert_eq!(decision.contributing.len(), 3);
        assert_eq!(decision.confidence, dec!(0.8));
        assert_eq!(decision.cooldown_until_us, 30 * SEC);
    }

    #[test]
    fn weighted_average_respects_per_kind_weights() {
        let mut config = cfg();
        config.weights = TriggerWeights {
            price_deviation: dec!(3),
            volume_spike: dec!(1),
            liquidation_cluster: dec!(1),
        };
        config.emission_threshold = dec!(0.1);
        let mut combiner = TriggerCombiner::new(config);

        combiner.observe(
            &btc(),
            0,
            vec![
                candidate(TriggerKind::PriceDeviation, dec!(1), 0),
                candidate(TriggerKind::VolumeSpike, dec!(0.2), 0),
            ],
        );
        let decision = combiner
            .observe(&btc(), 2 * SEC, vec![])
            .expect("emits");
        // (3*1 + 1*0.2) / 4 = 0.8
        assert_eq!(decision.confidence, dec!(0.8));
    }

    #[test]
    fn cooldown_suppresses_further_decisions_until_elapsed() {
        let mut combiner = TriggerCombiner::new(cfg());

        let first = combiner
            .observe(
                &btc(),
                0,
                vec![
                    candidate(TriggerKind::PriceDeviation, dec!(1), 0),
                    candidate(TriggerKind::VolumeSpike, dec!(1), 0),
                    candidate(TriggerKind::LiquidationCluster, dec!(1), 0),
                ],
            )
            .expect("first decision");
        assert_eq!(first.cooldown_until_us, 30 * SEC);

        // Qualifying candidates during cooldown are rejected outright.
        for i in 1..29 {
            assert!(combiner
                .observe(
                    &btc(),
                    i * SEC,
                    vec![
                        candidate(TriggerKind::PriceDeviation, dec!(1), i * SEC),
                        candidate(TriggerKind::VolumeSpike, dec!(1), i * SEC),
                        candidate(TriggerKind::LiquidationCluster, dec!(1), i * SEC),
                    ],
                )
                .is_none());
        }

        // At cooldown-until the combiner re-arms and accepts again.
        let second = combiner
            .observe(
                &btc(),
                30 * SEC,
                vec![
                    candidate(TriggerKind::PriceDeviation, dec!(1), 30 * SEC),
                    candidate(TriggerKind::VolumeSpike, dec!(1), 30 * SEC),
                    candidate(TriggerKind::LiquidationCluster, dec!(1), 30 * SEC),
                ],
            )
            .expect("re-armed after cooldown");
        assert_eq!(second.ts_us, 30 * SEC);
    }

    #[test]
    fn same_kind_tie_breaks_on_confidence_then_earliest() {
        let mut config = cfg();
        config.emission_threshold = dec!(0.1);
        let mut combiner = TriggerCombiner::new(config);

        // Higher confidence replaces the earlier candidate.
        combiner.observe(
            &btc(),
            0,
            vec![candidate(TriggerKind::PriceDeviation, dec!(0.4), 0)],
        );
        combiner.observe(
            &btc(),
            SEC / 2,
            vec![candidate(TriggerKind::PriceDeviation, dec!(0.7), SEC / 2)],
        );
        let decision = combiner.observe(&btc(), 2 * SEC, vec![]).expect("emits");
        assert_eq!(decision.contributing.len(), 1);
        assert_eq!(decision.contributing[0].confidence, dec!(0.7));
        assert_eq!(decision.contributing[0].ts_us, SEC / 2);

        // Equal confidence keeps the earliest.
        let mut combiner = TriggerCombiner::new({
            let mut c = cfg();
            c.emission_threshold = dec!(0.1);
            c
        });
        combiner.observe(
            &btc(),
            0,
            vec![candidate(TriggerKind::VolumeSpike, dec!(0.7), 0)],
        );
        combiner.observe(
            &btc(),
            SEC / 2,
            vec![candidate(TriggerKind::VolumeSpike, dec!(0.7), SEC / 2)],
        );
        let decision = combiner.observe(&btc(), 2 * SEC, vec![]).expect("emits");
        assert_eq!(decision.contributing[0].ts_us, 0);
    }

    #[test]
    fn flush_emission_enters_cooldown_and_drops_new_candidates() {
        let mut config = cfg();
        config.emission_threshold = dec!(0.1);
        let mut combiner = TriggerCombiner::new(config);

        combiner.observe(
            &btc(),
            0,
            vec![candidate(TriggerKind::PriceDeviation, dec!(0.2), 0)],
        );

        // 5s later: old batch flushes (and emits), new candidate is dropped
        // because the emission put the instrument into cooldown.
        let decision = combiner
            .observe(
                &btc(),
                5 * SEC,
                vec![candidate(TriggerKind::VolumeSpike, dec!(0.9), 5 * SEC)],
            )
            .expect("flushed batch emits");
        assert_eq!(decision.contributing.len(), 1);
        assert_eq!(
            decision.contributing[0].kind,
            TriggerKind::PriceDeviation
        );
    }

    #[test]
    fn contributing_list_is_ordered_by_timestamp_then_kind() {
        let mut config = cfg();
        config.emission_threshold = dec!(0.1);
        let mut combiner = TriggerCombiner::new(config);

        combiner.observe(
            &btc(),
            0,
            vec![candidate(TriggerKind::VolumeSpike, dec!(0.5), 0)],
        );
        let decision = combiner
            .observe(
                &btc(),
                SEC / 4,
                vec![
                    candidate(TriggerKind::LiquidationCluster, dec!(0.5), SEC / 4),
                    candidate(TriggerKind::PriceDeviation, dec!(0.5), SEC / 4),
                ],
            )
            .expect("all kinds present");

        let kinds: Vec<TriggerKind> = decision.contributing.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TriggerKind::VolumeSpike,
                TriggerKind::PriceDeviation,
                TriggerKind::LiquidationCluster,
            ]
        );
    }

    #[test]
    fn instruments_do_not_share_cooldown() {
        let mut combiner = TriggerCombiner::new(cfg());
        let eth = Instrument::new("ETH-USD");

        combiner
            .observe(
                &btc(),
                0,
                vec![
                    candidate(TriggerKind::PriceDeviation, dec!(1), 0),
                    candidate(TriggerKind::VolumeSpike, dec!(1), 0),
                    candidate(TriggerKind::LiquidationCluster, dec!(1), 0),
                ],
            )
            .expect("btc decision");

        let mut eth_candidates = vec![
            candidate(TriggerKind::PriceDeviation, dec!(1), SEC),
            candidate(TriggerKind::VolumeSpike, dec!(1), SEC),
            candidate(TriggerKind::LiquidationCluster, dec!(1), SEC),
        ];
        for c in &mut eth_candidates {
            c.instrument = eth.clone();
        }
        assert!(combiner.observe(&eth, SEC, eth_candidates).is_some());
    }

    #[test]
    fn decision_serializes_with_snake_case_kinds() {
        let mut combiner = TriggerCombiner::new(cfg());
        let decision = combiner
            .observe(
                &btc(),
                0,
                vec![
                    candidate(TriggerKind::PriceDeviation, dec!(1), 0),
                    candidate(TriggerKind::VolumeSpike, dec!(1), 0),
                    candidate(TriggerKind::LiquidationCluster, dec!(1), 0),
                ],
            )
            .expect("decision");

        let json = serde_json::to_value(&decision).expect("serializable");
        assert_eq!(json["instrument"], "BTC-USD");
        assert_eq!(json["contributing"][0]["kind"], "price_deviation");
        assert_eq!(json["cooldown_until_us"], 30 * SEC);
    }

    #[test]
    fn last_decision_is_retained_per_instrument() {
        let mut combiner = TriggerCombiner::new(cfg());
        assert!(combiner.last_decision(&btc()).is_none());

        combiner.observe(
            &btc(),
            0,
            vec![
                candidate(TriggerKind::PriceDeviation, dec!(1), 0),
                candidate(TriggerKind::VolumeSpike, dec!(1), 0),
                candidate(TriggerKind::LiquidationCluster, dec!(1), 0),
            ],
        );
        let retained = combiner.last_decision(&btc()).expect("retained");
        assert_eq!(retained.confidence, Decimal::ONE);
    }
}
