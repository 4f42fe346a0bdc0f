//! Decimal helpers shared across the engine.
//!
//! All price/volume/ratio/confidence arithmetic in this crate uses
//! `rust_decimal::Decimal`. Binary floating point is banned from gating
//! math: repeated incremental window updates would accumulate
//! representational error that the exactness tests forbid.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const BPS_SCALE: Decimal = dec!(10_000);

/// Clamp into the closed unit interval. Confidence values always pass
/// through here before leaving a detector or the combiner.
pub fn clamp01(value: Decimal) -> Decimal {
    value.clamp(Decimal::ZERO, Decimal::ONE)
}

/// Express a price ratio in basis points (log/observability only).
pub fn to_bps(ratio: Decimal) -> Decimal {
    ratio * BPS_SCALE
}

/// Duration as engine-native microseconds.
pub fn micros(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}
