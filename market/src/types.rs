use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Venue-neutral instrument identifier (e.g. `"BTC-USD"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Trade,
    Quote,
    Liquidation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

/// Rejected at the provider boundary, before an event ever reaches the engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("instrument id cannot be empty")]
    EmptyInstrument,

    #[error("{kind:?} price must be positive, got {price}")]
    NonPositivePrice { kind: EventKind, price: Decimal },

    #[error("volume cannot be negative, got {0}")]
    NegativeVolume(Decimal),
}

/// One normalized market update.
///
/// Providers translate venue payloads into this shape; the engine consumes it
/// exactly once. Immutable after construction; all fields are validated by
/// the constructors below.
///
/// Timestamps are monotonic microseconds and must be non-decreasing per
/// instrument; the engine rejects regressions, this type does not track them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub instrument: Instrument,
    pub kind: EventKind,
    pub price: Decimal,
    /// Traded/liquidated quantity. Always zero for quotes.
    pub volume: Decimal,
    pub side: Option<Side>,
    pub ts_us: i64,
}

impl NormalizedEvent {
    pub fn trade(
        instrument: Instrument,
        price: Decimal,
        volume: Decimal,
        side: Option<Side>,
        ts_us: i64,
    ) -> Result<Self, EventError> {
        Self {
            instrument,
            kind: EventKind::Trade,
            price,
            volume,
            side,
            ts_us,
        }
        .validated()
    }

    pub fn quote(instrument: Instrument, price: Decimal, ts_us: i64) -> Result<Self, EventError> {
        Self {
            instrument,
            kind: EventKind::Quote,
            price,
            volume: Decimal::ZERO,
            side: None,
            ts_us,
        }
        .validated()
    }

    pub fn liquidation(
        instrument: Instrument,
        price: Decimal,
        volume: Decimal,
        side: Option<Side>,
        ts_us: i64,
    ) -> Result<Self, EventError> {
        Self {
            instrument,
            kind: EventKind::Liquidation,
            price,
            volume,
            side,
            ts_us,
        }
        .validated()
    }

    fn validated(self) -> Result<Self, EventError> {
        if self.instrument.as_str().is_empty() {
            return Err(EventError::EmptyInstrument);
        }
        if self.price <= Decimal::ZERO {
            return Err(EventError::NonPositivePrice {
                kind: self.kind,
                price: self.price,
            });
        }
        if self.volume < Decimal::ZERO {
            return Err(EventError::NegativeVolume(self.volume));
        }
        Ok(self)
    }
}
