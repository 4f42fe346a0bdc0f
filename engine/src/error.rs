use market::types::Instrument;
use thiserror::Error;

/// Engine error taxonomy.
///
/// `Configuration` is fatal and only ever surfaced at construction time.
/// The two runtime variants are per-call rejections: the engine stays fully
/// usable for subsequent, well-formed input. A VWAP query over zero
/// accumulated volume is *not* an error: snapshots carry `vwap: None` for
/// that case instead of a numeric sentinel.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error(
        "out-of-order event for {instrument}: last admitted {last_ts_us}us, got {event_ts_us}us"
    )]
    OutOfOrderEvent {
        instrument: Instrument,
        last_ts_us: i64,
        event_ts_us: i64,
    },

    #[error("no events seen yet for instrument {0}")]
    UnknownInstrument(Instrument),
}
