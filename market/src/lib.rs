pub mod provider;
pub mod types;

pub use types::{EventError, EventKind, Instrument, NormalizedEvent, Side};
