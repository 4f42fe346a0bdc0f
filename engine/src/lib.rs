pub mod combiner;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod num;
pub mod rolling_window;
pub mod trigger;
pub mod vwap;

pub use combiner::{Decision, TriggerCombiner};
pub use engine::SignalEngine;
pub use error::EngineError;
