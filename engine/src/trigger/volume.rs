//! Volume-spike trigger.
//!
//! Compares the event's volume to the mean per-sample volume of the
//! reference window. The engine admits a trade into the window *before*
//! detectors run, so the mean already includes the event itself, which
//! only dampens the ratio, never inflates it.

use market::types::NormalizedEvent;

use super::{CandidateSignal, TriggerKind};
use crate::config::VolumeSpikeConfig;
use crate::rolling_window::VwapSnapshot;

pub fn volume_spike(
    event: &NormalizedEvent,
    reference: &VwapSnapshot,
    cfg: &VolumeSpikeConfig,
) -> Option<CandidateSignal> {
    if event.volume.is_zero() {
        return None;
    }
    let mean = reference.mean_volume()?;
    if mean.is_zero() {
        return None;
    }

    let ratio = event.volume / mean;
    if ratio < cfg.band.low() {
        return None;
    }

    Some(CandidateSignal {
        kind: TriggerKind::VolumeSpike,
        instrument: event.instrument.clone(),
        confidence: cfg.band.score(ratio),
        metric: ratio,
        ts_us: event.ts_us,
    })
}
