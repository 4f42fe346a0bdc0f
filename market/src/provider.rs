use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use crate::types::{Instrument, NormalizedEvent};

/// Venue-facing event source.
///
/// Implementations own all transport concerns (connections, reconnects,
/// payload decoding) and deliver already-validated [`NormalizedEvent`]s over
/// the channel, ordered per instrument. The engine never branches on venue:
/// it only ever sees this trait.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Stream events for the given instruments until the source ends or the
    /// receiver is dropped.
    async fn stream_events(
        &self,
        instruments: &[Instrument],
        tx: Sender<NormalizedEvent>,
    ) -> anyhow::Result<()>;
}
