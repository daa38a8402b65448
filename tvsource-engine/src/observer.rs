//! Outbound event sink.

use log::{debug, info};

use tvsource_protocol::TvEvent;

/// Receives engine events. Called on the engine worker thread or on the
/// caller's thread, never while the engine lock is held.
pub trait EngineObserver: Send + Sync {
    fn on_event(&self, event: TvEvent);
}

/// Observer that writes every event to the log. Used by the daemon when no
/// client transport is attached.
#[derive(Debug, Default)]
pub struct LogObserver;

impl EngineObserver for LogObserver {
    fn on_event(&self, event: TvEvent) {
        match &event {
            TvEvent::SignalInfo { source, info } => {
                info!(
                    "[Observer] {} signal {:?} format={:?} hdr={:?}",
                    source, info.status, info.format, info.hdr
                );
            }
            TvEvent::SourceConnect { source, connected } => {
                info!(
                    "[Observer] {} {}",
                    source,
                    if *connected { "connected" } else { "disconnected" }
                );
            }
            TvEvent::Rrt(payload) | TvEvent::Eas(payload) => {
                debug!(
                    "[Observer] {} table 0x{:02X} ({} bytes)",
                    event.name(),
                    payload.table_id,
                    payload.len()
                );
            }
            other => debug!("[Observer] {:?}", other),
        }
    }
}
