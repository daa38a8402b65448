//! Event payloads exchanged with collaborators and observers.
//!
//! Inbound payloads are produced by hardware collaborators (frontend,
//! scanner, players, table parsers) and queued on the engine. The engine
//! turns them, together with its own state changes, into [`TvEvent`]s
//! delivered to the registered observer.

use std::collections::TryReserveError;

use bytes::Bytes;

use crate::types::{OwnershipClass, SignalInfo, SourceInput};

/// AV player notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvPlaybackKind {
    /// Playback resumed after an interruption.
    Resume,
    /// First video frame decoded.
    VideoAvailable,
    /// Stream uses a codec the decoder cannot handle.
    Unsupported,
    /// Stream is scrambled and no descrambler is available.
    Scrambled,
}

/// Frontend lock status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendStatus {
    Locked,
    Unlocked,
}

/// Frontend status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontendEvent {
    pub status: FrontendStatus,
    pub frequency_hz: u32,
}

/// Scanner progress kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerEventKind {
    /// Sweep progressed to a new frequency.
    Progress,
    /// The frontend locked on the current frequency.
    Locked,
    /// A channel was stored in the channel database.
    ChannelStored,
    /// The sweep (or single-channel analysis) finished.
    Completed,
}

/// Scanner status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerEvent {
    pub kind: ScannerEventKind,
    /// Completion percentage, 0..=100.
    pub percent: u8,
    pub frequency_hz: u32,
    /// Channels found so far.
    pub channel_count: u32,
}

impl ScannerEvent {
    pub fn new(kind: ScannerEventKind, percent: u8, frequency_hz: u32, channel_count: u32) -> Self {
        Self {
            kind,
            percent,
            frequency_hz,
            channel_count,
        }
    }
}

/// EPG table updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpgEventKind {
    ProgramUpdated,
    ServiceUpdated,
    TimeUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpgEvent {
    pub kind: EpgEventKind,
    pub service_id: u16,
}

/// Recorder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Started,
    Stopped,
    Error(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordEvent {
    pub recorder_id: u32,
    pub status: RecordStatus,
}

/// Player/recorder pool notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEventKind {
    /// Resources of the class were taken by a higher-priority user.
    Preempted,
    /// Resources of the class were returned to the pool.
    Released,
    /// Resources of the class were granted.
    Granted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceEvent {
    pub kind: ResourceEventKind,
    pub class: OwnershipClass,
}

/// Owned, variable-length table section (rating region table, EAS message).
///
/// The buffer moves through the event queue into the outbound event and is
/// released when the last holder drops it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionPayload {
    pub table_id: u8,
    pub data: Bytes,
}

impl SectionPayload {
    /// Copy a section out of a collaborator-owned buffer.
    ///
    /// Fails instead of aborting when the copy cannot be allocated.
    pub fn try_copy_from(table_id: u8, src: &[u8]) -> Result<Self, TryReserveError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(src.len())?;
        buf.extend_from_slice(src);
        Ok(Self {
            table_id,
            data: Bytes::from(buf),
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Events delivered to the registered observer.
#[derive(Debug, Clone, PartialEq)]
pub enum TvEvent {
    /// Signal snapshot of the current source.
    SignalInfo { source: SourceInput, info: SignalInfo },
    /// A source was plugged in or unplugged.
    SourceConnect { source: SourceInput, connected: bool },
    /// AV player notification for the current source.
    AvPlayback { source: SourceInput, kind: AvPlaybackKind },
    /// Recorder status.
    Recorder(RecordEvent),
    /// Rating region table pass-through.
    Rrt(SectionPayload),
    /// Emergency alert pass-through.
    Eas(SectionPayload),
    /// EPG pass-through.
    Epg(EpgEvent),
    /// Resource manager pass-through.
    ResourceManager(ResourceEvent),
    /// Scanner progress.
    Scanner(ScannerEvent),
    /// Channel-lock color substitution toggled.
    ChannelBlock { source: SourceInput, blocked: bool },
    /// Variable refresh rate changed on an HDMI source.
    VrrChange { source: SourceInput, enabled: bool },
}

impl TvEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            TvEvent::SignalInfo { .. } => "signal-info",
            TvEvent::SourceConnect { .. } => "source-connect",
            TvEvent::AvPlayback { .. } => "av-playback",
            TvEvent::Recorder(_) => "recorder",
            TvEvent::Rrt(_) => "rrt",
            TvEvent::Eas(_) => "eas",
            TvEvent::Epg(_) => "epg",
            TvEvent::ResourceManager(_) => "resource-manager",
            TvEvent::Scanner(_) => "scanner",
            TvEvent::ChannelBlock { .. } => "channel-block",
            TvEvent::VrrChange { .. } => "vrr-change",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_payload_copy() {
        let raw = [0xCAu8, 0x00, 0x10, 0x01];
        let payload = SectionPayload::try_copy_from(0xCA, &raw).unwrap();
        assert_eq!(payload.len(), 4);
        assert_eq!(&payload.data[..], &raw[..]);
        assert!(SectionPayload::try_copy_from(0xCA, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_event_names() {
        let ev = TvEvent::SourceConnect {
            source: SourceInput::Hdmi1,
            connected: true,
        };
        assert_eq!(ev.name(), "source-connect");
        assert_eq!(
            TvEvent::ChannelBlock {
                source: SourceInput::Dtv,
                blocked: true
            }
            .name(),
            "channel-block"
        );
    }
}
