//! Inbound engine events.
//!
//! Everything the engine reacts to asynchronously arrives as one
//! [`EngineEvent`] on the event queue: collaborator callbacks, scanner
//! progress and the engine's own delayed follow-ups.

use std::collections::TryReserveError;

use log::warn;

use tvsource_protocol::{
    AvPlaybackKind, EpgEvent, FrontendEvent, RecordEvent, ResourceEvent, ScannerEvent,
    SectionPayload, SourceInput,
};

/// Device-poll detector notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorEvent {
    /// The selected source's signal changed; re-read it.
    SignalChange,
    /// A source was plugged in or unplugged.
    SourceConnect { source: SourceInput, connected: bool },
}

/// Message handled by the engine worker.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Common(DetectorEvent),
    StopAnalyze,
    StartAnalyze { frequency_hz: u32 },
    /// Delayed check that a digital frontend is still unlocked.
    FrontendRecheck,
    AvState(AvPlaybackKind),
    FrontendState(FrontendEvent),
    ScannerState(ScannerEvent),
    EpgState(EpgEvent),
    /// Delayed video enable after a stable signal.
    EnableVideoLater,
    /// Stable frame seen while scanning.
    ScanningFrameStable,
    /// Delayed video enable after the decoder reported a first frame.
    VideoAvailableLater,
    RecordState(RecordEvent),
    RrtState(SectionPayload),
    EasState(SectionPayload),
    ResourceManagerState(ResourceEvent),
    /// Delayed check that an unplugged source is still gone.
    CheckSourceValid { source: SourceInput },
}

/// Discriminant of [`EngineEvent`], used to match pending messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Common,
    StopAnalyze,
    StartAnalyze,
    FrontendRecheck,
    AvState,
    FrontendState,
    ScannerState,
    EpgState,
    EnableVideoLater,
    ScanningFrameStable,
    VideoAvailableLater,
    RecordState,
    RrtState,
    EasState,
    ResourceManagerState,
    CheckSourceValid,
}

impl EventKind {
    /// Messages the engine schedules for itself.
    pub fn is_follow_up(self) -> bool {
        matches!(
            self,
            EventKind::FrontendRecheck
                | EventKind::EnableVideoLater
                | EventKind::ScanningFrameStable
                | EventKind::VideoAvailableLater
                | EventKind::CheckSourceValid
        )
    }

    /// Follow-ups that would re-enable video for the previous source.
    pub fn is_video_follow_up(self) -> bool {
        matches!(
            self,
            EventKind::EnableVideoLater
                | EventKind::ScanningFrameStable
                | EventKind::VideoAvailableLater
        )
    }
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::Common(_) => EventKind::Common,
            EngineEvent::StopAnalyze => EventKind::StopAnalyze,
            EngineEvent::StartAnalyze { .. } => EventKind::StartAnalyze,
            EngineEvent::FrontendRecheck => EventKind::FrontendRecheck,
            EngineEvent::AvState(_) => EventKind::AvState,
            EngineEvent::FrontendState(_) => EventKind::FrontendState,
            EngineEvent::ScannerState(_) => EventKind::ScannerState,
            EngineEvent::EpgState(_) => EventKind::EpgState,
            EngineEvent::EnableVideoLater => EventKind::EnableVideoLater,
            EngineEvent::ScanningFrameStable => EventKind::ScanningFrameStable,
            EngineEvent::VideoAvailableLater => EventKind::VideoAvailableLater,
            EngineEvent::RecordState(_) => EventKind::RecordState,
            EngineEvent::RrtState(_) => EventKind::RrtState,
            EngineEvent::EasState(_) => EventKind::EasState,
            EngineEvent::ResourceManagerState(_) => EventKind::ResourceManagerState,
            EngineEvent::CheckSourceValid { .. } => EventKind::CheckSourceValid,
        }
    }

    /// Build an RRT event from a section owned by the table parser.
    ///
    /// Returns `None`, after logging, if the copy cannot be allocated.
    pub fn rrt(table_id: u8, section: &[u8]) -> Option<Self> {
        copy_section("RRT", table_id, section).map(EngineEvent::RrtState)
    }

    /// Build an EAS event from a section owned by the table parser.
    pub fn eas(table_id: u8, section: &[u8]) -> Option<Self> {
        copy_section("EAS", table_id, section).map(EngineEvent::EasState)
    }
}

fn copy_section(label: &str, table_id: u8, section: &[u8]) -> Option<SectionPayload> {
    checked_copy(label, section.len(), || {
        SectionPayload::try_copy_from(table_id, section)
    })
}

/// Run a fallible section copy, logging and dropping the section on failure.
fn checked_copy<F>(label: &str, len: usize, copy: F) -> Option<SectionPayload>
where
    F: FnOnce() -> Result<SectionPayload, TryReserveError>,
{
    match copy() {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!("[EngineEvent] Dropping {} section ({} bytes): {}", label, len, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(EngineEvent::EnableVideoLater.kind(), EventKind::EnableVideoLater);
        assert_eq!(
            EngineEvent::StartAnalyze { frequency_hz: 474_000_000 }.kind(),
            EventKind::StartAnalyze
        );
        assert_eq!(
            EngineEvent::Common(DetectorEvent::SignalChange).kind(),
            EventKind::Common
        );
    }

    #[test]
    fn test_follow_up_kinds() {
        assert!(EventKind::EnableVideoLater.is_follow_up());
        assert!(EventKind::CheckSourceValid.is_follow_up());
        assert!(!EventKind::CheckSourceValid.is_video_follow_up());
        assert!(!EventKind::ScannerState.is_follow_up());
    }

    #[test]
    fn test_section_events_own_their_bytes() {
        let mut raw = vec![0xCA, 0x01, 0x02];
        let event = EngineEvent::rrt(0xCA, &raw).unwrap();
        raw.clear();
        match event {
            EngineEvent::RrtState(payload) => {
                assert_eq!(payload.table_id, 0xCA);
                assert_eq!(&payload.data[..], &[0xCA, 0x01, 0x02]);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(EngineEvent::eas(0xD8, &[]).map(|e| e.kind()), Some(EventKind::EasState));
    }

    #[test]
    fn test_section_dropped_when_copy_cannot_allocate() {
        let dropped = checked_copy("RRT", 4, || {
            Err(Vec::<u8>::new().try_reserve_exact(usize::MAX).unwrap_err())
        });
        assert!(dropped.is_none());

        let kept = checked_copy("EAS", 1, || SectionPayload::try_copy_from(0xD8, &[0xD8]));
        assert_eq!(kept.map(|p| p.table_id), Some(0xD8));
    }
}
