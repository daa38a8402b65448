//! Inbound event dispatch.

use log::{debug, info};

use tvsource_protocol::{
    AvPlaybackKind, RecordEvent, RecordStatus, ResourceEvent, ResourceEventKind, SignalInfo,
    SignalStatus, SourceInput, TvEvent,
};

use super::{best_effort, Action, EngineCore};
use crate::device::RawSignal;
use crate::event::{DetectorEvent, EngineEvent};

impl EngineCore {
    pub(super) fn dispatch(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Common(DetectorEvent::SignalChange) => self.on_signal_change(),
            EngineEvent::Common(DetectorEvent::SourceConnect { source, connected }) => {
                self.on_source_connect(source, connected)
            }
            EngineEvent::CheckSourceValid { source } => self.on_check_source_valid(source),
            EngineEvent::AvState(kind) => self.on_av_state(kind),
            EngineEvent::VideoAvailableLater => self.on_video_available_later(),
            EngineEvent::FrontendState(ev) => self.on_frontend_event(ev),
            EngineEvent::FrontendRecheck => self.on_frontend_recheck(),
            EngineEvent::EnableVideoLater => self.on_enable_video_later(),
            EngineEvent::ScanningFrameStable => self.on_scanning_frame_stable(),
            EngineEvent::ScannerState(ev) => self.on_scanner_event(ev),
            EngineEvent::StartAnalyze { frequency_hz } => self.on_start_analyze(frequency_hz),
            EngineEvent::StopAnalyze => self.on_stop_analyze(),
            EngineEvent::RecordState(ev) => self.on_record_event(ev),
            EngineEvent::ResourceManagerState(ev) => self.on_resource_event(ev),
            EngineEvent::EpgState(ev) => self.emit(TvEvent::Epg(ev)),
            EngineEvent::RrtState(payload) => self.emit(TvEvent::Rrt(payload)),
            EngineEvent::EasState(payload) => self.emit(TvEvent::Eas(payload)),
        }
    }

    fn on_source_connect(&mut self, source: SourceInput, connected: bool) {
        info!(
            "[SourceEngine] {} {}",
            source,
            if connected { "plugged in" } else { "unplugged" }
        );
        self.state.connections.insert(source, connected);
        if !connected && source == self.state.current_source {
            self.post(
                EngineEvent::CheckSourceValid { source },
                self.config.source_check_delay(),
            );
        }
        self.emit(TvEvent::SourceConnect { source, connected });
    }

    /// Delayed check after the current source was unplugged.
    fn on_check_source_valid(&mut self, source: SourceInput) {
        if source != self.state.current_source || self.state.is_scanning() {
            return;
        }
        if self.devices.detector.is_connected(source) {
            debug!("[SourceEngine] {} came back", source);
            return;
        }
        self.apply_signal(RawSignal {
            status_code: SignalStatus::NoSignal.code(),
            info: SignalInfo::null(),
        });
    }

    fn on_av_state(&mut self, kind: AvPlaybackKind) {
        if kind == AvPlaybackKind::VideoAvailable
            && !self.state.is_blocked()
            && !self.state.is_scanning()
        {
            self.post(
                EngineEvent::VideoAvailableLater,
                self.config.video_available_delay(),
            );
        }
        let source = self.state.current_source;
        self.emit(TvEvent::AvPlayback { source, kind });
    }

    fn on_video_available_later(&mut self) {
        if self.state.is_blocked() || self.state.is_scanning() {
            return;
        }
        self.show_video();
        best_effort("enable video", self.devices.decoder.enable_video());
    }

    fn on_record_event(&mut self, event: RecordEvent) {
        self.state.flags.recording = event.status == RecordStatus::Started;
        self.emit(TvEvent::Recorder(event));
    }

    fn on_resource_event(&mut self, event: ResourceEvent) {
        let current_class = self.state.current_source.ownership_class();
        if event.kind == ResourceEventKind::Preempted
            && current_class == Some(event.class)
            && self.state.action == Action::Playing
        {
            info!(
                "[SourceEngine] {} resources preempted, stopping playback",
                event.class.name()
            );
            best_effort("stop decoder", self.devices.decoder.stop());
            self.state.action = Action::Idle;
        }
        self.emit(TvEvent::ResourceManager(event));
    }
}
