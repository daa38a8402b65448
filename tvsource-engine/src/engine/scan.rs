//! Scan coordinator.
//!
//! A scan session lives inside [`Action::Scanning`]. While it is active the
//! signal state machine only applies snow or blanking and keeps signal
//! reports away from the observer.

use log::{debug, info, warn};

use tvsource_protocol::{
    EngineError, ScanKind, ScanParams, ScannerEvent, ScannerEventKind, SignalInfo,
    SourceInput, TvEvent,
};

use super::{best_effort, Action, AnalysisResume, EngineCore, ScanMode, ScanSession};
use crate::device::{FrontendMode, ScreenMode};

impl EngineCore {
    pub(super) fn start_scan(&mut self, params: ScanParams) -> Result<(), EngineError> {
        if !params.is_valid() {
            return Err(EngineError::InvalidParameter(format!(
                "invalid frequency range {}..={}",
                params.min_freq_hz, params.max_freq_hz
            )));
        }
        match self.state.action {
            Action::Idle | Action::Playing => {}
            other => {
                return Err(EngineError::InvalidState(format!(
                    "cannot start a scan while {}",
                    other.name()
                )))
            }
        }

        info!(
            "[SourceEngine] Starting {:?} scan for {:?}",
            params.kind, params.service
        );
        best_effort("disable video", self.devices.decoder.disable_video());
        best_effort("stop decoder", self.devices.decoder.stop());
        let screen = if self.config.snow_on_scan {
            ScreenMode::Snow
        } else {
            ScreenMode::Color(self.config.screen_color)
        };
        best_effort("set screen", self.devices.decoder.set_screen(screen));

        self.state.action = Action::Scanning(ScanSession::sweep(params));

        if let Err(e) = self.devices.frontend.open(FrontendMode::Auto) {
            warn!("[SourceEngine] Failed to open frontend for scan: {}", e);
            self.state.action = Action::Idle;
            return Err(EngineError::Device(e.to_string()));
        }

        let cleared = match params.kind {
            ScanKind::Auto => self
                .devices
                .channels
                .clear_service_types(params.service.service_types()),
            ScanKind::Manual => self
                .devices
                .channels
                .clear_frequency_range(params.min_freq_hz, params.max_freq_hz),
        };
        if let Err(e) = cleared {
            warn!("[SourceEngine] Failed to clear channels before scan: {}", e);
        }

        if let Err(e) = self.devices.scanner.start(&params, self.sender.clone()) {
            warn!("[SourceEngine] Scanner failed to start: {}", e);
            best_effort("close frontend", self.devices.frontend.close());
            self.state.action = Action::Idle;
            return Err(EngineError::Device(e.to_string()));
        }
        Ok(())
    }

    /// End the scan and leave no source selected. No-op when not scanning.
    pub(super) fn stop_scan(&mut self) {
        if !self.state.is_scanning() {
            debug!("[SourceEngine] Not scanning");
            return;
        }
        info!("[SourceEngine] Stopping scan");

        self.show_color(self.config.screen_color);
        best_effort("stop decoder", self.devices.decoder.stop());
        best_effort("stop scanner", self.devices.scanner.stop());
        best_effort("close frontend", self.devices.frontend.close());
        best_effort("close video-in port", self.devices.video_in.close_port());

        self.state.flags.in_video_pipeline = false;
        self.state.last_source = self.state.current_source;
        self.state.current_source = SourceInput::Invalid;
        self.state.virtual_source = SourceInput::Invalid;
        self.state.current_signal = SignalInfo::null();
        self.state.action = Action::Idle;
    }

    /// End the scan without touching the source selection.
    pub(super) fn force_stop_scan(&mut self) {
        if !self.state.is_scanning() {
            return;
        }
        info!("[SourceEngine] Force-stopping scan");
        best_effort("stop decoder", self.devices.decoder.stop());
        best_effort("stop scanner", self.devices.scanner.stop());
        best_effort("close frontend", self.devices.frontend.close());
        self.state.action = Action::Idle;
    }

    pub(super) fn pause_scan(&mut self) {
        let Some(session) = self.state.action.scan_session_mut() else {
            return;
        };
        if session.paused {
            return;
        }
        session.paused = true;
        best_effort("pause scanner", self.devices.scanner.pause());
    }

    pub(super) fn resume_scan(&mut self) {
        let Some(session) = self.state.action.scan_session_mut() else {
            return;
        };
        if !session.paused {
            return;
        }
        session.paused = false;
        best_effort("resume scanner", self.devices.scanner.resume());
    }

    pub(super) fn on_start_analyze(&mut self, frequency_hz: u32) {
        match &mut self.state.action {
            Action::Scanning(session) => {
                session.mode = ScanMode::Analyzing { frequency_hz };
            }
            Action::Idle | Action::Playing => {
                let resume = AnalysisResume::capture(self.state.current_source, self.state.action);
                best_effort("stop decoder", self.devices.decoder.stop());
                self.state.action = Action::Scanning(ScanSession::analysis(frequency_hz, resume));
            }
            other => {
                warn!(
                    "[SourceEngine] Cannot analyze {} Hz while {}",
                    frequency_hz,
                    other.name()
                );
                return;
            }
        }

        info!("[SourceEngine] Analyzing {} Hz", frequency_hz);
        if let Err(e) = self.devices.scanner.analyze(frequency_hz, self.sender.clone()) {
            warn!("[SourceEngine] Channel analysis failed to start: {}", e);
            self.end_analysis();
        }
    }

    pub(super) fn on_stop_analyze(&mut self) {
        self.end_analysis();
    }

    fn end_analysis(&mut self) {
        let Some(session) = self.state.action.scan_session_mut() else {
            return;
        };
        if session.is_analysis_only() {
            let resume = session.resume;
            self.finish_analysis(resume);
        } else {
            session.mode = ScanMode::Running;
        }
    }

    /// Close an analysis-only session and put the selected source back the
    /// way it was: frontend reopened in its mode, saved program replayed if
    /// one was playing.
    fn finish_analysis(&mut self, resume: AnalysisResume) {
        best_effort("stop scanner", self.devices.scanner.stop());
        self.state.action = Action::Idle;

        match resume.frontend {
            Some(mode) => {
                best_effort("reopen frontend", self.devices.frontend.open(mode));
            }
            None => {
                best_effort("close frontend", self.devices.frontend.close());
            }
        }

        if resume.was_playing {
            self.resume_saved_program();
        }
        debug!(
            "[SourceEngine] Analysis finished, back on {} ({})",
            self.state.current_source,
            self.state.action.name()
        );
    }

    fn resume_saved_program(&mut self) {
        let Some(class) = self.state.current_source.ownership_class() else {
            return;
        };
        match self.devices.settings.load_program(class) {
            Ok(Some(program)) => {
                if let Err(e) = self.play_program(program) {
                    warn!("[SourceEngine] Failed to resume program after analysis: {}", e);
                }
            }
            Ok(None) => debug!("[SourceEngine] No saved program to resume"),
            Err(e) => warn!("[SourceEngine] Failed to load saved program: {}", e),
        }
    }

    pub(super) fn on_scanner_event(&mut self, event: ScannerEvent) {
        let Some(session) = self.state.action.scan_session_mut() else {
            debug!("[SourceEngine] Not scanning, ignoring scanner {:?}", event.kind);
            return;
        };
        let mut finished = None;
        if event.kind == ScannerEventKind::Completed {
            if let ScanMode::Analyzing { frequency_hz } = session.mode {
                debug!("[SourceEngine] Analysis of {} Hz completed", frequency_hz);
                if session.is_analysis_only() {
                    finished = Some(session.resume);
                } else {
                    session.mode = ScanMode::Running;
                }
            } else {
                info!(
                    "[SourceEngine] Scan completed, {} channel(s)",
                    event.channel_count
                );
            }
        }
        self.emit(TvEvent::Scanner(event));
        if let Some(resume) = finished {
            self.finish_analysis(resume);
        }
    }
}
