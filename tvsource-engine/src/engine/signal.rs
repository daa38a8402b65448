//! Signal state machine.
//!
//! Every detector reading moves the current snapshot into one of
//! `Null`, `Stable`, `Unstable`, `NotSupported` or `NoSignal` and applies
//! the display substitution for that state. `previous` only changes on a
//! stable reading, where it receives the snapshot that was current before.

use log::{debug, info, warn};

use tvsource_protocol::{FrontendEvent, FrontendStatus, ScreenColor, SignalInfo, SignalStatus, TvEvent};

use super::{best_effort, Action, EngineCore};
use crate::device::{RawSignal, ScreenMode};
use crate::event::EngineEvent;

impl EngineCore {
    pub(super) fn show_color(&self, color: ScreenColor) {
        best_effort(
            "set screen color",
            self.devices.decoder.set_screen(ScreenMode::Color(color)),
        );
    }

    pub(super) fn show_video(&self) {
        best_effort("show video", self.devices.decoder.set_screen(ScreenMode::Video));
    }

    /// Re-read the detector for the current source.
    pub(super) fn on_signal_change(&mut self) {
        if !self.state.current_source.is_valid() {
            debug!("[SourceEngine] No source selected, ignoring signal change");
            return;
        }
        let raw = match self.devices.video_in.read_signal() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("[SourceEngine] Failed to read signal info: {}", e);
                RawSignal::null()
            }
        };
        self.apply_signal(raw);
    }

    pub(super) fn apply_signal(&mut self, raw: RawSignal) {
        let Some(status) = SignalStatus::from_code(raw.status_code) else {
            warn!(
                "[SourceEngine] Unrecognized signal status {}, resetting snapshots",
                raw.status_code
            );
            self.state.current_signal = SignalInfo::null();
            self.state.previous_signal = SignalInfo::null();
            return;
        };

        let before = self.state.current_signal;
        self.state.current_signal = SignalInfo { status, ..raw.info };
        debug!(
            "[SourceEngine] {} signal {:?} -> {:?}",
            self.state.current_source, before.status, status
        );

        match status {
            SignalStatus::Null => {}
            SignalStatus::Stable => self.on_stable(before),
            SignalStatus::Unstable => self.on_unstable(),
            SignalStatus::NotSupported => self.on_no_video(false),
            SignalStatus::NoSignal => self.on_no_video(true),
        }
    }

    fn refresh_hdr_aspect(&mut self) {
        match self.devices.video_in.read_hdr_aspect() {
            Ok((hdr, aspect)) => {
                self.state.current_signal.hdr = hdr;
                self.state.current_signal.aspect = aspect;
            }
            Err(e) => warn!("[SourceEngine] Failed to read HDR/aspect: {}", e),
        }
    }

    fn on_stable(&mut self, before: SignalInfo) {
        let source = self.state.current_source;
        if source.is_hdmi() {
            self.refresh_hdr_aspect();
        }

        let info = self.state.current_signal;
        if let Err(e) = self.devices.settings.save_source_info(source, &info) {
            warn!("[SourceEngine] Failed to save source info: {}", e);
        }

        if source.is_hdmi() {
            match self.devices.pq.update_mode(source, &info) {
                Ok(vrr) if vrr != self.state.vrr_enabled => {
                    info!("[SourceEngine] {} VRR {}", source, if vrr { "on" } else { "off" });
                    self.state.vrr_enabled = vrr;
                    self.emit(TvEvent::VrrChange {
                        source,
                        enabled: vrr,
                    });
                    return;
                }
                Ok(_) => {}
                Err(e) => warn!("[SourceEngine] PQ mode update failed: {}", e),
            }
        }

        best_effort("start decoder", self.devices.decoder.start());
        if self.state.is_blocked() {
            self.show_color(self.config.block_color);
        }

        let scanning = self.state.is_scanning();
        let follow_up = if scanning {
            EngineEvent::ScanningFrameStable
        } else {
            EngineEvent::EnableVideoLater
        };
        self.post(follow_up, self.config.enable_video_delay());

        self.state.previous_signal = before;
        if self.state.action == Action::Idle {
            self.state.action = Action::Playing;
        }
        if !scanning {
            self.emit_signal_info();
        }
    }

    /// Snow or blank while scanning, depending on configuration.
    fn scan_substitute(&self) {
        if self.config.snow_on_scan {
            best_effort("show snow", self.devices.decoder.set_screen(ScreenMode::Snow));
        } else {
            best_effort("disable video", self.devices.decoder.disable_video());
            best_effort("stop decoder", self.devices.decoder.stop());
        }
    }

    fn on_unstable(&mut self) {
        if self.state.is_scanning() {
            self.scan_substitute();
            return;
        }

        let source = self.state.current_source;
        if self.state.is_blocked() {
            self.show_color(self.config.block_color);
            self.emit(TvEvent::ChannelBlock {
                source,
                blocked: true,
            });
            return;
        }

        if !source.is_tuner() {
            self.show_color(self.config.screen_color);
            best_effort("stop decoder", self.devices.decoder.stop());
        }
    }

    /// Screen shown in place of video when the source has nothing to show.
    fn no_signal_screen(&self) -> ScreenMode {
        if self.state.preview.is_some() {
            return ScreenMode::Color(ScreenColor::Black);
        }
        if self.state.is_blocked() {
            return ScreenMode::Color(self.config.block_color);
        }
        if self.config.screen_color == ScreenColor::Blue {
            return ScreenMode::Color(ScreenColor::Blue);
        }
        if self.state.current_source.is_analog_tuner() && self.config.snow_on_no_signal {
            return ScreenMode::Snow;
        }
        ScreenMode::Color(ScreenColor::Black)
    }

    fn on_no_video(&mut self, no_signal: bool) {
        if no_signal && self.state.current_source.is_hdmi() {
            self.refresh_hdr_aspect();
        }

        if self.state.is_scanning() {
            self.scan_substitute();
            return;
        }

        let screen = self.no_signal_screen();
        best_effort("set screen", self.devices.decoder.set_screen(screen));
        if screen != ScreenMode::Snow {
            best_effort("stop decoder", self.devices.decoder.stop());
        }
        if self.state.action == Action::Playing {
            self.state.action = Action::Idle;
        }
        self.emit_signal_info();
    }

    pub(super) fn on_frontend_event(&mut self, event: FrontendEvent) {
        if self.state.is_scanning() {
            debug!("[SourceEngine] Scanning, ignoring frontend {:?}", event.status);
            return;
        }
        if !self.state.current_source.is_digital_tv() {
            return;
        }

        match event.status {
            FrontendStatus::Unlocked => {
                debug!(
                    "[SourceEngine] Frontend unlocked at {} Hz, re-checking",
                    event.frequency_hz
                );
                self.post(EngineEvent::FrontendRecheck, self.config.frontend_recheck_delay());
            }
            FrontendStatus::Locked => {
                if !self.state.current_signal.is_stable() {
                    self.apply_signal(RawSignal {
                        status_code: SignalStatus::Stable.code(),
                        info: SignalInfo::stable_without_format(),
                    });
                }
            }
        }
    }

    pub(super) fn on_frontend_recheck(&mut self) {
        if self.state.is_scanning() || !self.state.current_source.is_digital_tv() {
            return;
        }
        match self.devices.frontend.status() {
            Ok(FrontendStatus::Unlocked) => {
                info!("[SourceEngine] Frontend still unlocked, no signal");
                self.apply_signal(RawSignal {
                    status_code: SignalStatus::NoSignal.code(),
                    info: SignalInfo::null(),
                });
            }
            Ok(FrontendStatus::Locked) => {}
            Err(e) => warn!("[SourceEngine] Failed to read frontend status: {}", e),
        }
    }

    pub(super) fn on_enable_video_later(&mut self) {
        if self.state.is_blocked() || self.state.is_scanning() {
            return;
        }
        if !self.state.current_signal.is_stable() {
            debug!("[SourceEngine] Signal no longer stable, not enabling video");
            return;
        }
        self.show_video();
        best_effort("enable video", self.devices.decoder.enable_video());
    }

    pub(super) fn on_scanning_frame_stable(&mut self) {
        if !self.state.is_scanning() || !self.state.current_signal.is_stable() {
            return;
        }
        self.show_video();
        best_effort("enable video", self.devices.decoder.enable_video());
    }
}

#[cfg(test)]
mod tests {
    use tvsource_protocol::{
        AspectRatio, HdrType, ScanParams, ScanService, SignalFormat, SourceInput, WindowRect,
    };

    use super::*;
    use crate::config::EngineConfig;
    use crate::event::DetectorEvent;
    use crate::testing::Harness;

    const SIGNAL_CHANGE: EngineEvent = EngineEvent::Common(DetectorEvent::SignalChange);

    #[test]
    fn test_stable_then_stable_keeps_prior_current_as_previous() {
        let h = Harness::new();
        h.switch(SourceInput::Hdmi1);

        h.stable_signal(17);
        let first = h.engine.current_signal_info();
        h.stable_signal(17);

        assert_eq!(h.engine.previous_signal_info(), first);
        assert_eq!(h.engine.current_signal_info(), first);
    }

    #[test]
    fn test_dtv_null_unstable_stable_emits_once() {
        let h = Harness::new();
        h.switch(SourceInput::Dtv);
        h.clear();

        h.hw.push_signal(SignalStatus::Null.code(), SignalInfo::null());
        h.engine.handle(SIGNAL_CHANGE);
        h.hw.push_signal(SignalStatus::Unstable.code(), SignalInfo::null());
        h.engine.handle(SIGNAL_CHANGE);
        h.hw.push_signal_stable(3);
        h.engine.handle(SIGNAL_CHANGE);

        let infos = h.signal_infos();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].status, SignalStatus::Stable);
        assert_eq!(h.engine.previous_signal_info().status, SignalStatus::Unstable);
    }

    #[test]
    fn test_stable_hdmi_reads_hdr_and_persists() {
        let h = Harness::new();
        h.switch(SourceInput::Hdmi2);
        h.hw.set_hdr_aspect(HdrType::Hlg, AspectRatio::Ratio16x9);
        h.clear();

        h.stable_signal(20);
        let info = h.engine.current_signal_info();
        assert_eq!(info.hdr, HdrType::Hlg);
        assert_eq!(info.aspect, AspectRatio::Ratio16x9);
        assert_eq!(info.format, SignalFormat::Format(20));
        assert_eq!(h.db.get_source_info(SourceInput::Hdmi2).unwrap(), Some(info));
        assert_eq!(
            h.calls(),
            vec![
                "video_in.read_signal",
                "video_in.read_hdr_aspect",
                "pq.update_mode(HDMI2)",
                "decoder.start",
            ]
        );
        assert_eq!(h.engine.action(), Action::Playing);
        assert_eq!(h.engine.sender().len(), 1);
    }

    #[test]
    fn test_vrr_change_suppresses_still_stable() {
        let h = Harness::new();
        h.switch(SourceInput::Hdmi1);
        h.hw.set_vrr(true);
        h.clear();

        h.stable_signal(5);
        assert_eq!(
            h.events(),
            vec![TvEvent::VrrChange {
                source: SourceInput::Hdmi1,
                enabled: true
            }]
        );
        assert!(!h.calls().contains(&"decoder.start".to_string()));
        assert_eq!(h.engine.previous_signal_info(), SignalInfo::null());

        // VRR unchanged on the next reading: normal stable handling.
        h.clear();
        h.stable_signal(5);
        assert_eq!(h.signal_infos().len(), 1);
    }

    #[test]
    fn test_unrecognized_status_resets_snapshots() {
        let h = Harness::new();
        h.switch(SourceInput::Hdmi1);
        h.stable_signal(1);
        h.stable_signal(1);
        h.clear();

        h.hw.push_signal(42, SignalInfo::stable_without_format());
        h.engine.handle(SIGNAL_CHANGE);
        assert_eq!(h.engine.current_signal_info(), SignalInfo::null());
        assert_eq!(h.engine.previous_signal_info(), SignalInfo::null());
        assert!(h.events().is_empty());
    }

    #[test]
    fn test_failed_read_is_null() {
        let h = Harness::new();
        h.switch(SourceInput::Av1);
        h.stable_signal(1);
        h.clear();

        h.hw.fail("video_in.read_signal");
        h.engine.handle(SIGNAL_CHANGE);
        assert_eq!(h.engine.current_signal_info().status, SignalStatus::Null);
        assert!(h.events().is_empty());
    }

    #[test]
    fn test_unstable_external_source_shows_color() {
        let h = Harness::new();
        h.switch(SourceInput::Vga);
        h.clear();

        h.hw.push_signal(SignalStatus::Unstable.code(), SignalInfo::null());
        h.engine.handle(SIGNAL_CHANGE);
        assert_eq!(
            h.calls(),
            vec![
                "video_in.read_signal",
                "decoder.set_screen(Color(Blue))",
                "decoder.stop"
            ]
        );
        assert!(h.events().is_empty());
    }

    #[test]
    fn test_unstable_blocked_reports_block() {
        let h = Harness::new();
        h.db.set_channel_lock(true).unwrap();
        h.switch(SourceInput::Tv);
        h.engine.set_channel_block(true).unwrap();
        h.clear();

        h.hw.push_signal(SignalStatus::Unstable.code(), SignalInfo::null());
        h.engine.handle(SIGNAL_CHANGE);
        assert_eq!(
            h.calls(),
            vec!["video_in.read_signal", "decoder.set_screen(Color(Black))"]
        );
        assert_eq!(
            h.events(),
            vec![TvEvent::ChannelBlock {
                source: SourceInput::Tv,
                blocked: true
            }]
        );
    }

    #[test]
    fn test_no_signal_screen_choice() {
        // Blue preference.
        let h = Harness::new();
        h.switch(SourceInput::Hdmi3);
        h.clear();
        h.hw.push_signal(SignalStatus::NoSignal.code(), SignalInfo::null());
        h.engine.handle(SIGNAL_CHANGE);
        assert!(h.calls().contains(&"decoder.set_screen(Color(Blue))".to_string()));
        assert!(h.calls().contains(&"video_in.read_hdr_aspect".to_string()));
        assert_eq!(h.signal_infos().len(), 1);

        // Preview window forces black.
        h.engine
            .set_preview_window(WindowRect::new(10, 10, 320, 180))
            .unwrap();
        h.clear();
        h.hw.push_signal(SignalStatus::NotSupported.code(), SignalInfo::null());
        h.engine.handle(SIGNAL_CHANGE);
        assert!(h.calls().contains(&"decoder.set_screen(Color(Black))".to_string()));
        assert!(!h.calls().contains(&"video_in.read_hdr_aspect".to_string()));
    }

    #[test]
    fn test_analog_no_signal_snow() {
        let config = EngineConfig {
            screen_color: ScreenColor::Black,
            snow_on_no_signal: true,
            ..Harness::test_config()
        };
        let h = Harness::with_config(config);
        h.switch(SourceInput::Tv);
        h.clear();

        h.hw.push_signal(SignalStatus::NoSignal.code(), SignalInfo::null());
        h.engine.handle(SIGNAL_CHANGE);
        assert_eq!(h.calls(), vec!["video_in.read_signal", "decoder.set_screen(Snow)"]);
        assert_eq!(h.signal_infos().len(), 1);
    }

    #[test]
    fn test_scanning_suppresses_signal_info() {
        let h = Harness::new();
        h.switch(SourceInput::Tv);
        h.engine.start_scan(ScanParams::auto(ScanService::Atv)).unwrap();
        h.clear();

        for status in [
            SignalStatus::Stable,
            SignalStatus::Unstable,
            SignalStatus::NotSupported,
            SignalStatus::NoSignal,
        ] {
            h.hw.push_signal(status.code(), SignalInfo::null());
            h.engine.handle(SIGNAL_CHANGE);
        }

        assert!(h.signal_infos().is_empty());
        let snow = h
            .calls()
            .iter()
            .filter(|c| *c == "decoder.set_screen(Snow)")
            .count();
        assert_eq!(snow, 3);
        // The stable frame queued the scanning follow-up instead of the normal one.
        assert_eq!(h.engine.sender().len(), 1);
        h.engine.handle(EngineEvent::ScanningFrameStable);
    }

    #[test]
    fn test_scanning_without_snow_blanks() {
        let config = EngineConfig {
            snow_on_scan: false,
            ..Harness::test_config()
        };
        let h = Harness::with_config(config);
        h.switch(SourceInput::Tv);
        h.engine.start_scan(ScanParams::auto(ScanService::Atv)).unwrap();
        h.clear();

        h.hw.push_signal(SignalStatus::Unstable.code(), SignalInfo::null());
        h.engine.handle(SIGNAL_CHANGE);
        assert_eq!(
            h.calls(),
            vec!["video_in.read_signal", "decoder.disable_video", "decoder.stop"]
        );
        assert!(h.events().is_empty());
    }

    #[test]
    fn test_enable_video_later() {
        let h = Harness::new();
        h.switch(SourceInput::Hdmi1);
        h.stable_signal(9);
        h.clear();

        h.engine.handle(EngineEvent::EnableVideoLater);
        assert_eq!(
            h.calls(),
            vec!["decoder.set_screen(Video)", "decoder.enable_video"]
        );

        // Nothing once the signal is gone.
        h.hw.push_signal(SignalStatus::NoSignal.code(), SignalInfo::null());
        h.engine.handle(SIGNAL_CHANGE);
        h.clear();
        h.engine.handle(EngineEvent::EnableVideoLater);
        assert!(h.calls().is_empty());
    }

    #[test]
    fn test_frontend_unlock_recheck() {
        let h = Harness::new();
        h.switch(SourceInput::Dtv);
        h.clear();

        h.engine.handle(EngineEvent::FrontendState(FrontendEvent {
            status: FrontendStatus::Unlocked,
            frequency_hz: 557_000_000,
        }));
        assert_eq!(h.engine.sender().len(), 1);

        h.hw.set_frontend_status(FrontendStatus::Unlocked);
        h.engine.handle(EngineEvent::FrontendRecheck);
        assert_eq!(h.engine.current_signal_info().status, SignalStatus::NoSignal);
        assert_eq!(h.signal_infos().len(), 1);
    }

    #[test]
    fn test_frontend_lock_makes_dtv_stable() {
        let h = Harness::new();
        h.switch(SourceInput::Dtv);
        h.clear();

        let locked = EngineEvent::FrontendState(FrontendEvent {
            status: FrontendStatus::Locked,
            frequency_hz: 557_000_000,
        });
        h.engine.handle(locked.clone());
        assert_eq!(h.engine.current_signal_info(), SignalInfo::stable_without_format());
        assert_eq!(h.signal_infos().len(), 1);

        // Already stable: ignored.
        h.engine.handle(locked);
        assert_eq!(h.signal_infos().len(), 1);
    }

    #[test]
    fn test_frontend_events_ignored_for_external_sources() {
        let h = Harness::new();
        h.switch(SourceInput::Hdmi1);
        h.clear();
        h.engine.handle(EngineEvent::FrontendState(FrontendEvent {
            status: FrontendStatus::Unlocked,
            frequency_hz: 0,
        }));
        assert!(h.engine.sender().is_empty());
        assert!(h.calls().is_empty());
    }
}
