//! Source-switch sequencer.

use log::{debug, info, warn};

use tvsource_protocol::{EngineError, SignalInfo, SourceInput};

use super::{best_effort, Action, EngineCore};
use crate::device::FrontendMode;

impl EngineCore {
    /// Tear down the current source and bring up `source`.
    ///
    /// Collaborator failures are logged and skipped, except a failed port
    /// switch which is reported as [`EngineError::PortSwitchFailed`] after
    /// the sequence completes.
    pub(super) fn switch_source(
        &mut self,
        virtual_source: SourceInput,
        source: SourceInput,
    ) -> Result<(), EngineError> {
        if !source.is_valid() || source == SourceInput::Adtv {
            return Err(EngineError::InvalidParameter(format!(
                "{} cannot be selected as a real source",
                source
            )));
        }
        if self.state.action.is_transitioning() {
            return Err(EngineError::InvalidState(format!(
                "cannot switch source while {}",
                self.state.action.name()
            )));
        }

        let old = self.state.current_source;
        info!(
            "[SourceEngine] Switching {} -> {} (virtual {})",
            old, source, virtual_source
        );

        self.release_old_class(old, source);

        best_effort(
            "set frame sync",
            self.devices.decoder.set_frame_sync(source.is_digital_tv()),
        );

        if self.state.is_scanning() {
            self.force_stop_scan();
        }

        if source == old && !source.is_analog_tuner() {
            debug!("[SourceEngine] {} already selected", source);
            self.state.virtual_source = effective_virtual(virtual_source, source);
            return Ok(());
        }

        self.stop_playback(old, source);
        best_effort("kill bound client", self.devices.resources.kill_bound_client());
        let dropped = self
            .sender
            .remove_pending(|e| e.kind().is_video_follow_up());
        if dropped > 0 {
            debug!("[SourceEngine] Dropped {} stale video follow-up(s)", dropped);
        }
        self.state.action = Action::SourceSwitching;

        if source.is_analog_tuner() {
            best_effort("open analog frontend", self.devices.frontend.open(FrontendMode::Analog));
        } else if source.is_digital_tv() {
            best_effort("open digital frontend", self.devices.frontend.open(FrontendMode::Digital));
        } else if old.is_digital_tv() {
            best_effort("close frontend", self.devices.frontend.close());
        }

        // The virtual source is published before the real one.
        self.state.virtual_source = effective_virtual(virtual_source, source);
        self.state.last_source = old;
        self.state.current_source = source;
        self.state.current_signal = SignalInfo::null();
        if let Err(e) = self.devices.settings.save_source(source) {
            warn!("[SourceEngine] Failed to save source: {}", e);
        }

        if source.is_digital_tv() {
            self.prepare_demux_path(source);
        }

        let port = source.port();
        best_effort(
            "apply PQ source settings",
            self.devices.pq.apply_source_settings(source, port),
        );

        let mut result = Ok(());
        match (source.is_digital_tv(), port) {
            // The demux path already closed the port.
            (true, _) => {}
            (false, None) => {
                best_effort("close video-in port", self.devices.video_in.close_port());
                self.state.flags.in_video_pipeline = false;
            }
            (false, Some(port)) => match self.devices.video_in.switch_port(port) {
                Ok(()) => {
                    self.state.flags.in_video_pipeline = true;
                    if let Err(e) = self.devices.settings.set_dlg_enabled(source.is_hdmi()) {
                        warn!("[SourceEngine] Failed to update DLG state: {}", e);
                    }
                    if !source.is_audio_only() {
                        best_effort(
                            "reset input defaults",
                            self.devices.pq.reset_input_defaults(source),
                        );
                    }
                }
                Err(e) => {
                    warn!("[SourceEngine] Port switch to {:?} failed: {}", port, e);
                    self.state.flags.in_video_pipeline = false;
                    result = Err(EngineError::PortSwitchFailed(source));
                }
            },
        }

        if source.is_audio_only() {
            self.state.current_signal = SignalInfo::stable_without_format();
            self.emit_signal_info();
        }

        self.state.action = Action::Idle;
        info!("[SourceEngine] Now on {}", source);
        result
    }

    /// Release players and recorders of the class being left.
    fn release_old_class(&self, old: SourceInput, new: SourceInput) {
        let Some(new_class) = new.ownership_class() else {
            return;
        };
        let release = match old.ownership_class() {
            Some(old_class) if old_class != new_class => Some(old_class),
            Some(_) => None,
            // Nothing selected yet: make sure the other class holds nothing.
            None => Some(new_class.other()),
        };
        if let Some(class) = release {
            debug!("[SourceEngine] Releasing {} resources", class.name());
            best_effort("release resources", self.devices.resources.release_all(class));
        }
    }

    fn stop_playback(&mut self, old: SourceInput, new: SourceInput) {
        best_effort("disable video", self.devices.decoder.disable_video());
        best_effort("stop decoder", self.devices.decoder.stop());
        if old.is_analog_tuner() && !new.is_tuner() {
            best_effort("close analog frontend", self.devices.frontend.close());
        }
        if self.state.action == Action::Playing {
            self.state.action = Action::Idle;
        }
    }

    fn prepare_demux_path(&mut self, source: SourceInput) {
        for demux_id in self.config.demux_ids() {
            best_effort("reset demux bindings", self.devices.demux.reset_bindings(demux_id));
        }
        best_effort("stop decoder", self.devices.decoder.stop());
        best_effort("close video-in port", self.devices.video_in.close_port());
        self.state.flags.in_video_pipeline = false;
        best_effort("wire default path", self.devices.demux.wire_default_path());
        if let Err(e) = self
            .devices
            .settings
            .save_source_info(source, &SignalInfo::null())
        {
            warn!("[SourceEngine] Failed to save source info: {}", e);
        }
    }
}

fn effective_virtual(virtual_source: SourceInput, source: SourceInput) -> SourceInput {
    if virtual_source.is_valid() {
        virtual_source
    } else {
        source
    }
}
