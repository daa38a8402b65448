//! Null hardware backend.
//!
//! Accepts every call and reports an idle device: no signal on any port, an
//! unlocked frontend and nothing plugged in. Lets the daemon run on a host
//! without vendor drivers.

use std::collections::HashSet;

use log::debug;
use parking_lot::Mutex;

use tvsource_protocol::{
    AspectRatio, FrontendStatus, HdrType, InputPort, OwnershipClass, ProgramIds, ScanParams,
    SignalInfo, SignalStatus, SourceInput, WindowRect,
};

use super::{
    Decoder, Demux, DeviceError, DeviceResult, EdidRecord, Frontend, FrontendMode, PictureQuality,
    RawSignal, ResourceManager, Scanner, ScreenMode, SignalDetector, VideoIn,
};
use crate::event::EngineEvent;
use crate::queue::EventSender;

#[derive(Default)]
struct NullState {
    frontend: Option<FrontendMode>,
    port: Option<InputPort>,
    decoding: bool,
    connected: HashSet<SourceInput>,
}

/// Implements every hardware trait without touching hardware.
#[derive(Default)]
pub struct NullDevice {
    state: Mutex<NullState>,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a source as plugged in. Only affects [`SignalDetector::is_connected`].
    pub fn set_connected(&self, source: SourceInput, connected: bool) {
        let mut state = self.state.lock();
        if connected {
            state.connected.insert(source);
        } else {
            state.connected.remove(&source);
        }
    }

    pub fn frontend_mode(&self) -> Option<FrontendMode> {
        self.state.lock().frontend
    }

    pub fn active_port(&self) -> Option<InputPort> {
        self.state.lock().port
    }

    pub fn is_decoding(&self) -> bool {
        self.state.lock().decoding
    }
}

impl Frontend for NullDevice {
    fn open(&self, mode: FrontendMode) -> DeviceResult<()> {
        debug!("[NullDevice] Frontend open {:?}", mode);
        self.state.lock().frontend = Some(mode);
        Ok(())
    }

    fn close(&self) -> DeviceResult<()> {
        self.state.lock().frontend = None;
        Ok(())
    }

    fn tune(&self, frequency_hz: u32) -> DeviceResult<()> {
        if self.state.lock().frontend.is_none() {
            return Err(DeviceError::NotOpen("frontend".into()));
        }
        debug!("[NullDevice] Tune {} Hz", frequency_hz);
        Ok(())
    }

    fn status(&self) -> DeviceResult<FrontendStatus> {
        Ok(FrontendStatus::Unlocked)
    }
}

impl Demux for NullDevice {
    fn reset_bindings(&self, _demux_id: u8) -> DeviceResult<()> {
        Ok(())
    }

    fn wire_default_path(&self) -> DeviceResult<()> {
        Ok(())
    }
}

impl VideoIn for NullDevice {
    fn switch_port(&self, port: InputPort) -> DeviceResult<()> {
        debug!("[NullDevice] Switch port {:?}", port);
        self.state.lock().port = Some(port);
        Ok(())
    }

    fn close_port(&self) -> DeviceResult<()> {
        self.state.lock().port = None;
        Ok(())
    }

    fn read_signal(&self) -> DeviceResult<RawSignal> {
        let info = SignalInfo {
            status: SignalStatus::NoSignal,
            ..SignalInfo::null()
        };
        Ok(RawSignal {
            status_code: info.status.code(),
            info,
        })
    }

    fn read_hdr_aspect(&self) -> DeviceResult<(HdrType, AspectRatio)> {
        Ok((HdrType::None, AspectRatio::Unknown))
    }

    fn load_edid(&self, edid: &EdidRecord) -> DeviceResult<()> {
        debug!(
            "[NullDevice] Load EDID port {} v{} ({} bytes)",
            edid.port,
            edid.version,
            edid.data.len()
        );
        Ok(())
    }
}

impl Decoder for NullDevice {
    fn start(&self) -> DeviceResult<()> {
        self.state.lock().decoding = true;
        Ok(())
    }

    fn stop(&self) -> DeviceResult<()> {
        self.state.lock().decoding = false;
        Ok(())
    }

    fn play_program(&self, program: &ProgramIds) -> DeviceResult<()> {
        debug!("[NullDevice] Play service {}", program.service_id);
        self.state.lock().decoding = true;
        Ok(())
    }

    fn set_screen(&self, _mode: ScreenMode) -> DeviceResult<()> {
        Ok(())
    }

    fn enable_video(&self) -> DeviceResult<()> {
        Ok(())
    }

    fn disable_video(&self) -> DeviceResult<()> {
        Ok(())
    }

    fn set_window(&self, _rect: WindowRect) -> DeviceResult<()> {
        Ok(())
    }

    fn set_frame_sync(&self, _enabled: bool) -> DeviceResult<()> {
        Ok(())
    }
}

impl PictureQuality for NullDevice {
    fn apply_source_settings(&self, _source: SourceInput, _port: Option<InputPort>) -> DeviceResult<()> {
        Ok(())
    }

    fn reset_input_defaults(&self, _source: SourceInput) -> DeviceResult<()> {
        Ok(())
    }

    fn update_mode(&self, _source: SourceInput, _info: &SignalInfo) -> DeviceResult<bool> {
        Ok(false)
    }
}

impl Scanner for NullDevice {
    fn start(&self, params: &ScanParams, _events: EventSender<EngineEvent>) -> DeviceResult<()> {
        debug!("[NullDevice] Scan {:?} {:?}", params.kind, params.service);
        Ok(())
    }

    fn analyze(&self, _frequency_hz: u32, _events: EventSender<EngineEvent>) -> DeviceResult<()> {
        Ok(())
    }

    fn stop(&self) -> DeviceResult<()> {
        Ok(())
    }

    fn pause(&self) -> DeviceResult<()> {
        Ok(())
    }

    fn resume(&self) -> DeviceResult<()> {
        Ok(())
    }
}

impl ResourceManager for NullDevice {
    fn release_all(&self, class: OwnershipClass) -> DeviceResult<()> {
        debug!("[NullDevice] Release all {} resources", class.name());
        Ok(())
    }

    fn kill_bound_client(&self) -> DeviceResult<()> {
        Ok(())
    }
}

impl SignalDetector for NullDevice {
    fn start(&self, _events: EventSender<EngineEvent>) -> DeviceResult<()> {
        Ok(())
    }

    fn stop(&self) -> DeviceResult<()> {
        Ok(())
    }

    fn is_connected(&self, source: SourceInput) -> bool {
        self.state.lock().connected.contains(&source)
    }
}
