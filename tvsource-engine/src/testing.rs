//! Test doubles: a recording hardware backend and an engine harness.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use tvsource_protocol::{
    AspectRatio, FrontendStatus, HdrType, InputPort, OwnershipClass, ProgramIds, ScanParams,
    SignalFormat, SignalInfo, SignalStatus, SourceInput, TvEvent, WindowRect,
};

use crate::config::EngineConfig;
use crate::database::Database;
use crate::device::{
    Decoder, DeviceError, DeviceResult, Demux, Devices, EdidRecord, Frontend, FrontendMode,
    PictureQuality, RawSignal, ResourceManager, Scanner, ScreenMode, SignalDetector, VideoIn,
};
use crate::engine::{Action, SourceEngine};
use crate::event::{DetectorEvent, EngineEvent};
use crate::observer::EngineObserver;
use crate::queue::EventSender;

/// Hardware backend that records every call as a string.
pub(crate) struct RecordingDevice {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    signals: Mutex<VecDeque<RawSignal>>,
    hdr_aspect: Mutex<(HdrType, AspectRatio)>,
    vrr: Mutex<bool>,
    frontend_status: Mutex<FrontendStatus>,
    connected: Mutex<HashMap<SourceInput, bool>>,
}

impl RecordingDevice {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            signals: Mutex::new(VecDeque::new()),
            hdr_aspect: Mutex::new((HdrType::None, AspectRatio::Unknown)),
            vrr: Mutex::new(false),
            frontend_status: Mutex::new(FrontendStatus::Locked),
            connected: Mutex::new(HashMap::new()),
        }
    }

    /// Log `call`. Fails if its name (the part before any argument list) was
    /// marked with [`RecordingDevice::fail`].
    fn record(&self, call: String) -> DeviceResult<()> {
        let name = call.split('(').next().unwrap_or_default().to_string();
        self.calls.lock().push(call);
        if self.failing.lock().contains(&name) {
            return Err(DeviceError::Io(format!("{} failed", name)));
        }
        Ok(())
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub(crate) fn fail(&self, name: &str) {
        self.failing.lock().insert(name.to_string());
    }

    pub(crate) fn push_signal(&self, status_code: i32, info: SignalInfo) {
        self.signals.lock().push_back(RawSignal { status_code, info });
    }

    pub(crate) fn push_signal_stable(&self, format: u32) {
        self.push_signal(
            SignalStatus::Stable.code(),
            SignalInfo {
                format: SignalFormat::Format(format),
                status: SignalStatus::Stable,
                ..SignalInfo::null()
            },
        );
    }

    pub(crate) fn set_hdr_aspect(&self, hdr: HdrType, aspect: AspectRatio) {
        *self.hdr_aspect.lock() = (hdr, aspect);
    }

    pub(crate) fn set_vrr(&self, enabled: bool) {
        *self.vrr.lock() = enabled;
    }

    pub(crate) fn set_frontend_status(&self, status: FrontendStatus) {
        *self.frontend_status.lock() = status;
    }

    pub(crate) fn set_connected(&self, source: SourceInput, connected: bool) {
        self.connected.lock().insert(source, connected);
    }
}

impl Frontend for RecordingDevice {
    fn open(&self, mode: FrontendMode) -> DeviceResult<()> {
        self.record(format!("frontend.open({:?})", mode))
    }

    fn close(&self) -> DeviceResult<()> {
        self.record("frontend.close".into())
    }

    fn tune(&self, frequency_hz: u32) -> DeviceResult<()> {
        self.record(format!("frontend.tune({})", frequency_hz))
    }

    fn status(&self) -> DeviceResult<FrontendStatus> {
        self.record("frontend.status".into())?;
        Ok(*self.frontend_status.lock())
    }
}

impl Demux for RecordingDevice {
    fn reset_bindings(&self, demux_id: u8) -> DeviceResult<()> {
        self.record(format!("demux.reset_bindings({})", demux_id))
    }

    fn wire_default_path(&self) -> DeviceResult<()> {
        self.record("demux.wire_default_path".into())
    }
}

impl VideoIn for RecordingDevice {
    fn switch_port(&self, port: InputPort) -> DeviceResult<()> {
        self.record(format!("video_in.switch_port({:?})", port))
    }

    fn close_port(&self) -> DeviceResult<()> {
        self.record("video_in.close_port".into())
    }

    fn read_signal(&self) -> DeviceResult<RawSignal> {
        self.record("video_in.read_signal".into())?;
        Ok(self.signals.lock().pop_front().unwrap_or_else(RawSignal::null))
    }

    fn read_hdr_aspect(&self) -> DeviceResult<(HdrType, AspectRatio)> {
        self.record("video_in.read_hdr_aspect".into())?;
        Ok(*self.hdr_aspect.lock())
    }

    fn load_edid(&self, edid: &EdidRecord) -> DeviceResult<()> {
        self.record(format!("video_in.load_edid({})", edid.port))
    }
}

impl Decoder for RecordingDevice {
    fn start(&self) -> DeviceResult<()> {
        self.record("decoder.start".into())
    }

    fn stop(&self) -> DeviceResult<()> {
        self.record("decoder.stop".into())
    }

    fn play_program(&self, program: &ProgramIds) -> DeviceResult<()> {
        self.record(format!("decoder.play_program({})", program.service_id))
    }

    fn set_screen(&self, mode: ScreenMode) -> DeviceResult<()> {
        self.record(format!("decoder.set_screen({:?})", mode))
    }

    fn enable_video(&self) -> DeviceResult<()> {
        self.record("decoder.enable_video".into())
    }

    fn disable_video(&self) -> DeviceResult<()> {
        self.record("decoder.disable_video".into())
    }

    fn set_window(&self, rect: WindowRect) -> DeviceResult<()> {
        self.record(format!("decoder.set_window({}x{})", rect.width, rect.height))
    }

    fn set_frame_sync(&self, enabled: bool) -> DeviceResult<()> {
        self.record(format!("decoder.set_frame_sync({})", enabled))
    }
}

impl PictureQuality for RecordingDevice {
    fn apply_source_settings(&self, source: SourceInput, port: Option<InputPort>) -> DeviceResult<()> {
        self.record(format!("pq.apply_source_settings({}, {:?})", source, port))
    }

    fn reset_input_defaults(&self, source: SourceInput) -> DeviceResult<()> {
        self.record(format!("pq.reset_input_defaults({})", source))
    }

    fn update_mode(&self, source: SourceInput, _info: &SignalInfo) -> DeviceResult<bool> {
        self.record(format!("pq.update_mode({})", source))?;
        Ok(*self.vrr.lock())
    }
}

impl Scanner for RecordingDevice {
    fn start(&self, params: &ScanParams, _events: EventSender<EngineEvent>) -> DeviceResult<()> {
        self.record(format!("scanner.start({:?}, {:?})", params.kind, params.service))
    }

    fn analyze(&self, frequency_hz: u32, _events: EventSender<EngineEvent>) -> DeviceResult<()> {
        self.record(format!("scanner.analyze({})", frequency_hz))
    }

    fn stop(&self) -> DeviceResult<()> {
        self.record("scanner.stop".into())
    }

    fn pause(&self) -> DeviceResult<()> {
        self.record("scanner.pause".into())
    }

    fn resume(&self) -> DeviceResult<()> {
        self.record("scanner.resume".into())
    }
}

impl ResourceManager for RecordingDevice {
    fn release_all(&self, class: OwnershipClass) -> DeviceResult<()> {
        self.record(format!("resources.release_all({})", class.name()))
    }

    fn kill_bound_client(&self) -> DeviceResult<()> {
        self.record("resources.kill_bound_client".into())
    }
}

impl SignalDetector for RecordingDevice {
    fn start(&self, _events: EventSender<EngineEvent>) -> DeviceResult<()> {
        self.record("detector.start".into())
    }

    fn stop(&self) -> DeviceResult<()> {
        self.record("detector.stop".into())
    }

    fn is_connected(&self, source: SourceInput) -> bool {
        self.connected.lock().get(&source).copied().unwrap_or(false)
    }
}

#[derive(Default)]
pub(crate) struct CollectingObserver {
    events: Mutex<Vec<TvEvent>>,
}

impl EngineObserver for CollectingObserver {
    fn on_event(&self, event: TvEvent) {
        self.events.lock().push(event);
    }
}

/// An engine wired to a [`RecordingDevice`] and an in-memory database.
pub(crate) struct Harness {
    pub engine: Arc<SourceEngine>,
    pub hw: Arc<RecordingDevice>,
    pub db: Arc<Database>,
    observer: Arc<CollectingObserver>,
}

impl Harness {
    /// Opened engine with [`Harness::test_config`].
    pub(crate) fn new() -> Self {
        Self::with_config(Self::test_config())
    }

    pub(crate) fn unopened() -> Self {
        Self::build(Self::test_config())
    }

    /// Opened engine with `config`. The recorded calls start empty.
    pub(crate) fn with_config(config: EngineConfig) -> Self {
        let h = Self::build(config);
        h.engine.open().unwrap();
        h.clear();
        h
    }

    /// Defaults with follow-up delays long enough that nothing fires while a
    /// test runs.
    pub(crate) fn test_config() -> EngineConfig {
        EngineConfig {
            enable_video_delay_ms: 60_000,
            video_available_delay_ms: 60_000,
            frontend_recheck_delay_ms: 60_000,
            source_check_delay_ms: 60_000,
            ..EngineConfig::default()
        }
    }

    fn build(config: EngineConfig) -> Self {
        let hw = Arc::new(RecordingDevice::new());
        let db = Arc::new(Database::open_in_memory().unwrap());
        let devices = Devices {
            frontend: hw.clone(),
            demux: hw.clone(),
            video_in: hw.clone(),
            decoder: hw.clone(),
            pq: hw.clone(),
            scanner: hw.clone(),
            resources: hw.clone(),
            detector: hw.clone(),
            settings: db.clone(),
            channels: db.clone(),
        };
        let engine = SourceEngine::new(devices, config);
        let observer = Arc::new(CollectingObserver::default());
        engine.set_observer(Some(observer.clone()));
        Self {
            engine,
            hw,
            db,
            observer,
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.hw.calls()
    }

    pub(crate) fn clear_calls(&self) {
        self.hw.clear_calls();
    }

    /// Forget recorded calls and delivered events.
    pub(crate) fn clear(&self) {
        self.hw.clear_calls();
        self.observer.events.lock().clear();
    }

    pub(crate) fn events(&self) -> Vec<TvEvent> {
        self.observer.events.lock().clone()
    }

    pub(crate) fn signal_infos(&self) -> Vec<SignalInfo> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TvEvent::SignalInfo { info, .. } => Some(info),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn switch(&self, source: SourceInput) {
        self.engine.switch_source(source, source).unwrap();
    }

    /// Report a stable signal with the given format id and let the engine
    /// read it.
    pub(crate) fn stable_signal(&self, format: u32) {
        self.hw.push_signal_stable(format);
        self.engine
            .handle(EngineEvent::Common(DetectorEvent::SignalChange));
    }

    pub(crate) fn set_action(&self, action: Action) {
        self.engine.set_action(action);
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.engine.close();
    }
}
