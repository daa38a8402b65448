//! Hardware collaborator interfaces.
//!
//! The engine drives the display pipeline only through these traits:
//! - [`Frontend`]: tuner/demodulator
//! - [`Demux`]: transport-stream demultiplexer(s)
//! - [`VideoIn`]: video-in port routing and signal detection
//! - [`Decoder`]: AV decoder and display layer
//! - [`PictureQuality`]: per-source picture settings
//! - [`Scanner`]: channel scanner
//! - [`ResourceManager`]: player/recorder pool
//! - [`SignalDetector`]: device-poll detector for plug and signal changes
//! - [`SettingsStore`] / [`ChannelStore`]: persisted state
//!
//! Implementations must not keep references handed to them past the call.
//! The [`null`] backend implements everything without touching hardware.

pub mod null;

use std::sync::Arc;

use thiserror::Error;

use tvsource_protocol::{
    AspectRatio, FrontendStatus, HdrType, InputPort, OwnershipClass, ProgramIds, ScanParams,
    ScreenColor, ServiceType, SignalInfo, SourceInput, WindowRect,
};

use crate::event::EngineEvent;
use crate::queue::EventSender;

pub use null::NullDevice;

/// Collaborator failures. The engine logs these and carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    #[error("Device not open: {0}")]
    NotOpen(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Frontend operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendMode {
    Analog,
    Digital,
    /// Auto-search mode used while scanning.
    Auto,
}

pub trait Frontend: Send + Sync {
    /// Open the frontend, or reconfigure it if already open.
    fn open(&self, mode: FrontendMode) -> DeviceResult<()>;
    fn close(&self) -> DeviceResult<()>;
    fn tune(&self, frequency_hz: u32) -> DeviceResult<()>;
    fn status(&self) -> DeviceResult<FrontendStatus>;
}

pub trait Demux: Send + Sync {
    /// Detach the demux from its current AV source binding.
    fn reset_bindings(&self, demux_id: u8) -> DeviceResult<()>;
    /// Route demux 0 to the default decoder.
    fn wire_default_path(&self) -> DeviceResult<()>;
}

/// Detector reading before the status code is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawSignal {
    pub status_code: i32,
    pub info: SignalInfo,
}

impl RawSignal {
    pub fn null() -> Self {
        Self::default()
    }
}

/// EDID blob stored for one HDMI port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdidRecord {
    pub port: u8,
    pub version: u8,
    pub data: Vec<u8>,
}

pub trait VideoIn: Send + Sync {
    fn switch_port(&self, port: InputPort) -> DeviceResult<()>;
    fn close_port(&self) -> DeviceResult<()>;
    fn read_signal(&self) -> DeviceResult<RawSignal>;
    fn read_hdr_aspect(&self) -> DeviceResult<(HdrType, AspectRatio)>;
    fn load_edid(&self, edid: &EdidRecord) -> DeviceResult<()>;
}

/// What the display layer shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenMode {
    Video,
    Color(ScreenColor),
    Snow,
}

pub trait Decoder: Send + Sync {
    fn start(&self) -> DeviceResult<()>;
    fn stop(&self) -> DeviceResult<()>;
    fn play_program(&self, program: &ProgramIds) -> DeviceResult<()>;
    fn set_screen(&self, mode: ScreenMode) -> DeviceResult<()>;
    fn enable_video(&self) -> DeviceResult<()>;
    fn disable_video(&self) -> DeviceResult<()>;
    fn set_window(&self, rect: WindowRect) -> DeviceResult<()>;
    /// Frame-sync AV mode, needed by digital TV.
    fn set_frame_sync(&self, enabled: bool) -> DeviceResult<()>;
}

pub trait PictureQuality: Send + Sync {
    /// Scaler path and sharpness curve for the newly selected source.
    fn apply_source_settings(&self, source: SourceInput, port: Option<InputPort>) -> DeviceResult<()>;
    /// CVBS format and HDMI color-range defaults.
    fn reset_input_defaults(&self, source: SourceInput) -> DeviceResult<()>;
    /// Recompute the PQ mode for a stable signal. Returns the resulting VRR state.
    fn update_mode(&self, source: SourceInput, info: &SignalInfo) -> DeviceResult<bool>;
}

pub trait Scanner: Send + Sync {
    /// Start a sweep. Progress is reported through `events`.
    fn start(&self, params: &ScanParams, events: EventSender<EngineEvent>) -> DeviceResult<()>;
    /// Probe a single known frequency.
    fn analyze(&self, frequency_hz: u32, events: EventSender<EngineEvent>) -> DeviceResult<()>;
    fn stop(&self) -> DeviceResult<()>;
    fn pause(&self) -> DeviceResult<()>;
    fn resume(&self) -> DeviceResult<()>;
}

pub trait ResourceManager: Send + Sync {
    /// Release every player and recorder bound to `class`.
    fn release_all(&self, class: OwnershipClass) -> DeviceResult<()>;
    /// Disconnect an external media client bound to the display path.
    fn kill_bound_client(&self) -> DeviceResult<()>;
}

pub trait SignalDetector: Send + Sync {
    /// Start polling. Signal and plug changes are posted to `events`.
    fn start(&self, events: EventSender<EngineEvent>) -> DeviceResult<()>;
    fn stop(&self) -> DeviceResult<()>;
    fn is_connected(&self, source: SourceInput) -> bool;
}

pub trait SettingsStore: Send + Sync {
    fn load_source(&self) -> DeviceResult<Option<SourceInput>>;
    fn save_source(&self, source: SourceInput) -> DeviceResult<()>;
    fn load_program(&self, class: OwnershipClass) -> DeviceResult<Option<ProgramIds>>;
    fn save_program(&self, class: OwnershipClass, program: &ProgramIds) -> DeviceResult<()>;
    fn load_edid(&self, port: u8) -> DeviceResult<Option<EdidRecord>>;
    fn save_edid(&self, edid: &EdidRecord) -> DeviceResult<()>;
    fn channel_lock_enabled(&self) -> DeviceResult<bool>;
    fn set_channel_lock_enabled(&self, enabled: bool) -> DeviceResult<()>;
    fn save_source_info(&self, source: SourceInput, info: &SignalInfo) -> DeviceResult<()>;
    fn set_dlg_enabled(&self, enabled: bool) -> DeviceResult<()>;
}

pub trait ChannelStore: Send + Sync {
    /// Delete rows of the given service types. Returns the number removed.
    fn clear_service_types(&self, types: &[ServiceType]) -> DeviceResult<usize>;
    /// Delete rows whose frequency falls in `[min_hz, max_hz]`.
    fn clear_frequency_range(&self, min_hz: u32, max_hz: u32) -> DeviceResult<usize>;
}

/// The full collaborator set handed to the engine.
#[derive(Clone)]
pub struct Devices {
    pub frontend: Arc<dyn Frontend>,
    pub demux: Arc<dyn Demux>,
    pub video_in: Arc<dyn VideoIn>,
    pub decoder: Arc<dyn Decoder>,
    pub pq: Arc<dyn PictureQuality>,
    pub scanner: Arc<dyn Scanner>,
    pub resources: Arc<dyn ResourceManager>,
    pub detector: Arc<dyn SignalDetector>,
    pub settings: Arc<dyn SettingsStore>,
    pub channels: Arc<dyn ChannelStore>,
}

impl Devices {
    /// Null hardware backed by the given storage.
    pub fn null(settings: Arc<dyn SettingsStore>, channels: Arc<dyn ChannelStore>) -> Self {
        let device = Arc::new(NullDevice::new());
        Self {
            frontend: device.clone(),
            demux: device.clone(),
            video_in: device.clone(),
            decoder: device.clone(),
            pq: device.clone(),
            scanner: device.clone(),
            resources: device.clone(),
            detector: device,
            settings,
            channels,
        }
    }
}
