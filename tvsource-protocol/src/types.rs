//! Source and signal type definitions shared by the engine and its clients.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of HDMI ports the video-in pipeline can route.
pub const HDMI_PORT_COUNT: u8 = 4;

/// Number of composite (CVBS) inputs.
pub const CVBS_PORT_COUNT: u8 = 2;

/// Input source identifiers.
///
/// The numeric values are the ones stored in settings and sent over the
/// client transport, so they must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(i32)]
pub enum SourceInput {
    /// Analog tuner (ATV).
    Tv = 0,
    /// Composite input 1.
    Av1 = 1,
    /// Composite input 2.
    Av2 = 2,
    /// S-Video input.
    Svideo = 3,
    /// HDMI port 1.
    Hdmi1 = 5,
    /// HDMI port 2.
    Hdmi2 = 6,
    /// HDMI port 3.
    Hdmi3 = 7,
    /// HDMI port 4.
    Hdmi4 = 8,
    /// VGA input.
    Vga = 9,
    /// Digital tuner.
    Dtv = 11,
    /// All-digital-TV grouping. Only meaningful as a virtual source.
    Adtv = 12,
    /// Network stream.
    Iptv = 13,
    /// Digital audio input, no video.
    Spdif = 14,
    /// No source selected.
    #[default]
    Invalid = -1,
}

impl From<i32> for SourceInput {
    fn from(value: i32) -> Self {
        match value {
            0 => SourceInput::Tv,
            1 => SourceInput::Av1,
            2 => SourceInput::Av2,
            3 => SourceInput::Svideo,
            5 => SourceInput::Hdmi1,
            6 => SourceInput::Hdmi2,
            7 => SourceInput::Hdmi3,
            8 => SourceInput::Hdmi4,
            9 => SourceInput::Vga,
            11 => SourceInput::Dtv,
            12 => SourceInput::Adtv,
            13 => SourceInput::Iptv,
            14 => SourceInput::Spdif,
            _ => SourceInput::Invalid,
        }
    }
}

impl From<SourceInput> for i32 {
    fn from(value: SourceInput) -> Self {
        value as i32
    }
}

impl SourceInput {
    /// Every selectable source, in menu order.
    pub const ALL: [SourceInput; 13] = [
        SourceInput::Tv,
        SourceInput::Dtv,
        SourceInput::Adtv,
        SourceInput::Av1,
        SourceInput::Av2,
        SourceInput::Svideo,
        SourceInput::Hdmi1,
        SourceInput::Hdmi2,
        SourceInput::Hdmi3,
        SourceInput::Hdmi4,
        SourceInput::Vga,
        SourceInput::Iptv,
        SourceInput::Spdif,
    ];

    /// Returns true for anything other than [`SourceInput::Invalid`].
    pub fn is_valid(self) -> bool {
        self != SourceInput::Invalid
    }

    pub fn is_hdmi(self) -> bool {
        self.hdmi_index().is_some()
    }

    /// Zero-based HDMI port index.
    pub fn hdmi_index(self) -> Option<u8> {
        match self {
            SourceInput::Hdmi1 => Some(0),
            SourceInput::Hdmi2 => Some(1),
            SourceInput::Hdmi3 => Some(2),
            SourceInput::Hdmi4 => Some(3),
            _ => None,
        }
    }

    /// Analog or digital tuner, including the all-digital grouping.
    pub fn is_tuner(self) -> bool {
        matches!(self, SourceInput::Tv | SourceInput::Dtv | SourceInput::Adtv)
    }

    pub fn is_analog_tuner(self) -> bool {
        self == SourceInput::Tv
    }

    /// Sources decoded from a transport stream through the demux path.
    pub fn is_digital_tv(self) -> bool {
        matches!(self, SourceInput::Dtv | SourceInput::Adtv)
    }

    /// Sources that carry audio only and therefore never report a video signal.
    pub fn is_audio_only(self) -> bool {
        self == SourceInput::Spdif
    }

    /// Which player/recorder ownership class the source belongs to.
    pub fn ownership_class(self) -> Option<OwnershipClass> {
        match self {
            SourceInput::Invalid => None,
            s if s.is_tuner() => Some(OwnershipClass::Tuner),
            _ => Some(OwnershipClass::External),
        }
    }

    /// Hardware port that carries this source into the video-in pipeline.
    ///
    /// Digital TV and IPTV are fed through the demux path and have no port.
    pub fn port(self) -> Option<InputPort> {
        match self {
            SourceInput::Tv => Some(InputPort::Tuner),
            SourceInput::Av1 => Some(InputPort::Cvbs(0)),
            SourceInput::Av2 => Some(InputPort::Cvbs(1)),
            SourceInput::Svideo => Some(InputPort::Svideo),
            SourceInput::Vga => Some(InputPort::Vga),
            SourceInput::Spdif => Some(InputPort::Spdif),
            s => s.hdmi_index().map(InputPort::Hdmi),
        }
    }

    /// Short name used in logs and settings.
    pub fn name(self) -> &'static str {
        match self {
            SourceInput::Tv => "TV",
            SourceInput::Av1 => "AV1",
            SourceInput::Av2 => "AV2",
            SourceInput::Svideo => "SVIDEO",
            SourceInput::Hdmi1 => "HDMI1",
            SourceInput::Hdmi2 => "HDMI2",
            SourceInput::Hdmi3 => "HDMI3",
            SourceInput::Hdmi4 => "HDMI4",
            SourceInput::Vga => "VGA",
            SourceInput::Dtv => "DTV",
            SourceInput::Adtv => "ADTV",
            SourceInput::Iptv => "IPTV",
            SourceInput::Spdif => "SPDIF",
            SourceInput::Invalid => "INVALID",
        }
    }

    /// Parse a source from its short name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        Self::ALL.iter().copied().find(|s| s.name() == upper)
    }
}

impl fmt::Display for SourceInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Grouping of sources that decides which players and recorders must be
/// released when the selection moves between groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnershipClass {
    /// Tuner-based sources (ATV, DTV, ADTV).
    Tuner,
    /// Everything plugged in from outside.
    External,
}

impl OwnershipClass {
    pub fn name(self) -> &'static str {
        match self {
            OwnershipClass::Tuner => "tuner",
            OwnershipClass::External => "external",
        }
    }

    pub fn other(self) -> Self {
        match self {
            OwnershipClass::Tuner => OwnershipClass::External,
            OwnershipClass::External => OwnershipClass::Tuner,
        }
    }
}

/// Physical video-in port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputPort {
    Tuner,
    Cvbs(u8),
    Svideo,
    Hdmi(u8),
    Vga,
    Spdif,
}

/// Video format reported by the signal detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignalFormat {
    /// No format (no video, or audio-only source).
    #[default]
    None,
    /// Signal present but the format id could not be resolved.
    Unknown,
    /// Vendor format id (resolution/timing table index).
    Format(u32),
}

/// 2D/3D transmission format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransFormat {
    #[default]
    TwoD,
    FramePacking,
    SideBySideFull,
    TopBottom,
    SideBySideHalf,
}

/// Electrical state of the selected source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignalStatus {
    #[default]
    Null,
    NoSignal,
    Unstable,
    NotSupported,
    Stable,
}

impl SignalStatus {
    /// Map a raw detector status code. Unknown codes yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(SignalStatus::Null),
            1 => Some(SignalStatus::NoSignal),
            2 => Some(SignalStatus::Unstable),
            3 => Some(SignalStatus::NotSupported),
            4 => Some(SignalStatus::Stable),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            SignalStatus::Null => 0,
            SignalStatus::NoSignal => 1,
            SignalStatus::Unstable => 2,
            SignalStatus::NotSupported => 3,
            SignalStatus::Stable => 4,
        }
    }
}

/// HDR metadata tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HdrType {
    #[default]
    None,
    Hdr10,
    Hdr10Plus,
    Hlg,
    DolbyVision,
}

/// Aspect ratio tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    Unknown,
    Ratio4x3,
    Ratio16x9,
    Ratio14x9,
}

/// Snapshot of the selected source's signal at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalInfo {
    pub format: SignalFormat,
    pub trans_format: TransFormat,
    pub status: SignalStatus,
    pub hdr: HdrType,
    pub aspect: AspectRatio,
    /// DVI (no HDMI infoframes) rather than HDMI.
    pub is_dvi: bool,
    /// ALLM / game-mode request from the source.
    pub low_latency: bool,
    /// Estimated frames per second, 0 when unknown.
    pub fps: u32,
}

impl SignalInfo {
    /// The re-initialized snapshot.
    pub fn null() -> Self {
        Self::default()
    }

    /// Snapshot reported for audio-only sources and freshly tuned digital TV.
    pub fn stable_without_format() -> Self {
        Self {
            status: SignalStatus::Stable,
            ..Self::default()
        }
    }

    pub fn is_stable(&self) -> bool {
        self.status == SignalStatus::Stable
    }
}

/// Channel-lock evaluation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlockState {
    #[default]
    None,
    Blocked,
    Unblocked,
}

/// Solid color shown in place of live video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenColor {
    #[default]
    Black,
    Blue,
}

/// Output window rectangle. A zero-sized rectangle means full screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn full_screen() -> Self {
        Self::default()
    }

    pub fn is_full_screen(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Kind of channel scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanKind {
    /// Sweep the whole band.
    Auto,
    /// Sweep a caller-provided frequency range.
    Manual,
}

/// Which broadcast services a scan looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanService {
    Atv,
    Dtv,
    All,
}

/// Service type of a stored channel row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    Atv,
    Dtv,
    Radio,
    Data,
}

impl ServiceType {
    pub fn code(self) -> u8 {
        match self {
            ServiceType::Atv => 0,
            ServiceType::Dtv => 1,
            ServiceType::Radio => 2,
            ServiceType::Data => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ServiceType::Atv),
            1 => Some(ServiceType::Dtv),
            2 => Some(ServiceType::Radio),
            3 => Some(ServiceType::Data),
            _ => None,
        }
    }
}

impl ScanService {
    /// Channel rows an auto scan replaces.
    pub fn service_types(self) -> &'static [ServiceType] {
        match self {
            ScanService::Atv => &[ServiceType::Atv],
            ScanService::Dtv => &[ServiceType::Dtv, ServiceType::Radio, ServiceType::Data],
            ScanService::All => &[
                ServiceType::Atv,
                ServiceType::Dtv,
                ServiceType::Radio,
                ServiceType::Data,
            ],
        }
    }
}

/// Parameters for a channel scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanParams {
    pub kind: ScanKind,
    pub service: ScanService,
    /// Lower bound for manual scans (Hz).
    pub min_freq_hz: u32,
    /// Upper bound for manual scans (Hz).
    pub max_freq_hz: u32,
}

impl ScanParams {
    pub fn auto(service: ScanService) -> Self {
        Self {
            kind: ScanKind::Auto,
            service,
            min_freq_hz: 0,
            max_freq_hz: 0,
        }
    }

    pub fn manual(service: ScanService, min_freq_hz: u32, max_freq_hz: u32) -> Self {
        Self {
            kind: ScanKind::Manual,
            service,
            min_freq_hz,
            max_freq_hz,
        }
    }

    /// Manual scans need a non-empty frequency range.
    pub fn is_valid(&self) -> bool {
        match self.kind {
            ScanKind::Auto => true,
            ScanKind::Manual => self.min_freq_hz > 0 && self.min_freq_hz <= self.max_freq_hz,
        }
    }
}

/// Identifiers of a program to decode on a tuner source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgramIds {
    pub frequency_hz: u32,
    pub service_id: u16,
    pub video_pid: u16,
    pub audio_pid: u16,
    pub pcr_pid: u16,
}
