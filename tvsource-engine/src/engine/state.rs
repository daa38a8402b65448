//! Engine state.

use std::collections::HashMap;

use tvsource_protocol::{BlockState, ScanParams, SignalInfo, SourceInput, WindowRect};

use crate::device::FrontendMode;

/// What the scanner is doing inside a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Sweeping, or idle after the sweep completed.
    Running,
    /// Probing a single frequency.
    Analyzing { frequency_hz: u32 },
}

/// What an analysis-only session puts back when it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalysisResume {
    /// Frontend mode of the selected source, `None` when it uses no tuner.
    pub frontend: Option<FrontendMode>,
    /// A program was playing when the analysis began.
    pub was_playing: bool,
}

impl AnalysisResume {
    pub fn capture(source: SourceInput, action: Action) -> Self {
        let frontend = if source.is_analog_tuner() {
            Some(FrontendMode::Analog)
        } else if source.is_digital_tv() {
            Some(FrontendMode::Digital)
        } else {
            None
        };
        Self {
            frontend,
            was_playing: action == Action::Playing,
        }
    }
}

/// State carried while [`Action::Scanning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSession {
    /// `None` for a session opened only to analyze one channel.
    pub params: Option<ScanParams>,
    pub mode: ScanMode,
    pub paused: bool,
    /// Only meaningful for analysis-only sessions.
    pub resume: AnalysisResume,
}

impl ScanSession {
    pub fn sweep(params: ScanParams) -> Self {
        Self {
            params: Some(params),
            mode: ScanMode::Running,
            paused: false,
            resume: AnalysisResume::default(),
        }
    }

    pub fn analysis(frequency_hz: u32, resume: AnalysisResume) -> Self {
        Self {
            params: None,
            mode: ScanMode::Analyzing { frequency_hz },
            paused: false,
            resume,
        }
    }

    pub fn is_analysis_only(&self) -> bool {
        self.params.is_none()
    }
}

/// The one thing the engine is doing. Scanning and source switching are
/// mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    #[default]
    Idle,
    Playing,
    Scanning(ScanSession),
    SourceSwitching,
    Stopping,
}

impl Action {
    pub fn is_scanning(&self) -> bool {
        matches!(self, Action::Scanning(_))
    }

    /// Busy with a transition that must not be re-entered.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Action::SourceSwitching | Action::Stopping)
    }

    pub fn scan_session(&self) -> Option<&ScanSession> {
        match self {
            Action::Scanning(session) => Some(session),
            _ => None,
        }
    }

    pub fn scan_session_mut(&mut self) -> Option<&mut ScanSession> {
        match self {
            Action::Scanning(session) => Some(session),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Idle => "idle",
            Action::Playing => "playing",
            Action::Scanning(_) => "scanning",
            Action::SourceSwitching => "source-switching",
            Action::Stopping => "stopping",
        }
    }
}

/// Flags that can be set alongside any [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineFlags {
    /// A video-in port is routed.
    pub in_video_pipeline: bool,
    /// A recorder reported that it is running.
    pub recording: bool,
}

impl PipelineFlags {
    pub fn is_clear(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    pub opened: bool,
    pub started: bool,
    pub action: Action,
    pub flags: PipelineFlags,
    pub current_source: SourceInput,
    pub last_source: SourceInput,
    pub virtual_source: SourceInput,
    pub current_signal: SignalInfo,
    /// Snapshot that was current before the last stable reading.
    pub previous_signal: SignalInfo,
    pub block: BlockState,
    pub last_block: BlockState,
    pub vrr_enabled: bool,
    /// Output window while in preview mode.
    pub preview: Option<WindowRect>,
    /// Last plug state reported per source.
    pub connections: HashMap<SourceInput, bool>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            opened: false,
            started: false,
            action: Action::Idle,
            flags: PipelineFlags::default(),
            current_source: SourceInput::Invalid,
            last_source: SourceInput::Invalid,
            virtual_source: SourceInput::Invalid,
            current_signal: SignalInfo::null(),
            previous_signal: SignalInfo::null(),
            block: BlockState::None,
            last_block: BlockState::None,
            vrr_enabled: false,
            preview: None,
            connections: HashMap::new(),
        }
    }
}

impl EngineState {
    /// Back to the initial state, keeping only the open flag.
    pub fn reset(&mut self) {
        let opened = self.opened;
        *self = Self {
            opened,
            ..Self::default()
        };
    }

    pub fn is_scanning(&self) -> bool {
        self.action.is_scanning()
    }

    pub fn is_blocked(&self) -> bool {
        self.block == BlockState::Blocked
    }
}
