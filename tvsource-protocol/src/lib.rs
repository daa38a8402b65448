//! Type definitions for the tvsource source/signal engine.
//!
//! This crate defines the values exchanged between the engine, its hardware
//! collaborators and client processes: source identities, signal snapshots,
//! scan parameters, event payloads and status codes.
//!
//! # Example
//!
//! ```rust
//! use tvsource_protocol::{OwnershipClass, SignalInfo, SignalStatus, SourceInput};
//!
//! let source = SourceInput::from(6);
//! assert_eq!(source, SourceInput::Hdmi2);
//! assert_eq!(source.ownership_class(), Some(OwnershipClass::External));
//!
//! let info = SignalInfo::stable_without_format();
//! assert_eq!(info.status, SignalStatus::Stable);
//! ```
//!
//! # Status Codes
//!
//! Every engine operation returns `Result<_, EngineError>`. Clients on the
//! other side of the transport only see an integer status:
//!
//! ```rust
//! use tvsource_protocol::{status_of, EngineError};
//!
//! let failed: Result<(), EngineError> = Err(EngineError::NotOpen);
//! assert_eq!(status_of(&failed), -2);
//! ```

pub mod error;
pub mod event;
pub mod types;

pub use error::{status_of, EngineError, ErrorCode};
pub use event::{
    AvPlaybackKind, EpgEvent, EpgEventKind, FrontendEvent, FrontendStatus, RecordEvent,
    RecordStatus, ResourceEvent, ResourceEventKind, ScannerEvent, ScannerEventKind,
    SectionPayload, TvEvent,
};
pub use types::{
    AspectRatio, BlockState, HdrType, InputPort, OwnershipClass, ProgramIds, ScanKind, ScanParams,
    ScanService, ScreenColor, ServiceType, SignalFormat, SignalInfo, SignalStatus, SourceInput,
    TransFormat, WindowRect, CVBS_PORT_COUNT, HDMI_PORT_COUNT,
};
