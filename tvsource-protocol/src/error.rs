//! Error types for the tvsource engine boundary.

use thiserror::Error;

use crate::types::SourceInput;

/// Errors returned by the engine's public operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// An operation other than `open` was called before `open`.
    #[error("Engine is not open")]
    NotOpen,

    /// `open` was called twice.
    #[error("Engine is already open")]
    AlreadyOpen,

    /// The requested operation conflicts with the current action.
    #[error("Invalid engine state: {0}")]
    InvalidState(String),

    /// A parameter was out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The video-in port could not be switched to the new source.
    #[error("Failed to switch video-in port for {0}")]
    PortSwitchFailed(SourceInput),

    /// A collaborator failed and the operation could not complete.
    #[error("Device error: {0}")]
    Device(String),
}

impl EngineError {
    /// Integer status code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::NotOpen => ErrorCode::NotOpen,
            EngineError::AlreadyOpen => ErrorCode::InvalidState,
            EngineError::InvalidState(_) => ErrorCode::InvalidState,
            EngineError::InvalidParameter(_) => ErrorCode::InvalidParameter,
            EngineError::PortSwitchFailed(_) => ErrorCode::PortSwitchFailed,
            EngineError::Device(_) => ErrorCode::DeviceFailure,
        }
    }
}

/// Status code returned across the client transport. Zero is success,
/// everything else is negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    /// Operation succeeded.
    Success = 0,
    /// Unknown error occurred.
    Unknown = -1,
    /// Engine not open.
    NotOpen = -2,
    /// Operation not allowed in the current state.
    InvalidState = -3,
    /// Invalid parameter.
    InvalidParameter = -4,
    /// Collaborator failure.
    DeviceFailure = -5,
    /// Video-in port switch failed.
    PortSwitchFailed = -6,
}

impl From<i32> for ErrorCode {
    fn from(value: i32) -> Self {
        match value {
            0 => ErrorCode::Success,
            -2 => ErrorCode::NotOpen,
            -3 => ErrorCode::InvalidState,
            -4 => ErrorCode::InvalidParameter,
            -5 => ErrorCode::DeviceFailure,
            -6 => ErrorCode::PortSwitchFailed,
            _ => ErrorCode::Unknown,
        }
    }
}

impl From<ErrorCode> for i32 {
    fn from(value: ErrorCode) -> Self {
        value as i32
    }
}

impl ErrorCode {
    /// Returns true if this error code indicates success.
    pub fn is_success(self) -> bool {
        self == ErrorCode::Success
    }
}

/// Collapse an operation result into the integer status clients expect.
pub fn status_of<T>(result: &Result<T, EngineError>) -> i32 {
    match result {
        Ok(_) => ErrorCode::Success.into(),
        Err(e) => e.code().into(),
    }
}
