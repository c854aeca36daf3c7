use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Unified result type for the Roost window core.
pub type Result<T> = std::result::Result<T, WindowError>;

/// Stable numeric code attached to every diagnostic the framework emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DiagnosticCode(pub u32);

impl DiagnosticCode {
    pub const ALREADY_OPEN: Self = Self(0x000001);
    pub const AD_HOC_LISTENER: Self = Self(0x000002);
    pub const DISPATCH_ESCALATED: Self = Self(0x000003);
    pub const HANDLER_FAILED: Self = Self(0x000004);
    pub const REGISTRATION_REJECTED: Self = Self(0x000005);
    pub const NOT_OPEN: Self = Self(0x000006);
    pub const RENDER_FAILED: Self = Self(0x000007);
    pub const UNSUPPORTED_STRUCTURE: Self = Self(0x000008);
    pub const ALREADY_CLOSED: Self = Self(0x000009);
    pub const CLOSE_IN_PROGRESS: Self = Self(0x00000A);
    pub const CLOSE_VETOED: Self = Self(0x00000B);
    pub const CLOSE_DEFERRED: Self = Self(0x00000C);
    pub const SURFACE: Self = Self(0x00000D);
    pub const LISTENER_REENTERED: Self = Self(0x00000E);
    pub const FORCED_CLOSE: Self = Self(0x00000F);
    pub const IO: Self = Self(0x000010);
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:06X}", self.0)
    }
}

/// Errors surfaced by the window lifecycle and dispatch core.
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("open failed because the window is already open")]
    AlreadyOpen,
    #[error("a close is already queued")]
    CloseInProgress,
    #[error("the window is already closed")]
    AlreadyClosed,
    #[error("close canceled by script `{script}`")]
    CloseVetoed { script: String },
    #[error("close requested from the update loop; it runs at the end of the current tick")]
    CloseDeferred,
    #[error("the window is not open")]
    NotOpen,
    #[error("no drawable surface was published in time")]
    SurfaceUnavailable,
    #[error("a drawable surface is already published for this window")]
    SurfaceAlreadyPublished,
    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WindowError {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            WindowError::AlreadyOpen => DiagnosticCode::ALREADY_OPEN,
            WindowError::CloseInProgress => DiagnosticCode::CLOSE_IN_PROGRESS,
            WindowError::AlreadyClosed => DiagnosticCode::ALREADY_CLOSED,
            WindowError::CloseVetoed { .. } => DiagnosticCode::CLOSE_VETOED,
            WindowError::CloseDeferred => DiagnosticCode::CLOSE_DEFERRED,
            WindowError::NotOpen => DiagnosticCode::NOT_OPEN,
            WindowError::SurfaceUnavailable
            | WindowError::SurfaceAlreadyPublished
            | WindowError::Surface(_) => DiagnosticCode::SURFACE,
            WindowError::Io(_) => DiagnosticCode::IO,
        }
    }
}

/// Failures reported by a drawable surface. Always recoverable per call.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("surface rejected the call: {0}")]
    Rejected(String),
    #[error("surface does not support `{0}`")]
    Unsupported(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure reported by an event handler.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for HandlerError {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for HandlerError {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_as_six_hex_digits() {
        assert_eq!(DiagnosticCode::ALREADY_OPEN.to_string(), "0x000001");
        assert_eq!(DiagnosticCode::CLOSE_IN_PROGRESS.to_string(), "0x00000A");
    }

    #[test]
    fn errors_map_to_stable_codes() {
        assert_eq!(WindowError::AlreadyOpen.code(), DiagnosticCode::ALREADY_OPEN);
        assert_eq!(WindowError::NotOpen.code(), DiagnosticCode::NOT_OPEN);
        let surface = WindowError::from(SurfaceError::Rejected("nope".into()));
        assert_eq!(surface.code(), DiagnosticCode::SURFACE);
    }
}
