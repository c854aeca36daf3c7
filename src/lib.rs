//! Roost: a small windowing core.
//!
//! A [`Window`] owns a lifecycle state machine (CLOSE, OPEN, LOADING), an
//! ordered list of [`Script`]s, a typed event dispatcher and a list of
//! drawable structures rendered on a fixed-period update loop. Hosts bind it
//! to a real display through the [`Surface`] trait and feed it input with
//! [`Window::handle_input`].

pub mod cursor;
pub mod error;
pub mod event;
pub mod logging;
pub mod metrics;
pub mod render;
pub mod runtime;
pub mod script;
pub mod structure;
pub mod surface;
pub mod width;

pub use error::{DiagnosticCode, HandlerError, Result, SurfaceError, WindowError};
pub use event::{
    DispatchReport, Event, EventKind, EventListener, HandlerDecl, HandlerFailure,
    HandlerRejection, HandlerResult, HandlerSet, KeyInfo, KeyPressEvent, KeyReleaseEvent,
    KeyTypeEvent, ListenEvent, ListenerId, ParamType, Registration, RejectReason,
    SharedListener, WindowActivateEvent, WindowDeactivateEvent,
};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink, StderrSink,
};
pub use metrics::{MetricSnapshot, WindowMetrics};
pub use render::{RenderFailure, RenderReport, RendererSettings, StructureRenderer};
pub use runtime::audit::{
    NullWindowAudit, RecordingAudit, WindowAudit, WindowAuditEvent, WindowAuditEventBuilder,
    WindowAuditStage,
};
pub use runtime::bundles::{
    DiagnosticsConfig, DiagnosticsMetricsConfig, WindowBundle, diagnostics_bundle,
};
pub use runtime::diagnostics::{EventLoggerListener, LifecycleLoggerScript, MetricsSnapshotScript};
pub use runtime::dialog::{ConfirmDialog, ScriptedDialog};
pub use runtime::driver::cli::{DriverError, DriverResult, TerminalDriver};
pub use runtime::input::{CrosstermInput, InputSource, KeyPhase, RawInput};
pub use runtime::{Window, WindowConfig, WindowId, WindowRef, WindowStatus};
pub use script::{CloseType, Script, SharedScript};
pub use structure::{
    AUTO_SIZE, CustomStructure, ImageData, ImageStructure, SquareStructure, Structure,
    StructureId, StructureList, TextStructure,
};
pub use surface::{AnsiSurface, RecordingSurface, Surface, SurfaceCall, SurfaceResult};
pub use width::display_width;
