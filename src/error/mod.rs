mod types;

pub use types::{DiagnosticCode, HandlerError, Result, SurfaceError, WindowError};
