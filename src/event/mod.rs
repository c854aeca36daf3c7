//! Typed events, listener declarations and the exact-kind dispatcher.

mod core;
mod listener;
mod registry;

pub use self::core::{
    Event, EventKind, KeyInfo, KeyPressEvent, KeyReleaseEvent, KeyTypeEvent, ListenEvent,
    WindowActivateEvent, WindowDeactivateEvent,
};
pub use listener::{
    EventListener, HandlerDecl, HandlerRejection, HandlerResult, HandlerSet, ParamType,
    RejectReason,
};
pub use registry::{
    DispatchReport, HandlerFailure, ListenerId, ListenerRegistry, Registration, SharedListener,
};
