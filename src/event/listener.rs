use std::fmt;

use crate::error::HandlerError;

use super::core::{Event, EventKind, ListenEvent};

pub type HandlerResult = std::result::Result<(), HandlerError>;

type Thunk<L> = Box<dyn FnMut(&mut L, &Event) -> HandlerResult + Send>;

/// An object exposing event handlers.
///
/// Handlers are declared once per registration through
/// [`EventListener::declare_handlers`]; each maps one event kind to a method.
///
/// ```ignore
/// impl EventListener for FocusLog {
///     fn declare_handlers(handlers: &mut HandlerSet<Self>) {
///         handlers
///             .on("on_activate", Self::on_activate)
///             .on("on_deactivate", Self::on_deactivate);
///     }
/// }
/// ```
pub trait EventListener: Send + 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn declare_handlers(handlers: &mut HandlerSet<Self>)
    where
        Self: Sized;
}

/// Declared parameter of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Event(EventKind),
    /// Any non-event parameter, named by its type.
    Value(&'static str),
}

/// A handler as declared, before registration validates its shape.
pub struct HandlerDecl<L> {
    name: String,
    params: Vec<ParamType>,
    thunk: Thunk<L>,
}

impl<L> HandlerDecl<L> {
    /// Raw declaration, used by bindings that describe handlers dynamically.
    /// Only a single [`ParamType::Event`] parameter is accepted at registration.
    pub fn new<F>(name: impl Into<String>, params: Vec<ParamType>, thunk: F) -> Self
    where
        F: FnMut(&mut L, &Event) -> HandlerResult + Send + 'static,
    {
        Self {
            name: name.into(),
            params,
            thunk: Box::new(thunk),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    pub(crate) fn validate(self) -> Result<AcceptedHandler<L>, HandlerRejection> {
        match self.params.as_slice() {
            [ParamType::Event(kind)] => Ok(AcceptedHandler {
                kind: *kind,
                name: self.name,
                thunk: self.thunk,
            }),
            [ParamType::Value(type_name)] => Err(HandlerRejection {
                handler: self.name,
                reason: RejectReason::NotAnEvent(type_name),
            }),
            params => Err(HandlerRejection {
                handler: self.name,
                reason: RejectReason::WrongArity(params.len()),
            }),
        }
    }
}

/// Handler declarations collected for one listener type.
pub struct HandlerSet<L> {
    declared: Vec<HandlerDecl<L>>,
}

impl<L> Default for HandlerSet<L> {
    fn default() -> Self {
        Self {
            declared: Vec::new(),
        }
    }
}

impl<L: 'static> HandlerSet<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a handler for exactly one concrete event type.
    pub fn on<E, F>(&mut self, name: impl Into<String>, mut handler: F) -> &mut Self
    where
        E: ListenEvent,
        F: FnMut(&mut L, &E) -> HandlerResult + Send + 'static,
    {
        self.declared.push(HandlerDecl::new(
            name,
            vec![ParamType::Event(E::KIND)],
            move |listener: &mut L, event: &Event| match E::extract(event) {
                Some(concrete) => handler(listener, concrete),
                None => Ok(()),
            },
        ));
        self
    }

    pub fn declare(&mut self, decl: HandlerDecl<L>) -> &mut Self {
        self.declared.push(decl);
        self
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    pub(crate) fn into_decls(self) -> Vec<HandlerDecl<L>> {
        self.declared
    }
}

pub(crate) struct AcceptedHandler<L> {
    pub(crate) kind: EventKind,
    pub(crate) name: String,
    pub(crate) thunk: Thunk<L>,
}

/// Why a declared handler was excluded from dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    WrongArity(usize),
    NotAnEvent(&'static str),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::WrongArity(count) => {
                write!(f, "handler takes {count} parameters, expected exactly one event")
            }
            RejectReason::NotAnEvent(type_name) => {
                write!(f, "parameter `{type_name}` is not an event type")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRejection {
    pub handler: String,
    pub reason: RejectReason,
}
