use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::HandlerError;

use super::core::{Event, EventKind, ListenEvent};
use super::listener::{
    AcceptedHandler, EventListener, HandlerRejection, HandlerResult, HandlerSet,
};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // Listeners this thread is currently delivering to.
    static IN_FLIGHT: RefCell<Vec<ListenerId>> = const { RefCell::new(Vec::new()) };
}

/// Identifier handed out per registration, unique for the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Listener instance shared between the registry and its owner.
///
/// Dispatch blocks while another thread holds the instance lock. Holding the
/// guard on the dispatching thread itself deadlocks, as with any `Mutex`.
pub type SharedListener<L> = Arc<Mutex<L>>;

/// Result of one registration call.
#[derive(Debug, Clone)]
pub struct Registration {
    pub id: ListenerId,
    pub listener: String,
    pub accepted: Vec<(String, EventKind)>,
    pub rejected: Vec<HandlerRejection>,
    pub ad_hoc: bool,
}

/// A handler that returned an error while an event was delivered.
#[derive(Debug)]
pub struct HandlerFailure {
    pub listener_id: ListenerId,
    pub listener: String,
    pub handler: String,
    pub kind: EventKind,
    pub error: HandlerError,
}

/// Outcome of delivering one event to every registered listener.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub invoked: usize,
    pub failures: Vec<HandlerFailure>,
    /// Listeners raised from inside one of their own handlers. The event is
    /// queued on them and delivered, and reported, by the outer dispatch once
    /// that handler returns.
    pub queued: Vec<String>,
}

trait ListenerEntry: Send + Sync {
    fn deliver(&self, record: &RecordMeta, event: &Event, report: &mut DispatchReport);
}

struct TypedEntry<L> {
    instance: SharedListener<L>,
    handlers: Mutex<Vec<AcceptedHandler<L>>>,
    nested: Mutex<VecDeque<Event>>,
}

/// Marks a listener in flight on this thread until dropped.
struct InFlight(ListenerId);

impl InFlight {
    fn enter(id: ListenerId) -> Option<Self> {
        IN_FLIGHT.with(|ids| {
            let mut ids = ids.borrow_mut();
            if ids.contains(&id) {
                None
            } else {
                ids.push(id);
                Some(Self(id))
            }
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        IN_FLIGHT.with(|ids| ids.borrow_mut().retain(|id| *id != self.0));
    }
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<L: Send + 'static> TypedEntry<L> {
    fn run(
        handlers: &mut [AcceptedHandler<L>],
        instance: &mut L,
        record: &RecordMeta,
        event: &Event,
        report: &mut DispatchReport,
    ) {
        let kind = event.kind();
        for handler in handlers.iter_mut().filter(|handler| handler.kind == kind) {
            report.invoked += 1;
            if let Err(error) = (handler.thunk)(&mut *instance, event) {
                report.failures.push(HandlerFailure {
                    listener_id: record.id,
                    listener: record.label.clone(),
                    handler: handler.name.clone(),
                    kind,
                    error,
                });
            }
        }
    }
}

impl<L: Send + 'static> ListenerEntry for TypedEntry<L> {
    fn deliver(&self, record: &RecordMeta, event: &Event, report: &mut DispatchReport) {
        let Some(_in_flight) = InFlight::enter(record.id) else {
            relock(&self.nested).push_back(event.clone());
            report.queued.push(record.label.clone());
            return;
        };

        let mut handlers = relock(&self.handlers);
        let mut instance = relock(&self.instance);
        Self::run(&mut handlers, &mut instance, record, event, report);

        // events raised by this listener's own handlers, in raise order
        loop {
            let next = relock(&self.nested).pop_front();
            let Some(nested) = next else { break };
            Self::run(&mut handlers, &mut instance, record, &nested, report);
        }
    }
}

struct RecordMeta {
    id: ListenerId,
    label: String,
    kinds: Vec<EventKind>,
}

struct ListenerRecord {
    meta: RecordMeta,
    entry: Box<dyn ListenerEntry>,
}

/// Ordered collection of listeners with exact-kind dispatch.
///
/// Dispatch walks a snapshot of the records, so handlers may register or
/// remove listeners without deadlocking; such changes apply from the next
/// event on.
#[derive(Default)]
pub struct ListenerRegistry {
    records: Mutex<Vec<Arc<ListenerRecord>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, keeping a shared handle for the caller.
    pub fn add<L: EventListener>(&self, listener: L) -> (SharedListener<L>, Registration) {
        let shared = Arc::new(Mutex::new(listener));
        let registration = self.add_shared(Arc::clone(&shared));
        (shared, registration)
    }

    pub fn add_shared<L: EventListener>(&self, listener: SharedListener<L>) -> Registration {
        let label = relock(&listener).name().to_string();
        let mut handlers = HandlerSet::new();
        L::declare_handlers(&mut handlers);
        self.insert(listener, label, handlers, false)
    }

    /// Register a closure as an ad-hoc listener for a single event type.
    pub fn add_fn<E, F>(&self, label: impl Into<String>, handler: F) -> Registration
    where
        E: ListenEvent,
        F: FnMut(&E) -> HandlerResult + Send + 'static,
    {
        let label = label.into();
        let mut handlers = HandlerSet::<AdHoc<F>>::new();
        handlers.on(label.clone(), |adhoc: &mut AdHoc<F>, event: &E| {
            (adhoc.handler)(event)
        });
        let instance = Arc::new(Mutex::new(AdHoc { handler }));
        self.insert(instance, label, handlers, true)
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut records = self.lock_records();
        let before = records.len();
        records.retain(|record| record.meta.id != id);
        records.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock_records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_records().is_empty()
    }

    pub fn clear(&self) {
        self.lock_records().clear();
    }

    /// Deliver `event` to every handler declared for exactly its kind, in
    /// registration order then declaration order. Failures never stop delivery.
    pub fn dispatch(&self, event: &Event) -> DispatchReport {
        let snapshot: Vec<Arc<ListenerRecord>> = self.lock_records().clone();
        let kind = event.kind();
        let mut report = DispatchReport::default();
        for record in snapshot
            .iter()
            .filter(|record| record.meta.kinds.contains(&kind))
        {
            record.entry.deliver(&record.meta, event, &mut report);
        }
        report
    }

    fn insert<L: Send + 'static>(
        &self,
        instance: SharedListener<L>,
        label: String,
        handlers: HandlerSet<L>,
        ad_hoc: bool,
    ) -> Registration {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for decl in handlers.into_decls() {
            match decl.validate() {
                Ok(handler) => accepted.push(handler),
                Err(rejection) => rejected.push(rejection),
            }
        }

        let id = ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed));
        let mut kinds: Vec<EventKind> = accepted.iter().map(|handler| handler.kind).collect();
        kinds.dedup();
        let registration = Registration {
            id,
            listener: label.clone(),
            accepted: accepted
                .iter()
                .map(|handler| (handler.name.clone(), handler.kind))
                .collect(),
            rejected,
            ad_hoc,
        };

        let record = ListenerRecord {
            meta: RecordMeta { id, label, kinds },
            entry: Box::new(TypedEntry {
                instance,
                handlers: Mutex::new(accepted),
                nested: Mutex::new(VecDeque::new()),
            }),
        };
        self.lock_records().push(Arc::new(record));
        registration
    }

    fn lock_records(&self) -> MutexGuard<'_, Vec<Arc<ListenerRecord>>> {
        relock(&self.records)
    }
}

struct AdHoc<F> {
    handler: F,
}
