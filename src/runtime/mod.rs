use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use serde_json::json;

use crate::error::{DiagnosticCode, Result, WindowError};
use crate::event::{
    DispatchReport, Event, EventListener, KeyPressEvent, KeyReleaseEvent, KeyTypeEvent,
    ListenEvent, ListenerId, Registration, SharedListener, WindowActivateEvent,
    WindowDeactivateEvent,
};
use crate::event::{HandlerResult, ListenerRegistry};
use crate::logging::{LogLevel, Logger, LoggingResult, code_kv, event_with_fields, json_kv};
use crate::metrics::WindowMetrics;
use crate::render::{RenderReport, StructureRenderer};
use crate::script::{CloseType, Script, ScriptRegistry, SharedScript};
use crate::structure::{
    ImageStructure, SquareStructure, Structure, StructureId, StructureList, TextStructure,
};
use crate::surface::{Surface, SurfaceSlot};

pub mod audit;
pub mod bundles;
pub mod diagnostics;
pub mod dialog;
pub mod driver;
pub mod input;
pub mod status;
pub mod ticker;

use audit::{NullWindowAudit, WindowAudit, WindowAuditEventBuilder, WindowAuditStage};
use bundles::WindowBundle;
use dialog::ConfirmDialog;
use input::{KeyPhase, RawInput};
pub use status::WindowStatus;
use status::StatusCell;
use ticker::{TickControl, Ticker};

const TARGET: &str = "roost::window";
const DISPATCH_TARGET: &str = "roost::window.dispatch";
const RENDER_TARGET: &str = "roost::window.render";

/// Configuration knobs for a window and its update loop.
#[derive(Clone)]
pub struct WindowConfig {
    /// Period of the update/render loop.
    pub tick_interval: Duration,
    /// Emit informational lifecycle messages. Warnings are always emitted.
    pub debug_mode: bool,
    /// Deliver key input to listeners.
    pub key_mode: bool,
    /// Structured logger; stderr text lines when unset.
    pub logger: Option<Logger>,
    /// Metrics accumulator used for periodic snapshots.
    pub metrics: Option<Arc<Mutex<WindowMetrics>>>,
    /// Interval between metrics snapshot emissions. Zero disables snapshots,
    /// as does leaving `logger` unset.
    pub metrics_interval: Duration,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
    /// Handler failures a single listener may accumulate during one open
    /// cycle before the window is closed with [`CloseType::Error`]. Zero
    /// never escalates.
    pub max_handler_failures: u32,
    /// How long frame mutators wait for the surface to be published.
    pub surface_wait: Duration,
    pub audit: Arc<dyn WindowAudit>,
    pub title: Option<String>,
    pub size: Option<(i32, i32)>,
    pub resizable: Option<bool>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1),
            debug_mode: false,
            key_mode: true,
            logger: None,
            metrics: None,
            metrics_interval: Duration::from_secs(5),
            metrics_target: "roost::window.metrics".to_string(),
            max_handler_failures: 3,
            surface_wait: Duration::from_secs(5),
            audit: Arc::new(NullWindowAudit),
            title: None,
            size: None,
            resizable: None,
        }
    }
}

impl WindowConfig {
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Log JSON lines to `path`, rotating once the file passes `max_bytes`.
    pub fn with_log_file(self, path: impl AsRef<Path>, max_bytes: u64) -> LoggingResult<Self> {
        Ok(self.with_logger(Logger::file(path, max_bytes)?))
    }

    pub fn with_debug_mode(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn WindowAudit>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.size = Some((width, height));
        self
    }

    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = Some(resizable);
        self
    }

    /// Collect metrics. Snapshots are only emitted through an explicitly
    /// configured logger.
    pub fn with_metrics(mut self) -> Self {
        self.enable_metrics();
        self
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(WindowMetrics::new())));
        }
    }

    /// Disable metrics collection and prevent further snapshots.
    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    /// Access the shared metrics handle if metrics are enabled.
    pub fn metrics_handle(&self) -> Option<Arc<Mutex<WindowMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

/// Process-unique window identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

thread_local! {
    /// Window whose script hooks are running on this thread, 0 for none.
    static IN_SCRIPT_HOOK: Cell<u64> = const { Cell::new(0) };
}

struct HookScope {
    previous: u64,
}

impl HookScope {
    fn enter(id: WindowId) -> Self {
        let previous = IN_SCRIPT_HOOK.with(|cell| cell.replace(id.0));
        Self { previous }
    }

    fn active_for(id: WindowId) -> bool {
        IN_SCRIPT_HOOK.with(|cell| cell.get() == id.0)
    }
}

impl Drop for HookScope {
    fn drop(&mut self) {
        IN_SCRIPT_HOOK.with(|cell| cell.set(self.previous));
    }
}

#[derive(Debug, Clone, Copy)]
enum PendingClose {
    Graceful {
        cancelable: bool,
        close_type: CloseType,
    },
    Forced,
}

#[derive(Default)]
struct FrameSettings {
    title: Option<String>,
    size: Option<(i32, i32)>,
    resizable: Option<bool>,
}

#[derive(Default)]
struct MetricsClock {
    started: Option<Instant>,
    last_emit: Option<Instant>,
}

struct WindowShared {
    id: WindowId,
    config: WindowConfig,
    logger: Logger,
    status: StatusCell,
    debug_mode: AtomicBool,
    key_mode: AtomicBool,
    hook_armed: AtomicBool,
    scripts: ScriptRegistry,
    listeners: ListenerRegistry,
    structures: Mutex<StructureList>,
    surface: SurfaceSlot,
    renderer: Mutex<StructureRenderer>,
    frame: Mutex<FrameSettings>,
    dialog: Mutex<Option<Box<dyn ConfirmDialog>>>,
    ticker: Mutex<Option<Ticker>>,
    pending_close: Mutex<Option<PendingClose>>,
    handler_failures: Mutex<HashMap<ListenerId, u32>>,
    clock: Mutex<MetricsClock>,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Non-owning reference to a window, carried by events as their source.
#[derive(Clone)]
pub struct WindowRef {
    id: Option<WindowId>,
    shared: Weak<WindowShared>,
}

impl WindowRef {
    /// A reference that points at no window.
    pub fn detached() -> Self {
        Self {
            id: None,
            shared: Weak::new(),
        }
    }

    pub fn id(&self) -> Option<WindowId> {
        self.id
    }

    pub fn upgrade(&self) -> Option<Window> {
        self.shared.upgrade().map(|shared| Window { shared })
    }

    /// Status of the referenced window; `Close` once it is gone.
    pub fn status(&self) -> WindowStatus {
        self.shared
            .upgrade()
            .map(|shared| shared.status.get())
            .unwrap_or(WindowStatus::Close)
    }

    pub fn refers_to(&self, window: &Window) -> bool {
        self.id == Some(window.id())
    }
}

impl PartialEq for WindowRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for WindowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowRef").field("id", &self.id).finish()
    }
}

/// A window: lifecycle state machine, script and listener registries,
/// structure list and update loop. Cheap to clone; clones share state.
///
/// Scripts that want to keep the window around should store
/// [`Window::downgrade`] instead of a clone so that dropping the last
/// application handle can still run the shutdown hook.
#[derive(Clone)]
pub struct Window {
    shared: Arc<WindowShared>,
}

impl Default for Window {
    fn default() -> Self {
        Self::new()
    }
}

impl Window {
    pub fn new() -> Self {
        Self::with_config(WindowConfig::default())
    }

    pub fn with_config(config: WindowConfig) -> Self {
        let logger = config.logger.clone().unwrap_or_else(Logger::stderr);
        let frame = FrameSettings {
            title: config.title.clone(),
            size: config.size,
            resizable: config.resizable,
        };
        let shared = Arc::new(WindowShared {
            id: WindowId::next(),
            debug_mode: AtomicBool::new(config.debug_mode),
            key_mode: AtomicBool::new(config.key_mode),
            hook_armed: AtomicBool::new(false),
            logger,
            status: StatusCell::new(),
            scripts: ScriptRegistry::new(),
            listeners: ListenerRegistry::new(),
            structures: Mutex::new(StructureList::new()),
            surface: SurfaceSlot::new(),
            renderer: Mutex::new(StructureRenderer::with_default()),
            frame: Mutex::new(frame),
            dialog: Mutex::new(None),
            ticker: Mutex::new(None),
            pending_close: Mutex::new(None),
            handler_failures: Mutex::new(HashMap::new()),
            clock: Mutex::new(MetricsClock::default()),
            config,
        });
        shared.audit(
            WindowAuditEventBuilder::new(WindowAuditStage::WindowConstructed)
                .detail("window", json!(shared.id.0)),
        );
        Self { shared }
    }

    pub fn id(&self) -> WindowId {
        self.shared.id
    }

    pub fn status(&self) -> WindowStatus {
        self.shared.status.get()
    }

    pub fn is_open(&self) -> bool {
        self.status() == WindowStatus::Open
    }

    pub fn downgrade(&self) -> WindowRef {
        WindowRef {
            id: Some(self.shared.id),
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.shared.config
    }

    pub fn logger(&self) -> &Logger {
        &self.shared.logger
    }

    pub fn set_debug_mode(&self, enabled: bool) {
        self.shared.debug_mode.store(enabled, Ordering::Relaxed);
    }

    pub fn set_key_mode(&self, enabled: bool) {
        self.shared.key_mode.store(enabled, Ordering::Relaxed);
    }

    pub fn key_mode(&self) -> bool {
        self.shared.key_mode.load(Ordering::Relaxed)
    }


    pub fn add_script<S: Script>(&self, script: S) {
        let name = self.shared.scripts.add(script);
        self.shared.audit(
            WindowAuditEventBuilder::new(WindowAuditStage::ScriptRegistered)
                .detail("script", json!(name)),
        );
    }

    pub fn add_shared_script(&self, script: SharedScript) {
        self.shared.scripts.add_shared(script);
        self.shared
            .audit(WindowAuditEventBuilder::new(WindowAuditStage::ScriptRegistered));
    }

    pub fn script_count(&self) -> usize {
        self.shared.scripts.len()
    }

    /// Install every script and listener carried by `bundle`.
    pub fn install(&self, bundle: WindowBundle) -> Vec<Registration> {
        bundle.install_into(self)
    }


    pub fn add_event_listener<L: EventListener>(
        &self,
        listener: L,
    ) -> (SharedListener<L>, Registration) {
        let (shared, registration) = self.shared.listeners.add(listener);
        self.shared.report_registration(&registration);
        (shared, registration)
    }

    pub fn add_shared_listener<L: EventListener>(&self, listener: SharedListener<L>) -> Registration {
        let registration = self.shared.listeners.add_shared(listener);
        self.shared.report_registration(&registration);
        registration
    }

    /// Register a closure for a single event type. Flagged as ad hoc.
    pub fn add_event_fn<E, F>(&self, label: impl Into<String>, handler: F) -> Registration
    where
        E: ListenEvent,
        F: FnMut(&E) -> HandlerResult + Send + 'static,
    {
        let registration = self.shared.listeners.add_fn(label, handler);
        self.shared.report_registration(&registration);
        registration
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        lock(&self.shared.handler_failures).remove(&id);
        self.shared.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.len()
    }

    /// Deliver an event to every listener declared for exactly its type.
    ///
    /// Fails with [`WindowError::NotOpen`] unless the window is open. Handler
    /// failures are isolated; a listener that keeps failing closes the window
    /// with [`CloseType::Error`].
    pub fn call_event(&self, event: impl Into<Event>) -> Result<DispatchReport> {
        let event = event.into();
        let shared = &self.shared;
        if shared.status.get() != WindowStatus::Open {
            shared.warn(
                TARGET,
                "call_event(): the window is not open; event dropped",
                DiagnosticCode::NOT_OPEN,
                [json_kv("event", json!(event.kind().as_str()))],
            );
            return Err(WindowError::NotOpen);
        }

        let report = shared.listeners.dispatch(&event);
        shared.record_dispatch(&report);
        shared.audit(
            WindowAuditEventBuilder::new(WindowAuditStage::EventDispatched)
                .detail("event", json!(event.kind().as_str()))
                .detail("invoked", json!(report.invoked))
                .detail("failures", json!(report.failures.len())),
        );

        for listener in &report.queued {
            shared.debug(
                DISPATCH_TARGET,
                "listener raised an event from its own handler; delivery queued",
                [
                    code_kv(DiagnosticCode::LISTENER_REENTERED),
                    json_kv("listener", json!(listener)),
                    json_kv("event", json!(event.kind().as_str())),
                ],
            );
        }

        let mut escalate = None;
        for failure in &report.failures {
            shared.log(
                LogLevel::Error,
                DISPATCH_TARGET,
                "event handler failed",
                [
                    code_kv(DiagnosticCode::HANDLER_FAILED),
                    json_kv("listener", json!(failure.listener)),
                    json_kv("handler", json!(failure.handler)),
                    json_kv("event", json!(failure.kind.as_str())),
                    json_kv("error", json!(failure.error.to_string())),
                ],
            );
            let count = {
                let mut failures = lock(&shared.handler_failures);
                let count = failures.entry(failure.listener_id).or_insert(0);
                *count += 1;
                *count
            };
            let limit = shared.config.max_handler_failures;
            if limit > 0 && count >= limit && escalate.is_none() {
                escalate = Some((failure.listener.clone(), count));
            }
        }

        if let Some((listener, count)) = escalate {
            shared.log(
                LogLevel::Error,
                DISPATCH_TARGET,
                "listener keeps failing; closing the window",
                [
                    code_kv(DiagnosticCode::DISPATCH_ESCALATED),
                    json_kv("listener", json!(listener)),
                    json_kv("failures", json!(count)),
                ],
            );
            if let Err(err) = self.close(false, CloseType::Error) {
                shared.debug(
                    TARGET,
                    "escalated close did not complete immediately",
                    [json_kv("reason", json!(err.to_string()))],
                );
            }
        }

        Ok(report)
    }

    /// Translate host input into events. Key input is dropped while key mode
    /// is off; a close request negotiates a [`CloseType::Normal`] close.
    pub fn handle_input(&self, input: RawInput) -> Result<Option<DispatchReport>> {
        let source = self.downgrade();
        let event: Event = match input {
            RawInput::FocusGained => WindowActivateEvent::new(source).into(),
            RawInput::FocusLost => WindowDeactivateEvent::new(source).into(),
            RawInput::Key { .. } if !self.key_mode() => return Ok(None),
            RawInput::Key { phase, info } => match phase {
                KeyPhase::Press => KeyPressEvent::new(source, info).into(),
                KeyPhase::Type => KeyTypeEvent::new(source, info).into(),
                KeyPhase::Release => KeyReleaseEvent::new(source, info).into(),
            },
            RawInput::CloseRequested => {
                if self.status() == WindowStatus::Open {
                    self.shared.debug(TARGET, "close requested by the host", []);
                    self.close(true, CloseType::Normal)?;
                }
                return Ok(None);
            }
        };
        self.call_event(event).map(Some)
    }


    pub fn add_structure(&self, structure: impl Into<Structure>) -> StructureId {
        lock(&self.shared.structures).push(structure.into())
    }

    pub fn add_square(&self, square: SquareStructure) -> StructureId {
        self.add_structure(square)
    }

    pub fn add_image(&self, image: ImageStructure) -> StructureId {
        self.add_structure(image)
    }

    pub fn add_text(&self, text: TextStructure) -> StructureId {
        self.add_structure(text)
    }

    /// Move or resize a square in place. Returns `false` if `id` is not a
    /// square still on this window.
    pub fn update_square(&self, id: StructureId, f: impl FnOnce(&mut SquareStructure)) -> bool {
        let mut structures = lock(&self.shared.structures);
        match structures.square_mut(id) {
            Some(square) => {
                f(square);
                true
            }
            None => false,
        }
    }

    pub fn remove_structure(&self, id: StructureId) -> Option<Structure> {
        lock(&self.shared.structures).remove(id)
    }

    pub fn structures(&self) -> Vec<Structure> {
        lock(&self.shared.structures).as_slice().to_vec()
    }

    pub fn clear_structures(&self) {
        lock(&self.shared.structures).clear();
    }


    /// Hand the window its drawable surface. Exactly once per open cycle.
    pub fn publish_surface(&self, surface: impl Surface + 'static) -> Result<()> {
        self.shared.surface.publish(Box::new(surface))?;
        let visible = self.status() != WindowStatus::Close;
        let frame = lock(&self.shared.frame);
        let applied = self.shared.surface.try_with(|surface| {
            if let Some(title) = frame.title.as_deref() {
                surface.set_title(title)?;
            }
            if let Some((width, height)) = frame.size {
                surface.set_size(width, height)?;
            }
            if let Some(resizable) = frame.resizable {
                surface.set_resizable(resizable)?;
            }
            if visible {
                surface.set_visible(true)?;
            }
            Ok::<(), crate::error::SurfaceError>(())
        });
        drop(frame);
        if let Some(Err(err)) = applied {
            self.shared.warn(
                TARGET,
                "could not apply frame settings to the new surface",
                DiagnosticCode::SURFACE,
                [json_kv("error", json!(err.to_string()))],
            );
        }
        Ok(())
    }

    pub fn has_surface(&self) -> bool {
        self.shared.surface.is_published()
    }

    pub fn set_title(&self, title: impl Into<String>) -> Result<()> {
        let title = title.into();
        lock(&self.shared.frame).title = Some(title.clone());
        self.with_surface(|surface| surface.set_title(&title))
    }

    pub fn set_size(&self, width: i32, height: i32) -> Result<()> {
        lock(&self.shared.frame).size = Some((width, height));
        self.with_surface(|surface| surface.set_size(width, height))
    }

    pub fn set_resizable(&self, resizable: bool) -> Result<()> {
        lock(&self.shared.frame).resizable = Some(resizable);
        self.with_surface(|surface| surface.set_resizable(resizable))
    }

    /// Run `f` against the surface, waiting for it to be published first.
    pub fn with_surface<R>(
        &self,
        f: impl FnOnce(&mut dyn Surface) -> std::result::Result<R, crate::error::SurfaceError>,
    ) -> Result<R> {
        let result = self
            .shared
            .surface
            .with_published(self.shared.config.surface_wait, f)?;
        Ok(result?)
    }

    /// Run one render pass immediately on the calling thread.
    pub fn render_now(&self) -> Option<RenderReport> {
        self.shared.render_frame()
    }


    pub fn set_dialog(&self, dialog: impl ConfirmDialog + 'static) {
        *lock(&self.shared.dialog) = Some(Box::new(dialog));
    }

    /// Ask the host for confirmation. `None` means nothing was selected,
    /// which is also the answer while the window is closed.
    pub fn ask_confirm(&self, title: &str, message: &str, options: &[&str]) -> Option<usize> {
        if self.status() == WindowStatus::Close {
            self.shared.warn(
                TARGET,
                "ask_confirm(): the window is closed",
                DiagnosticCode::NOT_OPEN,
                [json_kv("title", json!(title))],
            );
            return None;
        }
        let source = self.downgrade();
        let mut dialog = lock(&self.shared.dialog);
        dialog
            .as_mut()
            .and_then(|dialog| dialog.ask(&source, title, message, options))
    }


    /// Open the window: status OPEN, shutdown hook armed, surface shown,
    /// every script's `open` run in order, update loop started.
    ///
    /// A close requested from an `open` hook runs before this returns. The
    /// open itself still succeeded, so the result is `Ok(())` while
    /// [`Window::status`] already reports CLOSE and no update loop runs.
    pub fn open(&self) -> Result<()> {
        let shared = &self.shared;
        if let Err(actual) = shared.status.transition(WindowStatus::Close, WindowStatus::Open) {
            let err = match actual {
                WindowStatus::Loading => WindowError::CloseInProgress,
                _ => WindowError::AlreadyOpen,
            };
            shared.warn(
                TARGET,
                "open(): FAILED, the window is not closed.",
                err.code(),
                [json_kv("status", json!(actual))],
            );
            return Err(err);
        }

        lock(&shared.handler_failures).clear();
        shared.hook_armed.store(true, Ordering::Release);
        {
            let mut clock = lock(&shared.clock);
            let now = Instant::now();
            clock.started = Some(now);
            clock.last_emit = Some(now);
        }

        if let Some(Err(err)) = shared.surface.try_with(|surface| surface.set_visible(true)) {
            shared.warn(
                TARGET,
                "surface refused to become visible",
                DiagnosticCode::SURFACE,
                [json_kv("error", json!(err.to_string()))],
            );
        }

        {
            let _scope = HookScope::enter(shared.id);
            for name in shared.scripts.open_all(self) {
                shared.audit(
                    WindowAuditEventBuilder::new(WindowAuditStage::ScriptOpened)
                        .detail("script", json!(name)),
                );
            }
        }

        shared.audit(
            WindowAuditEventBuilder::new(WindowAuditStage::WindowOpened)
                .detail("scripts", json!(shared.scripts.len()))
                .detail("listeners", json!(shared.listeners.len())),
        );
        shared.debug(TARGET, "Open is successfully!", []);

        shared.run_pending_close();
        if shared.status.get() != WindowStatus::Open {
            return Ok(());
        }

        let weak = Arc::downgrade(shared);
        let ticker = Ticker::spawn(
            format!("roost-window-{}", shared.id.0),
            shared.config.tick_interval,
            move || match weak.upgrade() {
                Some(shared) => shared.tick(),
                None => TickControl::Stop,
            },
        );
        match ticker {
            Ok(ticker) => {
                *lock(&shared.ticker) = Some(ticker);
                Ok(())
            }
            Err(err) => {
                shared.log(
                    LogLevel::Error,
                    TARGET,
                    "could not start the update loop",
                    [
                        code_kv(DiagnosticCode::IO),
                        json_kv("error", json!(err.to_string())),
                    ],
                );
                let _ = shared.close_now(false, CloseType::Error);
                Err(WindowError::Io(err))
            }
        }
    }

    /// Negotiated close. With `cancelable`, any script's `close_queue`
    /// returning `false` vetoes the close and the window stays open.
    ///
    /// Called from inside a script hook of this window, the close is deferred
    /// to the end of the current hook pass and [`WindowError::CloseDeferred`]
    /// is returned.
    pub fn close(&self, cancelable: bool, close_type: CloseType) -> Result<()> {
        let shared = &self.shared;
        shared.check_closable()?;
        if HookScope::active_for(shared.id) {
            shared.defer_close(PendingClose::Graceful {
                cancelable,
                close_type,
            });
            return Err(WindowError::CloseDeferred);
        }
        shared.close_now(cancelable, close_type)
    }

    /// [`Window::close`] with [`CloseType::Successfully`].
    pub fn close_default(&self, cancelable: bool) -> Result<()> {
        self.close(cancelable, CloseType::Successfully)
    }

    /// Forced close: veto ignored, every script closed with
    /// [`CloseType::Unexpected`].
    pub fn close_unexpected(&self) -> Result<()> {
        let shared = &self.shared;
        shared.check_closable()?;
        if HookScope::active_for(shared.id) {
            shared.defer_close(PendingClose::Forced);
            return Err(WindowError::CloseDeferred);
        }
        shared.force_close()
    }

    /// Shutdown hook body. Call it from the host's process-exit path.
    pub fn handle_process_exit(&self) {
        self.shared.handle_process_exit();
    }

    /// Block until the window is closed. `None` waits forever.
    pub fn wait_closed(&self, timeout: Option<Duration>) -> bool {
        self.shared.status.wait_for(WindowStatus::Close, timeout)
    }

    /// Whether the update loop thread is still alive.
    pub fn loop_running(&self) -> bool {
        lock(&self.shared.ticker)
            .as_ref()
            .map(Ticker::is_running)
            .unwrap_or(false)
    }
}

impl WindowShared {
    fn tick(&self) -> TickControl {
        match self.status.get() {
            WindowStatus::Close => return TickControl::Stop,
            WindowStatus::Loading => return TickControl::Continue,
            WindowStatus::Open => {}
        }

        {
            let _scope = HookScope::enter(self.id);
            self.scripts.update_all(WindowStatus::Open);
            self.record_tick();
            self.render_frame();
        }
        self.audit(WindowAuditEventBuilder::new(WindowAuditStage::TickCompleted));
        self.maybe_emit_metrics();
        self.run_pending_close();

        if self.status.get() == WindowStatus::Close {
            TickControl::Stop
        } else {
            TickControl::Continue
        }
    }

    fn render_frame(&self) -> Option<RenderReport> {
        let structures = lock(&self.structures).as_slice().to_vec();
        let report = self
            .surface
            .try_with(|surface| lock(&self.renderer).render(surface, &structures))?;

        for failure in &report.failures {
            self.warn(
                RENDER_TARGET,
                "structure could not be drawn; skipped",
                failure.code(),
                [
                    json_kv("index", json!(failure.index)),
                    json_kv("kind", json!(failure.kind)),
                    json_kv("error", json!(failure.error.to_string())),
                ],
            );
        }
        if let Some(metrics) = self.config.metrics.as_ref() {
            lock(metrics).record_render(report.drawn, report.failures.len());
        }
        self.audit(
            WindowAuditEventBuilder::new(WindowAuditStage::RenderCommitted)
                .detail("drawn", json!(report.drawn))
                .detail("failed", json!(report.failures.len())),
        );
        Some(report)
    }

    fn check_closable(&self) -> Result<()> {
        match self.status.get() {
            WindowStatus::Open => Ok(()),
            WindowStatus::Close => {
                self.warn(
                    TARGET,
                    "close(): Already closed.",
                    DiagnosticCode::ALREADY_CLOSED,
                    [],
                );
                Err(WindowError::AlreadyClosed)
            }
            WindowStatus::Loading => {
                self.warn(
                    TARGET,
                    "close(): Already close queued.",
                    DiagnosticCode::CLOSE_IN_PROGRESS,
                    [],
                );
                Err(WindowError::CloseInProgress)
            }
        }
    }

    fn defer_close(&self, request: PendingClose) {
        let mut pending = lock(&self.pending_close);
        if pending.is_none() {
            *pending = Some(request);
        }
        self.debug(
            TARGET,
            "close(): requested from a script hook; deferred",
            [code_kv(DiagnosticCode::CLOSE_DEFERRED)],
        );
    }

    fn run_pending_close(&self) {
        let Some(request) = lock(&self.pending_close).take() else {
            return;
        };
        let result = match request {
            PendingClose::Graceful {
                cancelable,
                close_type,
            } => self.close_now(cancelable, close_type),
            PendingClose::Forced => self.force_close(),
        };
        if let Err(err) = result {
            self.debug(
                TARGET,
                "deferred close did not complete",
                [json_kv("reason", json!(err.to_string()))],
            );
        }
    }

    fn close_now(&self, cancelable: bool, close_type: CloseType) -> Result<()> {
        if let Err(actual) = self.status.transition(WindowStatus::Open, WindowStatus::Loading) {
            return Err(match actual {
                WindowStatus::Loading => WindowError::CloseInProgress,
                _ => WindowError::AlreadyClosed,
            });
        }
        self.debug(TARGET, "close(): Close queued.", []);
        self.audit(
            WindowAuditEventBuilder::new(WindowAuditStage::CloseQueued)
                .detail("cancelable", json!(cancelable))
                .detail("close_type", json!(close_type)),
        );

        if cancelable {
            if let Err(script) = self.scripts.negotiate_close() {
                self.status.set(WindowStatus::Open);
                self.debug(
                    TARGET,
                    "close(): Close canceled by scripts.",
                    [json_kv("script", json!(script))],
                );
                self.audit(
                    WindowAuditEventBuilder::new(WindowAuditStage::CloseVetoed)
                        .detail("script", json!(script)),
                );
                return Err(WindowError::CloseVetoed { script });
            }
        }

        self.finish_close(close_type);
        self.debug(TARGET, "close(): Closed.", []);
        Ok(())
    }

    fn force_close(&self) -> Result<()> {
        if let Err(actual) = self.status.transition(WindowStatus::Open, WindowStatus::Loading) {
            return Err(match actual {
                WindowStatus::Loading => WindowError::CloseInProgress,
                _ => WindowError::AlreadyClosed,
            });
        }
        self.audit(
            WindowAuditEventBuilder::new(WindowAuditStage::CloseQueued)
                .detail("cancelable", json!(false))
                .detail("close_type", json!(CloseType::Unexpected)),
        );
        let objectors = self.scripts.poll_close_ignoring_veto();
        if !objectors.is_empty() {
            self.debug(
                TARGET,
                "forced close ignores script objections",
                [json_kv("objectors", json!(objectors))],
            );
        }
        self.finish_close(CloseType::Unexpected);
        self.warn(
            TARGET,
            "shutdown hook: program is FORCIBLY closed.",
            DiagnosticCode::FORCED_CLOSE,
            [],
        );
        Ok(())
    }

    /// Loop teardown, close hooks, surface release, then CLOSE.
    fn finish_close(&self, close_type: CloseType) {
        let ticker = lock(&self.ticker).take();
        if let Some(ticker) = ticker {
            ticker.stop();
        }

        for name in self.scripts.close_all(close_type) {
            self.audit(
                WindowAuditEventBuilder::new(WindowAuditStage::ScriptClosed)
                    .detail("script", json!(name))
                    .detail("close_type", json!(close_type)),
            );
        }

        if let Some(mut surface) = self.surface.take() {
            let _ = surface.set_visible(false);
        }
        self.hook_armed.store(false, Ordering::Release);
        lock(&self.pending_close).take();

        self.status.set(WindowStatus::Close);
        self.audit(
            WindowAuditEventBuilder::new(WindowAuditStage::WindowClosed)
                .detail("close_type", json!(close_type)),
        );
    }

    fn handle_process_exit(&self) {
        if !self.hook_armed.load(Ordering::Acquire) {
            return;
        }
        match self.status.get() {
            WindowStatus::Loading => {
                self.log(
                    LogLevel::Info,
                    TARGET,
                    "shutdown hook: program is ALREADY queued to close.",
                    [],
                );
            }
            WindowStatus::Open => {
                let _ = self.force_close();
            }
            WindowStatus::Close => {}
        }
    }

    fn report_registration(&self, registration: &Registration) {
        if registration.ad_hoc {
            self.warn(
                DISPATCH_TARGET,
                "ad-hoc listener registered; prefer a named EventListener type",
                DiagnosticCode::AD_HOC_LISTENER,
                [json_kv("listener", json!(registration.listener))],
            );
        }
        for rejection in &registration.rejected {
            self.warn(
                DISPATCH_TARGET,
                "handler cannot be added; it is not an event handler",
                DiagnosticCode::REGISTRATION_REJECTED,
                [
                    json_kv("listener", json!(registration.listener)),
                    json_kv("handler", json!(rejection.handler)),
                    json_kv("reason", json!(rejection.reason.to_string())),
                ],
            );
        }
        self.audit(
            WindowAuditEventBuilder::new(WindowAuditStage::ListenerRegistered)
                .detail("listener", json!(registration.listener))
                .detail("accepted", json!(registration.accepted.len()))
                .detail("rejected", json!(registration.rejected.len())),
        );
    }

    fn record_tick(&self) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            lock(metrics).record_tick();
        }
    }

    fn record_dispatch(&self, report: &DispatchReport) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            lock(metrics).record_dispatch(report.invoked, report.failures.len());
        }
    }

    fn maybe_emit_metrics(&self) {
        let Some(metrics) = self.config.metrics.as_ref() else {
            return;
        };
        if self.config.logger.is_none() || self.config.metrics_interval == Duration::ZERO {
            return;
        }

        let now = Instant::now();
        let uptime = {
            let mut clock = lock(&self.clock);
            match clock.last_emit {
                Some(last) if now.duration_since(last) < self.config.metrics_interval => return,
                _ => clock.last_emit = Some(now),
            }
            clock
                .started
                .map(|start| now.duration_since(start))
                .unwrap_or_default()
        };

        let event = lock(metrics)
            .snapshot(uptime)
            .to_log_event(&self.config.metrics_target);
        let _ = self.logger.log_event(event);
    }

    fn audit(&self, builder: WindowAuditEventBuilder) {
        self.config.audit.record(builder.finish());
    }

    fn log<const N: usize>(
        &self,
        level: LogLevel,
        target: &str,
        message: &str,
        fields: [(String, serde_json::Value); N],
    ) {
        let mut fields = Vec::from(fields);
        fields.push(json_kv("window", json!(self.id.0)));
        let event = event_with_fields(level, target, message, fields);
        let _ = self.logger.log_event(event);
    }

    fn warn<const N: usize>(
        &self,
        target: &str,
        message: &str,
        code: DiagnosticCode,
        fields: [(String, serde_json::Value); N],
    ) {
        let mut all = vec![code_kv(code)];
        all.extend(fields);
        all.push(json_kv("window", json!(self.id.0)));
        let _ = self
            .logger
            .log_event(event_with_fields(LogLevel::Warn, target, message, all));
    }

    /// Informational chatter, only in debug mode.
    fn debug<const N: usize>(
        &self,
        target: &str,
        message: &str,
        fields: [(String, serde_json::Value); N],
    ) {
        if self.debug_mode.load(Ordering::Relaxed) {
            self.log(LogLevel::Info, target, message, fields);
        }
    }
}

impl Drop for WindowShared {
    fn drop(&mut self) {
        self.handle_process_exit();
    }
}
