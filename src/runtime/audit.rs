//! Window lifecycle audit utilities.
//!
//! Lightweight instrumentation hooks so callers can observe the major
//! lifecycle transitions of a [`Window`](super::Window). Records capture a
//! stage identifier plus structured metadata so downstream code can log,
//! buffer, or assert on the window's progression without touching the core.

use std::sync::Mutex;
use std::time::SystemTime;

use serde_json::Value;

/// Distinct lifecycle checkpoints emitted by a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAuditStage {
    /// A new window instance was constructed.
    WindowConstructed,
    /// A script was added to the window.
    ScriptRegistered,
    /// A listener was added to the window.
    ListenerRegistered,
    /// The window moved to OPEN.
    WindowOpened,
    /// A script finished its `open` hook.
    ScriptOpened,
    /// A close moved the window to LOADING.
    CloseQueued,
    /// A script vetoed a cancelable close.
    CloseVetoed,
    /// A script finished its `close` hook.
    ScriptClosed,
    /// The window reached CLOSE.
    WindowClosed,
    /// An event finished propagating.
    EventDispatched,
    /// One update/render tick completed.
    TickCompleted,
    /// A render pass reached the surface.
    RenderCommitted,
}

/// Structured audit entry.
#[derive(Debug, Clone)]
pub struct WindowAuditEvent {
    pub timestamp: SystemTime,
    pub stage: WindowAuditStage,
    pub details: Vec<(String, Value)>,
}

impl WindowAuditEvent {
    fn new(stage: WindowAuditStage) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details: Vec::new(),
        }
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

/// Builder helper to append fields ergonomically.
pub struct WindowAuditEventBuilder {
    event: WindowAuditEvent,
}

impl WindowAuditEventBuilder {
    pub fn new(stage: WindowAuditStage) -> Self {
        Self {
            event: WindowAuditEvent::new(stage),
        }
    }

    pub fn detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.event.details.push((key.into(), value));
        self
    }

    pub fn finish(self) -> WindowAuditEvent {
        self.event
    }
}

/// Trait implemented by any audit sink.
pub trait WindowAudit: Send + Sync {
    fn record(&self, event: WindowAuditEvent);
}

/// Default no-op implementation used when auditing is disabled.
#[derive(Debug, Default)]
pub struct NullWindowAudit;

impl WindowAudit for NullWindowAudit {
    fn record(&self, _event: WindowAuditEvent) {}
}

/// Keeps every audit record in memory.
#[derive(Debug, Default)]
pub struct RecordingAudit {
    events: Mutex<Vec<WindowAuditEvent>>,
}

impl RecordingAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WindowAuditEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Stages in record order, skipping the per-tick noise.
    pub fn stages(&self) -> Vec<WindowAuditStage> {
        self.events()
            .into_iter()
            .map(|event| event.stage)
            .filter(|stage| {
                !matches!(
                    stage,
                    WindowAuditStage::TickCompleted | WindowAuditStage::RenderCommitted
                )
            })
            .collect()
    }
}

impl WindowAudit for RecordingAudit {
    fn record(&self, event: WindowAuditEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recording_audit_keeps_details() {
        let audit = RecordingAudit::new();
        audit.record(
            WindowAuditEventBuilder::new(WindowAuditStage::CloseVetoed)
                .detail("script", json!("main"))
                .finish(),
        );
        audit.record(WindowAuditEventBuilder::new(WindowAuditStage::TickCompleted).finish());

        assert_eq!(audit.stages(), vec![WindowAuditStage::CloseVetoed]);
        assert_eq!(audit.events()[0].detail("script"), Some(&json!("main")));
    }
}
