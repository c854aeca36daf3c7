use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;

use crate::event::{
    EventListener, HandlerResult, HandlerSet, KeyInfo, KeyPressEvent, KeyReleaseEvent,
    KeyTypeEvent, WindowActivateEvent, WindowDeactivateEvent,
};
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::WindowMetrics;
use crate::script::{CloseType, Script};

use super::{Window, WindowStatus};

const LIFECYCLE_TARGET: &str = "roost::window.lifecycle";

/// Logs the lifecycle hooks of the window it is attached to.
pub struct LifecycleLoggerScript {
    logger: Logger,
    level: LogLevel,
    log_updates: bool,
    window: Option<u64>,
}

impl LifecycleLoggerScript {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            level: LogLevel::Debug,
            log_updates: false,
            window: None,
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn log_updates(mut self, enabled: bool) -> Self {
        self.log_updates = enabled;
        self
    }

    fn emit(&self, message: &str, fields: impl IntoIterator<Item = (String, serde_json::Value)>) {
        let mut fields: Vec<_> = fields.into_iter().collect();
        if let Some(id) = self.window {
            fields.push(json_kv("window", json!(id)));
        }
        let event = event_with_fields(self.level, LIFECYCLE_TARGET, message, fields);
        let _ = self.logger.log_event(event);
    }
}

impl Script for LifecycleLoggerScript {
    fn name(&self) -> &str {
        "diagnostics.lifecycle_logger"
    }

    fn open(&mut self, window: &Window) {
        self.window = Some(window.id().get());
        self.emit(
            "script.open",
            [
                json_kv("scripts", json!(window.script_count())),
                json_kv("listeners", json!(window.listener_count())),
            ],
        );
    }

    fn update(&mut self, status: WindowStatus) {
        if self.log_updates {
            self.emit("script.update", [json_kv("status", json!(status))]);
        }
    }

    fn close_queue(&mut self) -> bool {
        self.emit("script.close_queue", std::iter::empty());
        true
    }

    fn close(&mut self, close_type: CloseType) {
        self.emit(
            "script.close",
            [json_kv("close_type", json!(close_type))],
        );
    }
}

/// Logs every event delivered to the window.
pub struct EventLoggerListener {
    logger: Logger,
    level: LogLevel,
    log_keys: bool,
    log_focus: bool,
}

impl EventLoggerListener {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            level: LogLevel::Debug,
            log_keys: true,
            log_focus: true,
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn log_keys(mut self, enabled: bool) -> Self {
        self.log_keys = enabled;
        self
    }

    pub fn log_focus(mut self, enabled: bool) -> Self {
        self.log_focus = enabled;
        self
    }

    fn emit(&self, message: &str, fields: impl IntoIterator<Item = (String, serde_json::Value)>) {
        let event = event_with_fields(self.level, LIFECYCLE_TARGET, message, fields);
        let _ = self.logger.log_event(event);
    }

    fn key(&mut self, message: &str, info: KeyInfo) -> HandlerResult {
        if self.log_keys {
            self.emit(
                message,
                [
                    json_kv("key", json!(info.key.to_string())),
                    json_kv("key_code", json!(info.key_code)),
                    json_kv("action", json!(info.is_action_key)),
                ],
            );
        }
        Ok(())
    }

    fn focus(&mut self, message: &str) -> HandlerResult {
        if self.log_focus {
            self.emit(message, std::iter::empty());
        }
        Ok(())
    }
}

impl EventListener for EventLoggerListener {
    fn name(&self) -> &str {
        "diagnostics.event_logger"
    }

    fn declare_handlers(handlers: &mut HandlerSet<Self>) {
        handlers
            .on("on_activate", |this: &mut Self, _: &WindowActivateEvent| {
                this.focus("event.activate")
            })
            .on("on_deactivate", |this: &mut Self, _: &WindowDeactivateEvent| {
                this.focus("event.deactivate")
            })
            .on("on_key_press", |this: &mut Self, event: &KeyPressEvent| {
                this.key("event.key_press", event.info())
            })
            .on("on_key_type", |this: &mut Self, event: &KeyTypeEvent| {
                this.key("event.key_type", event.info())
            })
            .on("on_key_release", |this: &mut Self, event: &KeyReleaseEvent| {
                this.key("event.key_release", event.info())
            });
    }
}

/// Periodically emits metrics snapshots through its own logger and target.
pub struct MetricsSnapshotScript {
    logger: Logger,
    metrics: Arc<Mutex<WindowMetrics>>,
    target: String,
    interval: Duration,
    last_emit: Option<Instant>,
    started_at: Instant,
}

impl MetricsSnapshotScript {
    pub fn new(logger: Logger, metrics: Arc<Mutex<WindowMetrics>>) -> Self {
        Self {
            logger,
            metrics,
            target: "roost::window.metrics".to_string(),
            interval: Duration::from_secs(5),
            last_emit: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    fn emit_snapshot(&mut self, force: bool) {
        if self.interval == Duration::ZERO && !force {
            return;
        }

        let now = Instant::now();
        if let Some(last) = self.last_emit {
            if !force && now.duration_since(last) < self.interval {
                return;
            }
        }

        self.last_emit = Some(now);
        let uptime = now.duration_since(self.started_at);

        if let Ok(guard) = self.metrics.lock() {
            let event = guard.snapshot(uptime).to_log_event(&self.target);
            let _ = self.logger.log_event(event);
        }
    }
}

impl Script for MetricsSnapshotScript {
    fn name(&self) -> &str {
        "diagnostics.metrics_snapshot"
    }

    fn open(&mut self, _window: &Window) {
        self.started_at = Instant::now();
        self.last_emit = None;
    }

    fn update(&mut self, _status: WindowStatus) {
        self.emit_snapshot(false);
    }

    // final totals for the open cycle
    fn close(&mut self, _close_type: CloseType) {
        self.emit_snapshot(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;
    use crate::runtime::{WindowConfig, WindowRef};

    fn quiet_window(sink: &MemorySink) -> Window {
        let config = WindowConfig::default().with_logger(Logger::new(sink.clone()));
        Window::with_config(config)
    }

    #[test]
    fn lifecycle_logger_traces_open_and_close() {
        let window_sink = MemorySink::new();
        let window = quiet_window(&window_sink);
        let sink = MemorySink::new();
        window.add_script(LifecycleLoggerScript::new(Logger::new(sink.clone())));

        window.open().unwrap();
        window.close_default(true).unwrap();

        assert_eq!(
            sink.messages(),
            vec!["script.open", "script.close_queue", "script.close"]
        );
        let events = sink.events();
        assert_eq!(events[2].fields.get("close_type"), Some(&json!("successfully")));
        assert_eq!(events[0].fields.get("window"), Some(&json!(window.id().get())));
    }

    #[test]
    fn event_logger_respects_toggles() {
        let sink = MemorySink::new();
        let window = quiet_window(&MemorySink::new());
        window.add_event_listener(EventLoggerListener::new(Logger::new(sink.clone())).log_focus(false));
        window.open().unwrap();

        let source: WindowRef = window.downgrade();
        window.call_event(WindowActivateEvent::new(source.clone())).unwrap();
        window
            .call_event(KeyPressEvent::new(source, KeyInfo::new('k', 75, false)))
            .unwrap();
        window.close_default(false).unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "event.key_press");
        assert_eq!(events[0].fields.get("key_code"), Some(&json!(75)));
    }

    #[test]
    fn metrics_snapshot_flushes_on_close() {
        let sink = MemorySink::new();
        let metrics = Arc::new(Mutex::new(WindowMetrics::new()));
        let mut script = MetricsSnapshotScript::new(Logger::new(sink.clone()), metrics.clone())
            .with_interval(Duration::from_secs(3600))
            .with_target("test.metrics");

        metrics.lock().unwrap().record_tick();
        script.update(WindowStatus::Open);
        script.update(WindowStatus::Open);
        script.close(CloseType::Successfully);

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.target == "test.metrics"));
        assert_eq!(events[1].fields.get("ticks"), Some(&json!(1)));
    }
}
