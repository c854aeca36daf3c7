use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::event::{EventListener, Registration};
use crate::logging::{LogLevel, Logger};
use crate::metrics::WindowMetrics;
use crate::script::{Script, SharedScript};

use super::Window;
use super::diagnostics::{EventLoggerListener, LifecycleLoggerScript, MetricsSnapshotScript};

type ListenerInstaller = Box<dyn FnOnce(&Window) -> Registration + Send>;

/// Scripts and listeners installed onto a window together, in the order they
/// were added.
#[derive(Default)]
pub struct WindowBundle {
    scripts: Vec<SharedScript>,
    listeners: Vec<ListenerInstaller>,
}

impl WindowBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script<S: Script>(mut self, script: S) -> Self {
        self.scripts.push(Arc::new(Mutex::new(script)));
        self
    }

    pub fn with_shared_script(mut self, script: SharedScript) -> Self {
        self.scripts.push(script);
        self
    }

    pub fn with_listener<L: EventListener>(mut self, listener: L) -> Self {
        self.listeners
            .push(Box::new(move |window: &Window| window.add_event_listener(listener).1));
        self
    }

    /// Append another bundle's contents after this one's.
    pub fn merge(mut self, other: WindowBundle) -> Self {
        self.scripts.extend(other.scripts);
        self.listeners.extend(other.listeners);
        self
    }

    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty() && self.listeners.is_empty()
    }

    pub(crate) fn install_into(self, window: &Window) -> Vec<Registration> {
        for script in self.scripts {
            window.add_shared_script(script);
        }
        self.listeners
            .into_iter()
            .map(|install| install(window))
            .collect()
    }
}

#[derive(Clone)]
pub struct DiagnosticsConfig {
    pub logger: Logger,
    pub level: LogLevel,
    pub log_updates: bool,
    pub log_keys: bool,
    pub log_focus: bool,
    pub metrics: Option<DiagnosticsMetricsConfig>,
}

impl DiagnosticsConfig {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            level: LogLevel::Debug,
            log_updates: false,
            log_keys: true,
            log_focus: true,
            metrics: None,
        }
    }

    fn build_lifecycle_script(&self) -> LifecycleLoggerScript {
        LifecycleLoggerScript::new(self.logger.clone())
            .with_level(self.level)
            .log_updates(self.log_updates)
    }

    fn build_event_listener(&self) -> EventLoggerListener {
        EventLoggerListener::new(self.logger.clone())
            .with_level(self.level)
            .log_keys(self.log_keys)
            .log_focus(self.log_focus)
    }
}

#[derive(Clone)]
pub struct DiagnosticsMetricsConfig {
    pub metrics: Arc<Mutex<WindowMetrics>>,
    pub interval: Duration,
    pub target: String,
}

/// Lifecycle logging, event logging and optional metrics snapshots.
pub fn diagnostics_bundle(config: DiagnosticsConfig) -> WindowBundle {
    let mut bundle = WindowBundle::new()
        .with_script(config.build_lifecycle_script())
        .with_listener(config.build_event_listener());

    if let Some(metrics_cfg) = config.metrics {
        let script = MetricsSnapshotScript::new(config.logger.clone(), metrics_cfg.metrics)
            .with_interval(metrics_cfg.interval)
            .with_target(metrics_cfg.target);
        bundle = bundle.with_script(script);
    }

    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;
    use crate::runtime::WindowConfig;

    #[test]
    fn bundle_installs_in_order() {
        let sink = MemorySink::new();
        let window =
            Window::with_config(WindowConfig::default().with_logger(Logger::new(MemorySink::new())));
        let mut config = DiagnosticsConfig::new(Logger::new(sink.clone()));
        config.metrics = Some(DiagnosticsMetricsConfig {
            metrics: Arc::new(Mutex::new(WindowMetrics::new())),
            interval: Duration::from_secs(60),
            target: "bundle.metrics".to_string(),
        });

        let bundle = diagnostics_bundle(config);
        assert_eq!(bundle.script_count(), 2);
        assert_eq!(bundle.listener_count(), 1);

        window.install(bundle);
        assert_eq!(window.script_count(), 2);
        assert_eq!(window.listener_count(), 1);

        window.open().unwrap();
        window.close_default(false).unwrap();

        let messages = sink.messages();
        assert_eq!(messages.first().map(String::as_str), Some("script.open"));
        assert!(messages.iter().any(|message| message == "window_metrics"));
        assert!(messages.iter().any(|message| message == "script.close"));
    }

    #[test]
    fn merge_keeps_both_sides() {
        let left = WindowBundle::new().with_listener(EventLoggerListener::new(Logger::new(
            MemorySink::new(),
        )));
        let right = WindowBundle::new()
            .with_script(LifecycleLoggerScript::new(Logger::new(MemorySink::new())));

        let merged = left.merge(right);
        assert_eq!(merged.script_count(), 1);
        assert_eq!(merged.listener_count(), 1);
        assert!(!merged.is_empty());
        assert!(WindowBundle::new().is_empty());
    }
}
