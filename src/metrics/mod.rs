use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct WindowMetrics {
    ticks: u64,
    renders: u64,
    structures_drawn: u64,
    render_failures: u64,
    events: u64,
    handler_invocations: u64,
    handler_failures: u64,
}

impl WindowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
    }

    pub fn record_render(&mut self, drawn: usize, failed: usize) {
        self.renders = self.renders.saturating_add(1);
        self.structures_drawn = self.structures_drawn.saturating_add(drawn as u64);
        if failed > 0 {
            self.render_failures = self.render_failures.saturating_add(failed as u64);
        }
    }

    pub fn record_dispatch(&mut self, invocations: usize, failures: usize) {
        self.events = self.events.saturating_add(1);
        self.handler_invocations = self.handler_invocations.saturating_add(invocations as u64);
        if failures > 0 {
            self.handler_failures = self.handler_failures.saturating_add(failures as u64);
        }
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            ticks: self.ticks,
            renders: self.renders,
            structures_drawn: self.structures_drawn,
            render_failures: self.render_failures,
            events: self.events,
            handler_invocations: self.handler_invocations,
            handler_failures: self.handler_failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub ticks: u64,
    pub renders: u64,
    pub structures_drawn: u64,
    pub render_failures: u64,
    pub events: u64,
    pub handler_invocations: u64,
    pub handler_failures: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(
            LogLevel::Info,
            target.to_string(),
            "window_metrics".to_string(),
            self.as_fields(),
        )
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("ticks".to_string(), json!(self.ticks));
        map.insert("renders".to_string(), json!(self.renders));
        map.insert("structures_drawn".to_string(), json!(self.structures_drawn));
        map.insert("render_failures".to_string(), json!(self.render_failures));
        map.insert("events".to_string(), json!(self.events));
        map.insert(
            "handler_invocations".to_string(),
            json!(self.handler_invocations),
        );
        map.insert("handler_failures".to_string(), json!(self.handler_failures));
        map
    }
}
