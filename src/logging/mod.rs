use serde::Serialize;
use serde_json::{Map, Value, json};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::error::DiagnosticCode;

pub type LogFields = Map<String, Value>;

/// Prefix carried by every textual diagnostic line.
pub const FRAMEWORK_TAG: &str = "Roost";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub ts_ms: u128,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "LogFields::is_empty", default)]
    pub fields: LogFields,
}

impl LogEvent {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ts_ms: current_ms(),
            level,
            target: target.into(),
            message: message.into(),
            fields: LogFields::new(),
        }
    }

    pub fn with_fields(
        level: LogLevel,
        target: impl Into<String>,
        message: impl Into<String>,
        fields: LogFields,
    ) -> Self {
        Self {
            fields,
            ..Self::new(level, target, message)
        }
    }

    /// Diagnostic code recorded in the `code` field, if any.
    pub fn code(&self) -> Option<&str> {
        self.fields.get("code").and_then(Value::as_str)
    }

    /// Human readable `Roost: <target>: <message> (code ..)` line.
    pub fn to_text_line(&self) -> String {
        let mut line = format!("{FRAMEWORK_TAG}: {}: {}", self.target, self.message);
        if let Some(code) = self.code() {
            line.push_str(&format!(" (code {code})"));
        }
        line
    }
}

fn current_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

pub type LoggingResult<T> = std::result::Result<T, LoggingError>;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("log sink poisoned")]
    Poisoned,
}

pub trait LogSink: Send + Sync {
    fn log(&self, event: &LogEvent) -> LoggingResult<()>;
}

#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
}

impl Logger {
    pub fn new<S>(sink: S) -> Self
    where
        S: LogSink + 'static,
    {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Logger writing textual diagnostics to stderr.
    pub fn stderr() -> Self {
        Self::new(StderrSink::new(LogLevel::Trace))
    }

    /// Logger appending JSON lines to `path`, rotating past `max_bytes`.
    pub fn file(path: impl AsRef<Path>, max_bytes: u64) -> LoggingResult<Self> {
        Ok(Self::new(FileSink::new(path, max_bytes)?))
    }

    pub fn log(&self, level: LogLevel, target: &str, message: &str) -> LoggingResult<()> {
        let event = LogEvent::new(level, target.to_string(), message.to_string());
        self.sink.log(&event)
    }

    pub fn log_with_fields(
        &self,
        level: LogLevel,
        target: &str,
        message: &str,
        fields: LogFields,
    ) -> LoggingResult<()> {
        let event = LogEvent::with_fields(level, target.to_string(), message.to_string(), fields);
        self.sink.log(&event)
    }

    pub fn log_event(&self, event: LogEvent) -> LoggingResult<()> {
        self.sink.log(&event)
    }
}

/// Appends events as JSON lines. Once a write would take the file past
/// `max_bytes` the current file moves to `<path>.1`, replacing any older
/// segment, and a fresh file is started. A `max_bytes` of zero never rotates.
pub struct FileSink {
    path: PathBuf,
    rotated: PathBuf,
    max_bytes: u64,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileSink {
    pub fn new(path: impl AsRef<Path>, max_bytes: u64) -> LoggingResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut rotated = path.clone().into_os_string();
        rotated.push(".1");
        let writer = Self::open_append(&path)?;
        Ok(Self {
            path,
            rotated: PathBuf::from(rotated),
            max_bytes,
            writer: Mutex::new(Some(writer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the previous segment lives after a rotation.
    pub fn rotated_path(&self) -> &Path {
        &self.rotated
    }

    fn open_append(path: &Path) -> std::io::Result<BufWriter<File>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::new(file))
    }

    fn write_line(&self, mut line: String) -> LoggingResult<()> {
        line.push('\n');
        let mut guard = self.writer.lock().map_err(|_| LoggingError::Poisoned)?;

        let current = match guard.as_ref() {
            Some(writer) => writer.get_ref().metadata()?.len(),
            None => 0,
        };
        if self.max_bytes > 0 && current > 0 && current + line.len() as u64 > self.max_bytes {
            // close before renaming
            guard.take();
            std::fs::rename(&self.path, &self.rotated)?;
        }

        let writer = match guard.take() {
            Some(writer) => writer,
            None => Self::open_append(&self.path)?,
        };
        let writer = guard.insert(writer);
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

impl LogSink for FileSink {
    fn log(&self, event: &LogEvent) -> LoggingResult<()> {
        let line = serde_json::to_string(event)?;
        self.write_line(line)
    }
}

/// Writes textual diagnostic lines to stderr, dropping events below `min_level`.
pub struct StderrSink {
    min_level: LogLevel,
}

impl StderrSink {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl LogSink for StderrSink {
    fn log(&self, event: &LogEvent) -> LoggingResult<()> {
        if event.level < self.min_level {
            return Ok(());
        }
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "{}", event.to_text_line())?;
        Ok(())
    }
}

/// Keeps every event in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Events carrying the given diagnostic code.
    pub fn with_code(&self, code: DiagnosticCode) -> Vec<LogEvent> {
        let wanted = code.to_string();
        self.events()
            .into_iter()
            .filter(|event| event.code() == Some(wanted.as_str()))
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.message).collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, event: &LogEvent) -> LoggingResult<()> {
        let mut guard = self.events.lock().map_err(|_| LoggingError::Poisoned)?;
        guard.push(event.clone());
        Ok(())
    }
}

pub fn event_with_fields(
    level: LogLevel,
    target: &str,
    message: &str,
    fields: impl IntoIterator<Item = (String, Value)>,
) -> LogEvent {
    let mut map = LogFields::new();
    for (k, v) in fields.into_iter() {
        map.insert(k, v);
    }
    LogEvent::with_fields(level, target.to_string(), message.to_string(), map)
}

pub fn json_kv(key: &str, value: impl Into<Value>) -> (String, Value) {
    (key.to_string(), value.into())
}

pub fn json_str(key: &str, value: impl Into<String>) -> (String, Value) {
    (key.to_string(), json!(value.into()))
}

pub fn code_kv(code: DiagnosticCode) -> (String, Value) {
    json_str("code", code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "roost-logging-{}-{}-{name}",
            std::process::id(),
            current_ms()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("window.log")
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn file_sink_writes_json_lines() {
        let path = scratch_path("lines");
        let logger = Logger::file(&path, 0).unwrap();
        logger
            .log_event(event_with_fields(
                LogLevel::Warn,
                "roost::window",
                "close(): Already closed.",
                [code_kv(DiagnosticCode::ALREADY_CLOSED)],
            ))
            .unwrap();
        logger.log(LogLevel::Info, "roost::window", "opened").unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["level"], json!("warn"));
        assert_eq!(lines[0]["fields"]["code"], json!("0x000009"));
        assert_eq!(lines[1]["message"], json!("opened"));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn file_sink_rotates_past_max_bytes() {
        let path = scratch_path("rotate");
        let sink = FileSink::new(&path, 200).unwrap();
        for n in 0..6 {
            sink.log(&LogEvent::new(
                LogLevel::Info,
                "roost::window.render",
                format!("frame {n}"),
            ))
            .unwrap();
        }

        assert!(std::fs::metadata(&path).unwrap().len() <= 200);
        let rotated = read_lines(sink.rotated_path());
        let current = read_lines(&path);
        assert!(!rotated.is_empty());
        assert!(!current.is_empty());
        assert_eq!(current.last().unwrap()["message"], json!("frame 5"));

        // segments hold consecutive frames with nothing lost at the seam
        let seam = rotated.last().unwrap()["message"].as_str().unwrap().to_string();
        let next = current[0]["message"].as_str().unwrap().to_string();
        let index = |message: &str| message["frame ".len()..].parse::<u32>().unwrap();
        assert_eq!(index(&seam) + 1, index(&next));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn text_line_carries_tag_and_code() {
        let event = event_with_fields(
            LogLevel::Warn,
            "roost::window",
            "close(): Already closed.",
            [code_kv(DiagnosticCode::ALREADY_CLOSED)],
        );
        assert_eq!(
            event.to_text_line(),
            "Roost: roost::window: close(): Already closed. (code 0x000009)"
        );
    }

    #[test]
    fn memory_sink_filters_by_code() {
        let sink = MemorySink::new();
        let logger = Logger::new(sink.clone());
        logger
            .log_event(event_with_fields(
                LogLevel::Warn,
                "roost::window",
                "not open",
                [code_kv(DiagnosticCode::NOT_OPEN)],
            ))
            .unwrap();
        logger.log(LogLevel::Info, "roost::window", "opened").unwrap();

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.with_code(DiagnosticCode::NOT_OPEN).len(), 1);
    }

    #[test]
    fn json_serialization_omits_empty_fields() {
        let event = LogEvent::new(LogLevel::Info, "roost::window", "opened");
        let line = serde_json::to_string(&event).unwrap();
        assert!(line.contains("\"level\":\"info\""));
        assert!(!line.contains("fields"));
    }
}
