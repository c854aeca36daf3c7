use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Window lifecycle status.
///
/// `Loading` is the transient state held while a close is being negotiated;
/// it blocks re-entrant close calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowStatus {
    Close,
    Open,
    Loading,
}

impl WindowStatus {
    const fn to_u8(self) -> u8 {
        match self {
            WindowStatus::Close => 0,
            WindowStatus::Open => 1,
            WindowStatus::Loading => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => WindowStatus::Open,
            2 => WindowStatus::Loading,
            _ => WindowStatus::Close,
        }
    }
}

impl fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WindowStatus::Close => "CLOSE",
            WindowStatus::Open => "OPEN",
            WindowStatus::Loading => "LOADING",
        };
        f.write_str(label)
    }
}

/// Atomically visible status shared by callers and the tick thread.
pub struct StatusCell {
    value: AtomicU8,
    lock: Mutex<()>,
    changed: Condvar,
}

impl Default for StatusCell {
    fn default() -> Self {
        Self {
            value: AtomicU8::new(WindowStatus::Close.to_u8()),
            lock: Mutex::new(()),
            changed: Condvar::new(),
        }
    }
}

impl StatusCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> WindowStatus {
        WindowStatus::from_u8(self.value.load(Ordering::Acquire))
    }

    pub fn set(&self, status: WindowStatus) {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.value.store(status.to_u8(), Ordering::Release);
        self.changed.notify_all();
    }

    /// Move from `from` to `to` atomically. On failure returns the status observed.
    pub fn transition(&self, from: WindowStatus, to: WindowStatus) -> Result<(), WindowStatus> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match self.value.compare_exchange(
            from.to_u8(),
            to.to_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.changed.notify_all();
                Ok(())
            }
            Err(actual) => Err(WindowStatus::from_u8(actual)),
        }
    }

    /// Block until the status equals `wanted`. `None` waits forever.
    pub fn wait_for(&self, wanted: WindowStatus, timeout: Option<Duration>) -> bool {
        let mut guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        while self.get() != wanted {
            match deadline {
                None => {
                    guard = self
                        .changed
                        .wait(guard)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    guard = self
                        .changed
                        .wait_timeout(guard, deadline - now)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|poisoned| poisoned.into_inner().0);
                }
            }
        }
        true
    }
}
