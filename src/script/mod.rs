//! Lifecycle-aware scripts driven by the window's open, update and close phases.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::runtime::{Window, WindowStatus};

/// Classified reason for a close transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseType {
    /// The user closed the window (the frame's close button).
    Normal,
    /// Programmatic close.
    Successfully,
    /// Closed because the framework hit an unrecoverable condition.
    Error,
    /// Forced close, e.g. the process is terminating.
    Unexpected,
}

impl fmt::Display for CloseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CloseType::Normal => "NORMAL",
            CloseType::Successfully => "SUCCESSFULLY",
            CloseType::Error => "ERROR",
            CloseType::Unexpected => "UNEXPECTED",
        };
        f.write_str(label)
    }
}

/// Behaviour injection point for a window.
///
/// Every hook has a no-op default so scripts only implement what they need.
pub trait Script: Send + 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called once per open, in registration order.
    fn open(&mut self, _window: &Window) {}

    /// Called every tick while the window is open.
    fn update(&mut self, _status: WindowStatus) {}

    /// Asked during a cancelable close. Returning `false` vetoes the close.
    fn close_queue(&mut self) -> bool {
        true
    }

    /// Called once per close that was not vetoed.
    fn close(&mut self, _close_type: CloseType) {}
}

pub type SharedScript = Arc<Mutex<dyn Script>>;

/// Ordered script collection owned by a window.
#[derive(Default)]
pub struct ScriptRegistry {
    scripts: Mutex<Vec<SharedScript>>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<S: Script>(&self, script: S) -> String {
        let name = script.name().to_string();
        self.add_shared(Arc::new(Mutex::new(script)));
        name
    }

    pub fn add_shared(&self, script: SharedScript) {
        self.lock_list().push(script);
    }

    pub fn len(&self) -> usize {
        self.lock_list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_list().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|script| lock_script(script).name().to_string())
            .collect()
    }

    /// Run `open` on every script; returns the names in call order.
    pub fn open_all(&self, window: &Window) -> Vec<String> {
        self.for_each(|script| script.open(window))
    }

    pub fn update_all(&self, status: WindowStatus) {
        self.for_each(|script| script.update(status));
    }

    /// Poll `close_queue` in order. The first objector wins and later scripts
    /// are not asked.
    pub fn negotiate_close(&self) -> Result<(), String> {
        for script in self.snapshot() {
            let mut guard = lock_script(&script);
            if !guard.close_queue() {
                return Err(guard.name().to_string());
            }
        }
        Ok(())
    }

    /// Poll every script's `close_queue` without honoring a veto; returns the
    /// names of the scripts that objected.
    pub fn poll_close_ignoring_veto(&self) -> Vec<String> {
        let mut objectors = Vec::new();
        for script in self.snapshot() {
            let mut guard = lock_script(&script);
            if !guard.close_queue() {
                objectors.push(guard.name().to_string());
            }
        }
        objectors
    }

    /// Run `close` on every script; always runs to completion.
    pub fn close_all(&self, close_type: CloseType) -> Vec<String> {
        self.for_each(|script| script.close(close_type))
    }

    fn for_each(&self, mut f: impl FnMut(&mut dyn Script)) -> Vec<String> {
        let mut names = Vec::new();
        for script in self.snapshot() {
            let mut guard = lock_script(&script);
            f(&mut *guard);
            names.push(guard.name().to_string());
        }
        names
    }

    fn snapshot(&self) -> Vec<SharedScript> {
        self.lock_list().clone()
    }

    fn lock_list(&self) -> MutexGuard<'_, Vec<SharedScript>> {
        self.scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn lock_script(script: &SharedScript) -> MutexGuard<'_, dyn Script> {
    script
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gate {
        label: &'static str,
        allow: bool,
        polled: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Script for Gate {
        fn name(&self) -> &str {
            self.label
        }

        fn close_queue(&mut self) -> bool {
            self.polled.lock().unwrap().push(self.label);
            self.allow
        }
    }

    fn gate(label: &'static str, allow: bool, polled: &Arc<Mutex<Vec<&'static str>>>) -> Gate {
        Gate {
            label,
            allow,
            polled: Arc::clone(polled),
        }
    }

    #[test]
    fn first_objector_short_circuits() {
        let polled = Arc::new(Mutex::new(Vec::new()));
        let registry = ScriptRegistry::new();
        registry.add(gate("a", false, &polled));
        registry.add(gate("b", true, &polled));

        assert_eq!(registry.negotiate_close(), Err("a".to_string()));
        assert_eq!(*polled.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn forced_poll_asks_everyone() {
        let polled = Arc::new(Mutex::new(Vec::new()));
        let registry = ScriptRegistry::new();
        registry.add(gate("a", false, &polled));
        registry.add(gate("b", false, &polled));

        assert_eq!(registry.poll_close_ignoring_veto(), vec!["a", "b"]);
        assert_eq!(*polled.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn close_runs_in_registration_order() {
        let polled = Arc::new(Mutex::new(Vec::new()));
        let registry = ScriptRegistry::new();
        registry.add(gate("a", true, &polled));
        registry.add(gate("b", true, &polled));

        assert_eq!(registry.close_all(CloseType::Successfully), vec!["a", "b"]);
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn close_type_labels() {
        assert_eq!(CloseType::Unexpected.to_string(), "UNEXPECTED");
        assert_eq!(CloseType::Normal.to_string(), "NORMAL");
    }
}
