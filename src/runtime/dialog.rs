use std::collections::VecDeque;
use std::sync::Mutex;

use super::WindowRef;

/// Host-provided confirmation dialog.
///
/// Returns the index of the chosen option, or `None` when nothing was chosen.
pub trait ConfirmDialog: Send {
    fn ask(
        &mut self,
        window: &WindowRef,
        title: &str,
        message: &str,
        options: &[&str],
    ) -> Option<usize>;
}

/// Answers from a fixed queue, falling back to a default once it runs dry.
/// Useful for headless hosts and tests.
#[derive(Debug, Default)]
pub struct ScriptedDialog {
    answers: Mutex<VecDeque<Option<usize>>>,
    fallback: Option<usize>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedDialog {
    pub fn new(fallback: Option<usize>) -> Self {
        Self {
            fallback,
            ..Self::default()
        }
    }

    pub fn answer(self, choice: Option<usize>) -> Self {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push_back(choice);
        }
        self
    }

    /// Titles of the dialogs shown so far.
    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .map(|asked| asked.clone())
            .unwrap_or_default()
    }
}

impl ConfirmDialog for ScriptedDialog {
    fn ask(
        &mut self,
        _window: &WindowRef,
        title: &str,
        _message: &str,
        options: &[&str],
    ) -> Option<usize> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(title.to_string());
        }
        let choice = self
            .answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .unwrap_or(self.fallback);
        choice.filter(|index| *index < options.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_are_consumed_in_order() {
        let mut dialog = ScriptedDialog::new(None).answer(Some(1)).answer(Some(5));
        let window = WindowRef::detached();
        let options = ["Yes", "No"];

        assert_eq!(dialog.ask(&window, "Close?", "", &options), Some(1));
        assert_eq!(dialog.ask(&window, "Close?", "", &options), None);
        assert_eq!(dialog.ask(&window, "Again?", "", &options), None);
        assert_eq!(dialog.asked(), vec!["Close?", "Close?", "Again?"]);
    }
}
