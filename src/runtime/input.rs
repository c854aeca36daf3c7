use std::io;
use std::time::Duration;

use crossterm::event::{
    self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};

use crate::event::KeyInfo;

/// Which key event a raw key input becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    Press,
    Type,
    Release,
}

/// Untyped input as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    FocusGained,
    FocusLost,
    Key { phase: KeyPhase, info: KeyInfo },
    /// The user asked the frame to close (close button, window manager).
    CloseRequested,
}

/// Source of raw input for a window.
pub trait InputSource {
    /// Wait up to `timeout` for input. An empty vector means nothing arrived.
    fn poll_input(&mut self, timeout: Duration) -> io::Result<Vec<RawInput>>;
}

/// Reads terminal input through crossterm.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermInput;

impl InputSource for CrosstermInput {
    fn poll_input(&mut self, timeout: Duration) -> io::Result<Vec<RawInput>> {
        if event::poll(timeout)? {
            Ok(map_crossterm_event(&event::read()?))
        } else {
            Ok(Vec::new())
        }
    }
}

/// Character reported for keys that do not produce one.
pub const CHAR_UNDEFINED: char = '\u{FFFF}';

pub fn map_crossterm_event(event: &CrosstermEvent) -> Vec<RawInput> {
    match event {
        CrosstermEvent::FocusGained => vec![RawInput::FocusGained],
        CrosstermEvent::FocusLost => vec![RawInput::FocusLost],
        CrosstermEvent::Key(key) => map_key(key),
        _ => Vec::new(),
    }
}

fn map_key(key: &KeyEvent) -> Vec<RawInput> {
    // raw mode swallows SIGINT; treat Ctrl+C as the frame's close button
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
    {
        return match key.kind {
            KeyEventKind::Release => Vec::new(),
            _ => vec![RawInput::CloseRequested],
        };
    }
    let Some(info) = key_info(key.code) else {
        return Vec::new();
    };
    match key.kind {
        KeyEventKind::Press | KeyEventKind::Repeat => {
            let mut inputs = vec![RawInput::Key {
                phase: KeyPhase::Press,
                info,
            }];
            if !info.is_action_key && info.key != CHAR_UNDEFINED {
                inputs.push(RawInput::Key {
                    phase: KeyPhase::Type,
                    info,
                });
            }
            inputs
        }
        KeyEventKind::Release => vec![RawInput::Key {
            phase: KeyPhase::Release,
            info,
        }],
    }
}

/// Map a terminal key to its character and desktop-style virtual key code.
fn key_info(code: KeyCode) -> Option<KeyInfo> {
    let info = match code {
        KeyCode::Char(ch) => {
            let key_code = ch.to_ascii_uppercase() as u32;
            KeyInfo::new(ch, key_code, false)
        }
        KeyCode::Enter => KeyInfo::new('\n', 10, false),
        KeyCode::Tab => KeyInfo::new('\t', 9, false),
        KeyCode::Backspace => KeyInfo::new('\u{8}', 8, false),
        KeyCode::Esc => KeyInfo::new('\u{1b}', 27, false),
        KeyCode::Delete => KeyInfo::new('\u{7f}', 127, false),
        KeyCode::Left => KeyInfo::new(CHAR_UNDEFINED, 37, true),
        KeyCode::Up => KeyInfo::new(CHAR_UNDEFINED, 38, true),
        KeyCode::Right => KeyInfo::new(CHAR_UNDEFINED, 39, true),
        KeyCode::Down => KeyInfo::new(CHAR_UNDEFINED, 40, true),
        KeyCode::PageUp => KeyInfo::new(CHAR_UNDEFINED, 33, true),
        KeyCode::PageDown => KeyInfo::new(CHAR_UNDEFINED, 34, true),
        KeyCode::End => KeyInfo::new(CHAR_UNDEFINED, 35, true),
        KeyCode::Home => KeyInfo::new(CHAR_UNDEFINED, 36, true),
        KeyCode::Insert => KeyInfo::new(CHAR_UNDEFINED, 155, true),
        KeyCode::F(n) if (1..=12).contains(&n) => {
            KeyInfo::new(CHAR_UNDEFINED, 111 + n as u32, true)
        }
        _ => return None,
    };
    Some(info)
}
