use serde::Serialize;

use crate::runtime::WindowRef;

/// Tag identifying the concrete type of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    WindowActivate,
    WindowDeactivate,
    KeyPress,
    KeyType,
    KeyRelease,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::WindowActivate,
        EventKind::WindowDeactivate,
        EventKind::KeyPress,
        EventKind::KeyType,
        EventKind::KeyRelease,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::WindowActivate => "window_activate",
            EventKind::WindowDeactivate => "window_deactivate",
            EventKind::KeyPress => "key_press",
            EventKind::KeyType => "key_type",
            EventKind::KeyRelease => "key_release",
        }
    }
}

/// Key payload shared by the key event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    pub key: char,
    pub key_code: u32,
    pub is_action_key: bool,
}

impl KeyInfo {
    pub const fn new(key: char, key_code: u32, is_action_key: bool) -> Self {
        Self {
            key,
            key_code,
            is_action_key,
        }
    }
}

/// Concrete event types a handler can be declared for.
pub trait ListenEvent: Sized + 'static {
    const KIND: EventKind;

    /// Borrow the concrete event if `event` is exactly this type.
    fn extract(event: &Event) -> Option<&Self>;
}

macro_rules! window_event {
    ($(#[$meta:meta])* $name:ident => $variant:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            source: WindowRef,
        }

        impl $name {
            pub fn new(source: WindowRef) -> Self {
                Self { source }
            }

            pub fn window(&self) -> &WindowRef {
                &self.source
            }
        }

        impl ListenEvent for $name {
            const KIND: EventKind = EventKind::$variant;

            fn extract(event: &Event) -> Option<&Self> {
                match event {
                    Event::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$name> for Event {
            fn from(value: $name) -> Self {
                Event::$variant(value)
            }
        }
    };
}

macro_rules! key_event {
    ($(#[$meta:meta])* $name:ident => $variant:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            source: WindowRef,
            info: KeyInfo,
        }

        impl $name {
            pub fn new(source: WindowRef, info: KeyInfo) -> Self {
                Self { source, info }
            }

            pub fn window(&self) -> &WindowRef {
                &self.source
            }

            pub fn key(&self) -> char {
                self.info.key
            }

            pub fn key_code(&self) -> u32 {
                self.info.key_code
            }

            pub fn is_action_key(&self) -> bool {
                self.info.is_action_key
            }

            pub fn info(&self) -> KeyInfo {
                self.info
            }
        }

        impl ListenEvent for $name {
            const KIND: EventKind = EventKind::$variant;

            fn extract(event: &Event) -> Option<&Self> {
                match event {
                    Event::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$name> for Event {
            fn from(value: $name) -> Self {
                Event::$variant(value)
            }
        }
    };
}

window_event!(
    /// The window gained focus.
    WindowActivateEvent => WindowActivate
);
window_event!(
    /// The window lost focus.
    WindowDeactivateEvent => WindowDeactivate
);
key_event!(KeyPressEvent => KeyPress);
key_event!(
    /// A printable character was produced by a key press.
    KeyTypeEvent => KeyType
);
key_event!(KeyReleaseEvent => KeyRelease);

/// Framework event. Constructed fresh per occurrence and never mutated.
#[derive(Debug, Clone)]
pub enum Event {
    WindowActivate(WindowActivateEvent),
    WindowDeactivate(WindowDeactivateEvent),
    KeyPress(KeyPressEvent),
    KeyType(KeyTypeEvent),
    KeyRelease(KeyReleaseEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::WindowActivate(_) => EventKind::WindowActivate,
            Event::WindowDeactivate(_) => EventKind::WindowDeactivate,
            Event::KeyPress(_) => EventKind::KeyPress,
            Event::KeyType(_) => EventKind::KeyType,
            Event::KeyRelease(_) => EventKind::KeyRelease,
        }
    }

    /// Window the event originated from.
    pub fn source(&self) -> &WindowRef {
        match self {
            Event::WindowActivate(event) => event.window(),
            Event::WindowDeactivate(event) => event.window(),
            Event::KeyPress(event) => event.window(),
            Event::KeyType(event) => event.window(),
            Event::KeyRelease(event) => event.window(),
        }
    }

    pub fn key_info(&self) -> Option<KeyInfo> {
        match self {
            Event::KeyPress(event) => Some(event.info()),
            Event::KeyType(event) => Some(event.info()),
            Event::KeyRelease(event) => Some(event.info()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_is_exact() {
        let source = WindowRef::detached();
        let event = Event::from(WindowActivateEvent::new(source.clone()));

        assert_eq!(event.kind(), EventKind::WindowActivate);
        assert!(WindowActivateEvent::extract(&event).is_some());
        assert!(WindowDeactivateEvent::extract(&event).is_none());
        assert!(event.key_info().is_none());
    }

    #[test]
    fn key_events_expose_payload() {
        let event = Event::from(KeyTypeEvent::new(
            WindowRef::detached(),
            KeyInfo::new('a', 65, false),
        ));
        let typed = KeyTypeEvent::extract(&event).unwrap();
        assert_eq!(typed.key(), 'a');
        assert_eq!(typed.key_code(), 65);
        assert!(!typed.is_action_key());
        assert!(KeyPressEvent::extract(&event).is_none());
    }
}
