//! Window and input events as seen by the frame loop.

use std::collections::VecDeque;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Space,
    Tab,
    Backspace,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    /// Printable keys, upper-cased for letters.
    Char(char),
    Unidentified,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Keyboard { key: Key, state: ButtonState },
    /// The window's scale factor changed; the new size has to be queried from the window.
    Dpi { scale: f64 },
    Resize { width: u32, height: u32 },
    Close,
    Focus(bool),
    Paint,
    MouseMove { x: f64, y: f64 },
    MouseInput { button: MouseButton, state: ButtonState },
    MouseWheel { delta: f32 },
}

impl Event {
    pub fn key_pressed(key: Key) -> Self {
        Event::Keyboard {
            key,
            state: ButtonState::Pressed,
        }
    }

    pub fn resize(width: u32, height: u32) -> Self {
        Event::Resize { width, height }
    }
}

/// FIFO of events pumped from the window, drained once per tick.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn front(&self) -> Option<&Event> {
        self.events.front()
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }
}

impl Extend<Event> for EventQueue {
    fn extend<I: IntoIterator<Item = Event>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_preserves_occurrence_order() {
        let mut queue = EventQueue::new();
        queue.push(Event::key_pressed(Key::Char('A')));
        queue.extend([Event::resize(800, 600), Event::Close]);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.front(), Some(&Event::key_pressed(Key::Char('A'))));
        assert_eq!(queue.pop(), Some(Event::key_pressed(Key::Char('A'))));
        assert_eq!(queue.pop(), Some(Event::resize(800, 600)));
        assert_eq!(queue.pop(), Some(Event::Close));
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }
}
