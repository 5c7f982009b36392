//! Push-button debouncing.
//!
//! A level change is accepted only if it is still present after the
//! confirmation window. The caller polls [`Debouncer::update`] with the raw
//! pin level and a millisecond timestamp.

use log::debug;

pub const DEFAULT_WINDOW_MS: u64 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Up,
    /// Pressed level seen, waiting for the window to confirm it.
    Falling,
    Down,
    /// Released level seen, waiting for the window to confirm it.
    Raising,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdge {
    Pressed,
    Released,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    state: ButtonState,
    window_ms: u64,
    edge_at_ms: u64,
    pressed: bool,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS)
    }
}

impl Debouncer {
    pub const fn new(window_ms: u64) -> Self {
        Self {
            state: ButtonState::Up,
            window_ms,
            edge_at_ms: 0,
            pressed: false,
        }
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    /// Feed one sample of the button level.
    pub fn update(&mut self, is_down: bool, now_ms: u64) -> Option<ButtonEdge> {
        let settled = now_ms.saturating_sub(self.edge_at_ms) >= self.window_ms;

        match self.state {
            ButtonState::Up if is_down => {
                debug!("Button falling edge");
                self.state = ButtonState::Falling;
                self.edge_at_ms = now_ms;
                None
            }
            ButtonState::Falling if settled => {
                if is_down {
                    self.state = ButtonState::Down;
                    self.pressed = true;
                    Some(ButtonEdge::Pressed)
                } else {
                    self.state = ButtonState::Up;
                    None
                }
            }
            ButtonState::Down if !is_down => {
                debug!("Button rising edge");
                self.state = ButtonState::Raising;
                self.edge_at_ms = now_ms;
                None
            }
            ButtonState::Raising if settled => {
                if is_down {
                    self.state = ButtonState::Down;
                    None
                } else {
                    self.state = ButtonState::Up;
                    Some(ButtonEdge::Released)
                }
            }
            _ => None,
        }
    }

    /// Whether a press was confirmed since the last call.
    pub fn read_key(&mut self) -> bool {
        core::mem::replace(&mut self.pressed, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_press_and_release() {
        let mut button = Debouncer::default();

        assert_eq!(button.update(true, 0), None);
        assert_eq!(button.state(), ButtonState::Falling);
        assert_eq!(button.update(true, 39), None);
        assert_eq!(button.update(true, 40), Some(ButtonEdge::Pressed));
        assert_eq!(button.state(), ButtonState::Down);

        assert_eq!(button.update(false, 100), None);
        assert_eq!(button.state(), ButtonState::Raising);
        assert_eq!(button.update(false, 140), Some(ButtonEdge::Released));
        assert_eq!(button.state(), ButtonState::Up);
    }

    #[test]
    fn bounce_shorter_than_the_window_is_ignored() {
        let mut button = Debouncer::default();

        button.update(true, 0);
        assert_eq!(button.update(false, 45), None);
        assert_eq!(button.state(), ButtonState::Up);
        assert!(!button.read_key());
    }

    #[test]
    fn release_bounce_returns_to_down() {
        let mut button = Debouncer::default();
        button.update(true, 0);
        button.update(true, 40);

        button.update(false, 50);
        assert_eq!(button.update(true, 90), None);
        assert_eq!(button.state(), ButtonState::Down);
    }

    #[test]
    fn read_key_latches_once() {
        let mut button = Debouncer::default();
        button.update(true, 0);
        button.update(true, 50);

        assert!(button.read_key());
        assert!(!button.read_key());
    }
}
