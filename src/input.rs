//! Key bindings: arrows, vim and WASD-style letters, plus optional dev keys.

use crate::catalog::{BlockKind, KindId, Special};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press. The app turns these into session commands
/// depending on the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft,
    MoveRight,
    Drop,
    /// Start from the title screen.
    Confirm,
    /// Pause or resume.
    Pause,
    Restart,
    Quit,
    SetKind(KindId),
    None,
}

/// Map a key event to an action. Digit and function keys only map with `dev_keys`.
pub fn key_to_action(key: KeyEvent, dev_keys: bool) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if !(modifiers.is_empty() || modifiers == KeyModifiers::SHIFT) {
        return Action::None;
    }
    match code {
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('p' | 'P') => Action::Pause,
        KeyCode::Char('r' | 'R') => Action::Restart,
        KeyCode::Left | KeyCode::Char('h' | 'a' | 'A') => Action::MoveLeft,
        KeyCode::Right | KeyCode::Char('l' | 'd' | 'D') => Action::MoveRight,
        KeyCode::Down | KeyCode::Char(' ' | 'j' | 's' | 'S') => Action::Drop,
        KeyCode::Enter => Action::Confirm,
        // 1..9: tiles 1, 2, 4 ... 256
        KeyCode::Char(c @ '1'..='9') if dev_keys => {
            Action::SetKind(BlockKind::Number(c as u8 - b'1').id())
        }
        // F1..F8: specials in catalog order
        KeyCode::F(n @ 1..=8) if dev_keys => {
            Action::SetKind(BlockKind::Special(Special::ALL[n as usize - 1]).id())
        }
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn movement_has_three_layouts() {
        for c in [KeyCode::Left, KeyCode::Char('h'), KeyCode::Char('a')] {
            assert_eq!(key_to_action(press(c), false), Action::MoveLeft);
        }
        for c in [KeyCode::Right, KeyCode::Char('l'), KeyCode::Char('d')] {
            assert_eq!(key_to_action(press(c), false), Action::MoveRight);
        }
        for c in [KeyCode::Down, KeyCode::Char(' '), KeyCode::Char('j')] {
            assert_eq!(key_to_action(press(c), false), Action::Drop);
        }
    }

    #[test]
    fn dev_keys_are_gated() {
        assert_eq!(key_to_action(press(KeyCode::Char('3')), false), Action::None);
        assert_eq!(key_to_action(press(KeyCode::Char('1')), true), Action::SetKind(0));
        assert_eq!(key_to_action(press(KeyCode::Char('9')), true), Action::SetKind(8));
        assert_eq!(key_to_action(press(KeyCode::F(1)), true), Action::SetKind(9));
        assert_eq!(key_to_action(press(KeyCode::F(8)), true), Action::SetKind(16));
        assert_eq!(key_to_action(press(KeyCode::F(9)), true), Action::None);
    }

    #[test]
    fn control_chords_are_ignored() {
        let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert_eq!(key_to_action(key, false), Action::None);
    }
}
