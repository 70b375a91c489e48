//! Keyboard input for the looper.
//!
//! The terminal is only in raw mode while waiting for a key, so log lines
//! printed in between keep their normal line endings.

use std::io;

use crossterm::event::{ self, Event, KeyCode, KeyEventKind, KeyModifiers };
use crossterm::terminal::{ disable_raw_mode, enable_raw_mode };


/// What a key press asks the looper to do.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum KeyAction {
    TogglePause,
    Restart,
    Next,
    Previous,
    List,
    VolumeUp,
    VolumeDown,
    Help,
    Quit,
}


impl KeyAction {
    /// Maps a key to its action, if it has one.
    pub fn from_key( code: KeyCode, modifiers: KeyModifiers ) -> Option<Self> {
        if modifiers.contains( KeyModifiers::CONTROL ) && code == KeyCode::Char( 'c' ) {
            return Some( KeyAction::Quit );
        }

        match code {
            KeyCode::Char( ' ' ) => Some( KeyAction::TogglePause ),
            KeyCode::Char( 'r' ) => Some( KeyAction::Restart ),
            KeyCode::Char( 'n' ) | KeyCode::Right => Some( KeyAction::Next ),
            KeyCode::Char( 'p' ) | KeyCode::Left => Some( KeyAction::Previous ),
            KeyCode::Char( 'l' ) => Some( KeyAction::List ),
            KeyCode::Char( '+' ) | KeyCode::Char( '=' ) => Some( KeyAction::VolumeUp ),
            KeyCode::Char( '-' ) | KeyCode::Char( '_' ) => Some( KeyAction::VolumeDown ),
            KeyCode::Char( '?' ) | KeyCode::Char( 'h' ) => Some( KeyAction::Help ),
            KeyCode::Char( 'q' ) | KeyCode::Enter | KeyCode::Esc => Some( KeyAction::Quit ),
            _ => None,
        }
    }
}


/// Keeps the terminal in raw mode until dropped.
struct RawMode;


impl RawMode {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok( RawMode )
    }
}


impl Drop for RawMode {
    fn drop( &mut self ) {
        let _ = disable_raw_mode();
    }
}


/// Blocks until a key with an action is pressed.
pub fn read_action() -> io::Result<KeyAction> {
    let _raw = RawMode::enable()?;

    loop {
        if let Event::Key( key ) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some( action ) = KeyAction::from_key( key.code, key.modifiers ) {
                return Ok( action );
            }
        }
    }
}


/// One line per key binding.
pub fn help_text() -> &'static str {
    r#"Keys:
  space     Pause / resume
  r         Restart track
  n / p     Next / previous track
  l         List tracks
  + / -     Volume up / down
  ?         Show this help
  q, Enter  Quit"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_key_bindings() {
        let none = KeyModifiers::NONE;
        assert_eq!( KeyAction::from_key( KeyCode::Char( ' ' ), none ), Some( KeyAction::TogglePause ) );
        assert_eq!( KeyAction::from_key( KeyCode::Char( 'r' ), none ), Some( KeyAction::Restart ) );
        assert_eq!( KeyAction::from_key( KeyCode::Char( 'n' ), none ), Some( KeyAction::Next ) );
        assert_eq!( KeyAction::from_key( KeyCode::Left, none ), Some( KeyAction::Previous ) );
        assert_eq!( KeyAction::from_key( KeyCode::Enter, none ), Some( KeyAction::Quit ) );
        assert_eq!( KeyAction::from_key( KeyCode::Char( 'x' ), none ), None );
    }


    #[test]
    fn test_ctrl_c_quits() {
        assert_eq!(
            KeyAction::from_key( KeyCode::Char( 'c' ), KeyModifiers::CONTROL ),
            Some( KeyAction::Quit )
        );
        assert_eq!( KeyAction::from_key( KeyCode::Char( 'c' ), KeyModifiers::NONE ), None );
    }
}
