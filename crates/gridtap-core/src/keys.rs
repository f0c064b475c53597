//! Key sequences sent to the trading client.
//!
//! Sequences are written as space-separated chords, e.g. `Ctrl+A Ctrl+C` or
//! `Alt+S Alt+Y`. Bridges receive the parsed [`KeySequence`] and usually
//! render it with [`KeySequence::to_send_keys`], the notation Windows
//! automation layers accept (`^a^c`, `%s%y`, `{ENTER}`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Non-character keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedKey {
    Enter,
    Tab,
    Escape,
    Backspace,
    Delete,
    Space,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Up,
    Down,
    Left,
    Right,
    /// Function key F1-F12.
    F(u8),
}

impl NamedKey {
    fn name(self) -> String {
        match self {
            NamedKey::Enter => "Enter".into(),
            NamedKey::Tab => "Tab".into(),
            NamedKey::Escape => "Escape".into(),
            NamedKey::Backspace => "Backspace".into(),
            NamedKey::Delete => "Delete".into(),
            NamedKey::Space => "Space".into(),
            NamedKey::Home => "Home".into(),
            NamedKey::End => "End".into(),
            NamedKey::PageUp => "PageUp".into(),
            NamedKey::PageDown => "PageDown".into(),
            NamedKey::Insert => "Insert".into(),
            NamedKey::Up => "Up".into(),
            NamedKey::Down => "Down".into(),
            NamedKey::Left => "Left".into(),
            NamedKey::Right => "Right".into(),
            NamedKey::F(n) => format!("F{}", n),
        }
    }

    fn send_keys_code(self) -> String {
        match self {
            NamedKey::Enter => "{ENTER}".into(),
            NamedKey::Tab => "{TAB}".into(),
            NamedKey::Escape => "{ESC}".into(),
            NamedKey::Backspace => "{BACKSPACE}".into(),
            NamedKey::Delete => "{DELETE}".into(),
            NamedKey::Space => "{SPACE}".into(),
            NamedKey::Home => "{HOME}".into(),
            NamedKey::End => "{END}".into(),
            NamedKey::PageUp => "{PGUP}".into(),
            NamedKey::PageDown => "{PGDN}".into(),
            NamedKey::Insert => "{INSERT}".into(),
            NamedKey::Up => "{UP}".into(),
            NamedKey::Down => "{DOWN}".into(),
            NamedKey::Left => "{LEFT}".into(),
            NamedKey::Right => "{RIGHT}".into(),
            NamedKey::F(n) => format!("{{F{}}}", n),
        }
    }
}

/// A single key, named or literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Key {
    Named(NamedKey),
    Char(char),
}

/// A key plus the modifiers held while pressing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChord {
    pub key: Key,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ctrl: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub alt: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub shift: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl KeyChord {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            alt: false,
            shift: false,
        }
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            write!(f, "Ctrl+")?;
        }
        if self.alt {
            write!(f, "Alt+")?;
        }
        if self.shift {
            write!(f, "Shift+")?;
        }
        match self.key {
            Key::Named(named) => write!(f, "{}", named.name()),
            Key::Char('+') => write!(f, "Plus"),
            Key::Char(c) if self.ctrl || self.alt => write!(f, "{}", c.to_ascii_uppercase()),
            Key::Char(c) => write!(f, "{}", c),
        }
    }
}

/// Returns the named key for a key name, case insensitive.
fn named_key(key: &str) -> Option<Key> {
    let key_lower = key.to_lowercase();
    let named = match key_lower.as_str() {
        "enter" | "return" => NamedKey::Enter,
        "tab" => NamedKey::Tab,
        "escape" | "esc" => NamedKey::Escape,
        "backspace" => NamedKey::Backspace,
        "delete" | "del" => NamedKey::Delete,
        "space" => NamedKey::Space,
        "home" => NamedKey::Home,
        "end" => NamedKey::End,
        "pageup" | "pgup" => NamedKey::PageUp,
        "pagedown" | "pgdn" => NamedKey::PageDown,
        "insert" | "ins" => NamedKey::Insert,
        "up" | "arrowup" => NamedKey::Up,
        "down" | "arrowdown" => NamedKey::Down,
        "left" | "arrowleft" => NamedKey::Left,
        "right" | "arrowright" => NamedKey::Right,
        // Named alias for literal + (since + is the combo separator)
        "plus" => return Some(Key::Char('+')),
        other => {
            let n: u8 = other.strip_prefix('f')?.parse().ok()?;
            if !(1..=12).contains(&n) {
                return None;
            }
            NamedKey::F(n)
        }
    };
    Some(Key::Named(named))
}

/// Parse a chord like "Ctrl+C", "Alt+S" or "Enter".
///
/// Shift on a letter becomes the uppercase letter. Letters under Ctrl or
/// Alt are normalized to lowercase so `Ctrl+C` and `ctrl+c` are the same
/// chord.
fn parse_chord(combo: &str) -> Option<KeyChord> {
    let mut ctrl = false;
    let mut alt = false;
    let mut shift = false;
    let mut key_part = "";

    for part in combo.split('+') {
        match part.to_lowercase().as_str() {
            "ctrl" | "control" => ctrl = true,
            "alt" | "meta" | "option" => alt = true,
            "shift" => shift = true,
            _ => key_part = part,
        }
    }

    if key_part.is_empty() {
        return None;
    }

    if let Some(key) = named_key(key_part) {
        return Some(KeyChord {
            key,
            ctrl,
            alt,
            shift,
        });
    }

    let mut chars = key_part.chars();
    let (Some(mut c), None) = (chars.next(), chars.next()) else {
        return None;
    };

    if shift && c.is_ascii_alphabetic() {
        c = c.to_ascii_uppercase();
        shift = false;
    } else if (ctrl || alt) && c.is_ascii_alphabetic() {
        c = c.to_ascii_lowercase();
    }

    Some(KeyChord {
        key: Key::Char(c),
        ctrl,
        alt,
        shift,
    })
}

/// An ordered list of chords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySequence {
    chords: Vec<KeyChord>,
}

impl KeySequence {
    /// Parse a space-separated key sequence.
    ///
    /// ```
    /// use gridtap_core::keys::KeySequence;
    ///
    /// let copy = KeySequence::parse("Ctrl+A Ctrl+C").unwrap();
    /// assert_eq!(copy.chords().len(), 2);
    /// assert_eq!(copy.to_send_keys(), "^a^c");
    /// ```
    pub fn parse(sequence: &str) -> Result<Self, GridError> {
        let chords = sequence
            .split_whitespace()
            .map(parse_chord)
            .collect::<Option<Vec<_>>>()
            .filter(|chords| !chords.is_empty())
            .ok_or_else(|| GridError::InvalidKeys(sequence.to_string()))?;
        Ok(Self { chords })
    }

    pub fn chords(&self) -> &[KeyChord] {
        &self.chords
    }

    /// Render in the `^`/`%`/`+` send-keys notation.
    pub fn to_send_keys(&self) -> String {
        let mut out = String::new();
        for chord in &self.chords {
            if chord.ctrl {
                out.push('^');
            }
            if chord.alt {
                out.push('%');
            }
            if chord.shift {
                out.push('+');
            }
            match chord.key {
                Key::Named(named) => out.push_str(&named.send_keys_code()),
                // Characters with a meaning in the notation must be braced
                Key::Char(c @ ('+' | '^' | '%' | '~' | '(' | ')' | '{' | '}' | '[' | ']')) => {
                    out.push('{');
                    out.push(c);
                    out.push('}');
                }
                Key::Char(' ') => out.push_str("{SPACE}"),
                Key::Char(c) => out.push(c),
            }
        }
        out
    }
}

impl FromStr for KeySequence {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for KeySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chord) in self.chords.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", chord)?;
        }
        Ok(())
    }
}
