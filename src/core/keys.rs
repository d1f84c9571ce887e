//! Physical key identifiers
//!
//! A [`KeyId`] wraps the Linux evdev key code for a physical key. The engine
//! never interprets what a key *types* (layouts and IMEs live elsewhere);
//! it only cares about code identity, so equality and hashing are by code.
//!
//! Codes render as the evdev key name where one is known (`"CAPSLOCK"`,
//! `"A"`, `"F5"`) and as the bare decimal code otherwise, so any code a
//! device can produce survives a trip through the config document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier for a physical key (evdev key code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyId(u16);

impl KeyId {
    /// Wraps a raw evdev key code.
    pub const fn new(code: u16) -> Self {
        KeyId(code)
    }

    /// Returns the raw evdev key code.
    pub const fn code(self) -> u16 {
        self.0
    }

    /// Returns the canonical key name, if this code has one.
    pub fn name(self) -> Option<&'static str> {
        KEY_NAMES
            .iter()
            .find(|(_, code)| *code == self.0)
            .map(|(name, _)| *name)
    }

    /// True for modifier keys (Ctrl/Shift/Alt/Meta, either side).
    ///
    /// Modifiers are never withheld by the chord window: holding Ctrl must
    /// keep working as plain Ctrl until a chord actually completes.
    pub fn is_modifier(self) -> bool {
        matches!(
            self.0,
            KEY_LEFTCTRL
                | KEY_LEFTSHIFT
                | KEY_RIGHTSHIFT
                | KEY_LEFTALT
                | KEY_RIGHTCTRL
                | KEY_RIGHTALT
                | KEY_LEFTMETA
                | KEY_RIGHTMETA
        )
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Key name was not recognised and is not a bare decimal code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key name: '{0}'")]
pub struct UnknownKey(pub String);

impl FromStr for KeyId {
    type Err = UnknownKey;

    /// Parses a canonical key name, one of the accepted aliases, or a bare
    /// decimal code. Matching is case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        if upper.is_empty() {
            return Err(UnknownKey(s.to_string()));
        }

        if let Some((_, code)) = KEY_NAMES.iter().find(|(name, _)| *name == upper) {
            return Ok(KeyId(*code));
        }
        if let Some((_, code)) = KEY_ALIASES.iter().find(|(alias, _)| *alias == upper) {
            return Ok(KeyId(*code));
        }

        // Bare decimal fallback keeps exotic codes round-trippable
        upper
            .parse::<u16>()
            .map(KeyId)
            .map_err(|_| UnknownKey(s.to_string()))
    }
}

impl TryFrom<String> for KeyId {
    type Error = UnknownKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyId> for String {
    fn from(key: KeyId) -> String {
        key.to_string()
    }
}

const KEY_LEFTCTRL: u16 = 29;
const KEY_LEFTSHIFT: u16 = 42;
const KEY_RIGHTSHIFT: u16 = 54;
const KEY_LEFTALT: u16 = 56;
const KEY_RIGHTCTRL: u16 = 97;
const KEY_RIGHTALT: u16 = 100;
const KEY_LEFTMETA: u16 = 125;
const KEY_RIGHTMETA: u16 = 126;

/// Canonical names for the evdev codes this engine expects to see on
/// ordinary keyboards (linux/input-event-codes.h spellings, `KEY_` prefix
/// dropped). Lookup is a linear scan: name parsing only happens at config
/// load and in CLI output, never per event.
const KEY_NAMES: &[(&str, u16)] = &[
    ("ESC", 1),
    ("1", 2),
    ("2", 3),
    ("3", 4),
    ("4", 5),
    ("5", 6),
    ("6", 7),
    ("7", 8),
    ("8", 9),
    ("9", 10),
    ("0", 11),
    ("MINUS", 12),
    ("EQUAL", 13),
    ("BACKSPACE", 14),
    ("TAB", 15),
    ("Q", 16),
    ("W", 17),
    ("E", 18),
    ("R", 19),
    ("T", 20),
    ("Y", 21),
    ("U", 22),
    ("I", 23),
    ("O", 24),
    ("P", 25),
    ("LEFTBRACE", 26),
    ("RIGHTBRACE", 27),
    ("ENTER", 28),
    ("LEFTCTRL", KEY_LEFTCTRL),
    ("A", 30),
    ("S", 31),
    ("D", 32),
    ("F", 33),
    ("G", 34),
    ("H", 35),
    ("J", 36),
    ("K", 37),
    ("L", 38),
    ("SEMICOLON", 39),
    ("APOSTROPHE", 40),
    ("GRAVE", 41),
    ("LEFTSHIFT", KEY_LEFTSHIFT),
    ("BACKSLASH", 43),
    ("Z", 44),
    ("X", 45),
    ("C", 46),
    ("V", 47),
    ("B", 48),
    ("N", 49),
    ("M", 50),
    ("COMMA", 51),
    ("DOT", 52),
    ("SLASH", 53),
    ("RIGHTSHIFT", KEY_RIGHTSHIFT),
    ("KPASTERISK", 55),
    ("LEFTALT", KEY_LEFTALT),
    ("SPACE", 57),
    ("CAPSLOCK", 58),
    ("F1", 59),
    ("F2", 60),
    ("F3", 61),
    ("F4", 62),
    ("F5", 63),
    ("F6", 64),
    ("F7", 65),
    ("F8", 66),
    ("F9", 67),
    ("F10", 68),
    ("NUMLOCK", 69),
    ("SCROLLLOCK", 70),
    ("KP7", 71),
    ("KP8", 72),
    ("KP9", 73),
    ("KPMINUS", 74),
    ("KP4", 75),
    ("KP5", 76),
    ("KP6", 77),
    ("KPPLUS", 78),
    ("KP1", 79),
    ("KP2", 80),
    ("KP3", 81),
    ("KP0", 82),
    ("KPDOT", 83),
    ("F11", 87),
    ("F12", 88),
    ("KPENTER", 96),
    ("RIGHTCTRL", KEY_RIGHTCTRL),
    ("KPSLASH", 98),
    ("SYSRQ", 99),
    ("RIGHTALT", KEY_RIGHTALT),
    ("HOME", 102),
    ("UP", 103),
    ("PAGEUP", 104),
    ("LEFT", 105),
    ("RIGHT", 106),
    ("END", 107),
    ("DOWN", 108),
    ("PAGEDOWN", 109),
    ("INSERT", 110),
    ("DELETE", 111),
    ("MUTE", 113),
    ("VOLUMEDOWN", 114),
    ("VOLUMEUP", 115),
    ("PAUSE", 119),
    ("LEFTMETA", KEY_LEFTMETA),
    ("RIGHTMETA", KEY_RIGHTMETA),
    ("COMPOSE", 127),
];

/// Convenience spellings accepted on input only; they canonicalise to the
/// left-hand variant (the document always stores canonical names).
const KEY_ALIASES: &[(&str, u16)] = &[
    ("CTRL", KEY_LEFTCTRL),
    ("CONTROL", KEY_LEFTCTRL),
    ("SHIFT", KEY_LEFTSHIFT),
    ("ALT", KEY_LEFTALT),
    ("META", KEY_LEFTMETA),
    ("SUPER", KEY_LEFTMETA),
    ("WIN", KEY_LEFTMETA),
    ("ESCAPE", 1),
    ("RETURN", 28),
];
