// Copyright 2025 Eric Jingryd (tidynest@proton.me)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! src/core/parser.rs
//!
//! Chord string parser
//!
//! Chords are written as key names joined with `+`, for example
//! `CAPSLOCK`, `LEFTCTRL+C` or `LEFTCTRL+LEFTSHIFT+K`. This module turns
//! that syntax into [`KeyChord`] values. It handles:
//! - Canonical evdev key names and the documented aliases (`CTRL`, `SUPER`)
//! - Bare decimal key codes for keys without a name
//! - Whitespace around separators
//!
//! # Architecture
//! The parser uses nom combinators for the token structure and defers key
//! resolution to [`KeyId::from_str`](crate::core::keys::KeyId), so alias
//! handling lives in exactly one place. Parsing only happens at config load
//! and in CLI input paths, never per key event.

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0},
    multi::separated_list1,
    IResult, Parser,
};
use thiserror::Error;

use crate::core::keys::KeyId;
use crate::core::types::{KeyChord, MAX_CHORD_KEYS};

/// Errors produced while parsing chord syntax
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("chord is empty")]
    EmptyChord,

    #[error("unknown key name '{name}'")]
    UnknownKey { name: String },

    #[error("key '{key}' appears twice in the chord")]
    DuplicateKey { key: String },

    #[error("chord has {count} keys, the maximum is {MAX_CHORD_KEYS}")]
    TooManyKeys { count: usize },

    #[error("unexpected trailing input '{rest}'")]
    TrailingInput { rest: String },

    #[error("invalid chord syntax: {message}")]
    InvalidSyntax { message: String },
}

/// Parse a chord string into a [`KeyChord`]
///
/// # Arguments
/// * `input` - chord syntax, e.g. `"LEFTCTRL+C"`
///
/// # Returns
/// The parsed chord, or a [`ParseError`] naming the offending fragment.
///
/// # Example
/// ```
/// use keyremapd::core::parser::parse_chord;
///
/// let chord = parse_chord("LEFTCTRL+C").unwrap();
/// assert_eq!(chord.len(), 2);
/// assert_eq!(chord.to_string(), "LEFTCTRL+C");
/// ```
pub fn parse_chord(input: &str) -> Result<KeyChord, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyChord);
    }

    let (rest, tokens) = chord_tokens(trimmed).map_err(|e| ParseError::InvalidSyntax {
        message: format!("{:?}", e),
    })?;

    if !rest.trim().is_empty() {
        return Err(ParseError::TrailingInput {
            rest: rest.trim().to_string(),
        });
    }

    if tokens.len() > MAX_CHORD_KEYS {
        return Err(ParseError::TooManyKeys {
            count: tokens.len(),
        });
    }

    let mut keys: Vec<KeyId> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let key: KeyId = token.parse().map_err(|_| ParseError::UnknownKey {
            name: token.to_string(),
        })?;

        // Duplicates are checked after alias canonicalisation, so
        // "CTRL+LEFTCTRL" is caught too
        if keys.contains(&key) {
            return Err(ParseError::DuplicateKey {
                key: key.to_string(),
            });
        }
        keys.push(key);
    }

    Ok(KeyChord::new(keys))
}

/// Tokenize `KEY[+KEY...]` into raw name fragments
///
/// Accepts alphanumeric names with underscores; resolution against the key
/// table happens in [`parse_chord`].
fn chord_tokens(input: &str) -> IResult<&str, Vec<&str>> {
    separated_list1((space0, char('+'), space0), key_token).parse(input)
}

/// A single key token: letters, digits, underscores
fn key_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}
