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

use crate::core::parser::{parse_chord, ParseError};
use crate::core::types::KeyChord;
use crate::core::KeyId;

fn key(name: &str) -> KeyId {
    name.parse().unwrap()
}

#[test]
fn test_parse_single_key() {
    let chord = parse_chord("CAPSLOCK").unwrap();
    assert_eq!(chord, KeyChord::single(key("CAPSLOCK")));
}

#[test]
fn test_parse_two_key_chord() {
    let chord = parse_chord("LEFTCTRL+C").unwrap();
    assert_eq!(chord.len(), 2);
    assert!(chord.contains(key("LEFTCTRL")));
    assert!(chord.contains(key("C")));
}

#[test]
fn test_parse_tolerates_whitespace() {
    let chord = parse_chord("  LEFTCTRL + C ").unwrap();
    assert_eq!(chord, parse_chord("LEFTCTRL+C").unwrap());
}

#[test]
fn test_parse_is_case_insensitive() {
    let chord = parse_chord("leftctrl+c").unwrap();
    assert_eq!(chord, parse_chord("LEFTCTRL+C").unwrap());
}

#[test]
fn test_parse_accepts_aliases() {
    let chord = parse_chord("CTRL+SHIFT+K").unwrap();
    assert_eq!(chord.to_string(), "LEFTCTRL+LEFTSHIFT+K");
}

#[test]
fn test_parse_accepts_decimal_codes() {
    let chord = parse_chord("240+241").unwrap();
    assert_eq!(chord.len(), 2);
    assert_eq!(chord.to_string(), "240+241");
}

#[test]
fn test_parse_rejects_empty_input() {
    assert_eq!(parse_chord(""), Err(ParseError::EmptyChord));
    assert_eq!(parse_chord("   "), Err(ParseError::EmptyChord));
}

#[test]
fn test_parse_rejects_unknown_name() {
    let result = parse_chord("LEFTCTRL+NOTAKEY");
    assert_eq!(
        result,
        Err(ParseError::UnknownKey {
            name: "NOTAKEY".to_string()
        })
    );
}

#[test]
fn test_parse_rejects_duplicate_keys() {
    let result = parse_chord("A+A");
    assert!(matches!(result, Err(ParseError::DuplicateKey { .. })));
}

#[test]
fn test_parse_rejects_aliased_duplicates() {
    // CTRL canonicalises to LEFTCTRL, so this is the same key twice
    let result = parse_chord("CTRL+LEFTCTRL");
    assert!(matches!(result, Err(ParseError::DuplicateKey { .. })));
}

#[test]
fn test_parse_rejects_oversized_chords() {
    let result = parse_chord("A+B+C+D+E");
    assert_eq!(result, Err(ParseError::TooManyKeys { count: 5 }));
}

#[test]
fn test_parse_rejects_trailing_garbage() {
    let result = parse_chord("A+B!");
    assert!(matches!(result, Err(ParseError::TrailingInput { .. })));
}

#[test]
fn test_parse_rejects_dangling_separator() {
    let result = parse_chord("A+");
    assert!(matches!(result, Err(ParseError::TrailingInput { .. })));
}

#[test]
fn test_display_roundtrip() {
    for input in ["CAPSLOCK", "LEFTCTRL+C", "LEFTCTRL+LEFTSHIFT+K", "A+B+C+D"] {
        let chord = parse_chord(input).unwrap();
        let reparsed = parse_chord(&chord.to_string()).unwrap();
        assert_eq!(chord, reparsed, "{} should survive display + reparse", input);
    }
}
