//! src/config/document.rs
//!
//! On-disk schema for the remap configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::RemapEntry;

/// How long a chord-prefix press is withheld before it is resolved as a
/// single key, in milliseconds.
pub const DEFAULT_CHORD_WINDOW_MS: u64 = 50;

/// The persisted remap configuration.
///
/// Serialized as pretty JSON. A missing document is equivalent to the
/// default: no remaps, default chord window.
///
/// # Example
///
/// ```
/// use keyremapd::config::RemapDocument;
///
/// let doc: RemapDocument = serde_json::from_str(
///     r#"{ "remaps": [ { "source": "CAPSLOCK", "action": { "kind": "key", "to": "ESC" } } ] }"#,
/// )?;
/// assert_eq!(doc.remaps.len(), 1);
/// assert_eq!(doc.chord_window_ms, 50);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapDocument {
    /// Chord resolution window in milliseconds.
    #[serde(default = "default_chord_window")]
    pub chord_window_ms: u64,

    /// All remap entries, global and app-scoped alike.
    #[serde(default)]
    pub remaps: Vec<RemapEntry>,
}

fn default_chord_window() -> u64 {
    DEFAULT_CHORD_WINDOW_MS
}

impl Default for RemapDocument {
    fn default() -> Self {
        Self {
            chord_window_ms: DEFAULT_CHORD_WINDOW_MS,
            remaps: Vec::new(),
        }
    }
}

impl RemapDocument {
    /// The chord window as a duration, floored at 1ms so the engine's
    /// deadline arithmetic never degenerates to a busy loop.
    pub fn chord_window(&self) -> Duration {
        Duration::from_millis(self.chord_window_ms.max(1))
    }

    /// Parses a document from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Renders the document as pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}
