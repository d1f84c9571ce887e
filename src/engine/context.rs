//! Focused-application tracking for per-app scopes
//!
//! A [`FocusProvider`] answers one question: which application class is
//! focused right now? Providers are polled from a background thread,
//! never from the event path; the engine loop caches the latest answer
//! and feeds it into scoped lookups. Any provider failure degrades to
//! "unknown", which resolves global mappings only.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use tracing::debug;

/// Source of the focused application class, lowercase.
pub trait FocusProvider: Send {
    /// The focused application class, or `None` when there is none or the
    /// provider cannot tell.
    fn active_app(&mut self) -> Option<String>;
}

/// Disables per-application scopes: every lookup sees no focused app.
pub struct NoFocus;

impl FocusProvider for NoFocus {
    fn active_app(&mut self) -> Option<String> {
        None
    }
}

/// Asks the Hyprland compositor for the focused window class.
///
/// Speaks the plain-text request socket directly: one connection per
/// query, command `activewindow`, class parsed out of the reply. A
/// compositor restart or a dead socket just yields `None` until the
/// socket answers again.
pub struct HyprlandFocus {
    socket: PathBuf,
}

impl HyprlandFocus {
    /// Locates the compositor request socket from the session environment.
    ///
    /// Returns `None` outside a Hyprland session.
    pub fn detect() -> Option<Self> {
        let signature = std::env::var("HYPRLAND_INSTANCE_SIGNATURE").ok()?;

        if let Ok(runtime) = std::env::var("XDG_RUNTIME_DIR") {
            let socket = PathBuf::from(runtime)
                .join("hypr")
                .join(&signature)
                .join(".socket.sock");
            if socket.exists() {
                return Some(Self { socket });
            }
        }

        // Compositor versions before 0.40 kept sockets under /tmp
        let legacy = PathBuf::from("/tmp/hypr").join(&signature).join(".socket.sock");
        legacy.exists().then_some(Self { socket: legacy })
    }

    fn query(&self) -> std::io::Result<String> {
        let mut stream = UnixStream::connect(&self.socket)?;
        stream.write_all(b"activewindow")?;
        let mut reply = String::new();
        stream.read_to_string(&mut reply)?;
        Ok(reply)
    }
}

impl FocusProvider for HyprlandFocus {
    fn active_app(&mut self) -> Option<String> {
        match self.query() {
            Ok(reply) => parse_window_class(&reply),
            Err(e) => {
                debug!(error = %e, "Focus query failed");
                None
            }
        }
    }
}

/// Pulls the `class:` field out of an `activewindow` reply, lowercased to
/// match scope normalization.
fn parse_window_class(reply: &str) -> Option<String> {
    for line in reply.lines() {
        if let Some(value) = line.trim().strip_prefix("class: ") {
            let class = value.trim();
            if class.is_empty() {
                return None;
            }
            return Some(class.to_lowercase());
        }
    }
    None
}
