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

//! File system watcher for live config reloads
//!
//! Uses OS-level file watching (Linux inotify) via the notify crate.
//! Zero CPU overhead when the document is unchanged; a save from the
//! editor reaches the engine as a single change report.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    sync::mpsc::{channel, Receiver},
    thread,
    time::Duration,
};
use tracing::warn;

use crate::config::ConfigError;

/// A save is a short burst of create/rename/metadata events; changes inside
/// this window collapse into one report.
const DEBOUNCE: Duration = Duration::from_millis(150);

/// Watches the config document for modifications and reports via callback.
///
/// The callback runs on a dedicated watcher thread, once per settled burst
/// of file events. Dropping the watcher stops the reports.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Starts watching `document`, invoking `on_change` after each change.
    ///
    /// # Errors
    ///
    /// Fails if the document's directory cannot be watched or the watcher
    /// thread cannot be spawned.
    pub fn spawn(
        document: &Path,
        on_change: impl Fn() + Send + 'static,
    ) -> Result<Self, ConfigError> {
        // Watch the directory, not the file: atomic saves replace the file
        // by rename, which would orphan a watch on the file itself.
        let dir = match document.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = document.file_name().map(OsStr::to_os_string);

        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        thread::Builder::new()
            .name("config-watcher".into())
            .spawn(move || watch_loop(&rx, file_name.as_deref(), on_change))?;

        Ok(Self { _watcher: watcher })
    }
}

fn watch_loop(
    rx: &Receiver<notify::Result<Event>>,
    file_name: Option<&OsStr>,
    on_change: impl Fn(),
) {
    while let Ok(result) = rx.recv() {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                warn!("Config watcher error: {}", e);
                continue;
            }
        };

        if !is_relevant(&event, file_name) {
            continue;
        }

        // Let the burst settle, then report once.
        while rx.recv_timeout(DEBOUNCE).is_ok() {}
        on_change();
    }
}

/// True when the event could change the watched document's content.
fn is_relevant(event: &Event, file_name: Option<&OsStr>) -> bool {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return false;
    }

    match file_name {
        Some(name) => event.paths.iter().any(|p| p.file_name() == Some(name)),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind};

    fn modify_event(path: &str) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any)))
            .add_path(PathBuf::from(path))
    }

    #[test]
    fn test_event_for_watched_file_is_relevant() {
        let event = modify_event("/tmp/keyremapd/remaps.json");
        assert!(is_relevant(&event, Some(OsStr::new("remaps.json"))));
    }

    #[test]
    fn test_event_for_sibling_file_is_ignored() {
        let event = modify_event("/tmp/keyremapd/other.json");
        assert!(!is_relevant(&event, Some(OsStr::new("remaps.json"))));
    }

    #[test]
    fn test_create_counts_as_change() {
        // Atomic saves surface as a create or rename of the final name.
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/tmp/keyremapd/remaps.json"));
        assert!(is_relevant(&event, Some(OsStr::new("remaps.json"))));
    }

    #[test]
    fn test_access_events_are_ignored() {
        let event = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/tmp/keyremapd/remaps.json"));
        assert!(!is_relevant(&event, Some(OsStr::new("remaps.json"))));
    }

    #[test]
    fn test_watcher_spawns_on_real_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let document = dir.path().join("remaps.json");

        let watcher = ConfigWatcher::spawn(&document, || {});
        assert!(watcher.is_ok(), "Watching an existing directory should succeed");
    }
}
