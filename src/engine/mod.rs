// Copyright 2025 bakri (tidynest@proton.me)
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

//! src/engine/mod.rs
//!
//! The interception engine
//!
//! One message loop owns every remapping decision. Grabbed devices feed
//! raw key events into it; the config watcher, the focus poller, the
//! parent watcher, and the signal handler only ever post messages. The
//! loop consults the published table snapshot, the mirrored suspension
//! flag, and the cached focus, then emits through the virtual output
//! device. Table swaps go through an [`ArcSwap`] so the loop always sees
//! one consistent snapshot per event.
//!
//! Module layout:
//! - [`hook`]: device grabbing, reader threads, uinput synthesis
//! - [`interceptor`]: the pure per-event rewrite state machine
//! - [`context`]: focused-application providers
//! - [`lifecycle`]: instance lock, parent watching, signal handling

pub mod context;
pub mod hook;
pub mod interceptor;
pub mod lifecycle;

pub use context::{FocusProvider, HyprlandFocus, NoFocus};
pub use hook::{EvdevHook, HookError, KeyAction, KeyEvent};
pub use interceptor::{Interceptor, Response, SideEffect};
pub use lifecycle::{InstanceLock, LockState};

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::config::{ConfigError, ConfigManager, ConfigWatcher};
use crate::core::{validator, RemapTable};
use crate::ipc::{SuspensionFlag, SuspensionState};

/// Mirror cadence of the cross-process suspension flag.
const SUSPENSION_POLL: Duration = Duration::from_millis(25);

/// Focus query cadence.
const FOCUS_POLL: Duration = Duration::from_millis(100);

/// Loop wake-up bound when no chord window is armed.
const IDLE_TICK: Duration = Duration::from_millis(500);

/// Fatal engine failures surfaced to the binary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Device hook error: {0}")]
    Hook(#[from] HookError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to acquire the instance lock at {path}: {source}")]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to install the signal handler: {0}")]
    Signals(#[from] ctrlc::Error),
}

/// Lifecycle states of the engine, logged on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No hook resources held.
    Uninstalled,
    /// Devices grabbed and the output device created, loop not serving yet.
    Installed,
    /// Serving events against the live table.
    Intercepting,
    /// An editor holds the suspension flag: events pass through untouched.
    Suspended,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Uninstalled => write!(f, "uninstalled"),
            EngineState::Installed => write!(f, "installed"),
            EngineState::Intercepting => write!(f, "intercepting"),
            EngineState::Suspended => write!(f, "suspended"),
        }
    }
}

/// Messages posted into the engine loop.
#[derive(Debug)]
pub enum EngineEvent {
    /// A raw key event from a grabbed device.
    Key(KeyEvent),
    /// The remap document changed on disk.
    Reload,
    /// The focused application class changed.
    Focus(Option<String>),
    /// Tear down and exit; the payload names the cause for the log.
    Shutdown(&'static str),
}

/// Startup options for [`Engine::run`].
pub struct EngineOptions {
    /// Path of the remap document.
    pub document_path: PathBuf,
    /// Devices to grab; empty means auto-detect keyboards.
    pub devices: Vec<PathBuf>,
    /// Launcher PID to watch; the engine exits when it does.
    pub parent_pid: Option<u32>,
    /// Focused-application provider; `None` disables app scopes.
    pub focus: Option<Box<dyn FocusProvider>>,
}

/// The engine loop and everything it owns.
pub struct Engine {
    manager: ConfigManager,
    table: Arc<ArcSwap<RemapTable>>,
    interceptor: Interceptor,
    hook: EvdevHook,
    state: EngineState,
    suspended: Arc<AtomicBool>,
    focus: Option<String>,
    events: Receiver<EngineEvent>,
    effects: Sender<SideEffect>,
    _watcher: ConfigWatcher,
    _lock: InstanceLock,
}

impl Engine {
    /// Runs the engine to completion.
    ///
    /// Returns `Ok(())` both on graceful shutdown and when another
    /// instance already holds the lock, so relaunching is idempotent.
    ///
    /// # Errors
    ///
    /// Fails when the lock file is inaccessible, the document unreadable,
    /// no keyboard can be grabbed, or the signal handler cannot install.
    pub fn run(options: EngineOptions) -> Result<(), EngineError> {
        let lock = match InstanceLock::acquire()? {
            LockState::Acquired(lock) => lock,
            LockState::AlreadyRunning { pid: Some(pid) } => {
                info!(pid, "Another engine instance is already running");
                return Ok(());
            }
            LockState::AlreadyRunning { pid: None } => {
                info!("Another engine instance is already running");
                return Ok(());
            }
        };

        let manager = ConfigManager::new(options.document_path)?;
        let document = manager.load()?;
        let window = document.chord_window();
        let (initial, defects) = RemapTable::build(document.remaps);
        for defect in &defects {
            warn!(%defect, "Dropped a defective entry from the loaded document");
        }
        info!(
            path = %manager.document_path().display(),
            entries = initial.len(),
            "Loaded remap table"
        );

        let (tx, rx) = mpsc::channel::<EngineEvent>();

        let hook = EvdevHook::install(&options.devices, tx.clone())?;

        let suspended = Arc::new(AtomicBool::new(false));
        spawn_suspension_poller(Arc::clone(&suspended));

        let watcher = {
            let tx = tx.clone();
            ConfigWatcher::spawn(manager.document_path(), move || {
                let _ = tx.send(EngineEvent::Reload);
            })?
        };

        if let Some(provider) = options.focus {
            spawn_focus_poller(provider, tx.clone());
        }
        if let Some(pid) = options.parent_pid {
            lifecycle::watch_parent(pid, tx.clone());
        }
        lifecycle::install_signal_handler(tx)?;

        let mut engine = Engine {
            manager,
            table: Arc::new(ArcSwap::from_pointee(initial)),
            interceptor: Interceptor::new(window),
            hook,
            state: EngineState::Uninstalled,
            suspended,
            focus: None,
            events: rx,
            effects: spawn_effect_runner(),
            _watcher: watcher,
            _lock: lock,
        };
        engine.transition(EngineState::Installed);
        engine.serve();
        Ok(())
    }

    /// Serves events until a shutdown message arrives or every sender is
    /// gone. The hook and the instance lock release when the engine drops.
    fn serve(&mut self) {
        info!(devices = ?self.hook.devices(), "Engine serving");
        self.transition(EngineState::Intercepting);

        loop {
            self.sync_suspension();
            let timeout = self
                .interceptor
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(IDLE_TICK)
                .min(IDLE_TICK);

            match self.events.recv_timeout(timeout) {
                Ok(EngineEvent::Key(event)) => self.on_key(event),
                Ok(EngineEvent::Reload) => self.reload(),
                Ok(EngineEvent::Focus(app)) => {
                    debug!(app = app.as_deref().unwrap_or("none"), "Focus changed");
                    self.focus = app;
                }
                Ok(EngineEvent::Shutdown(reason)) => {
                    info!(reason, "Shutting down");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => self.on_tick(),
                Err(RecvTimeoutError::Disconnected) => {
                    error!("All event sources disconnected");
                    break;
                }
            }
        }

        self.transition(EngineState::Uninstalled);
    }

    fn on_key(&mut self, event: KeyEvent) {
        let suspended = self.suspended.load(Ordering::Relaxed);
        let table = self.table.load();
        let response =
            self.interceptor
                .process(event, &table, self.focus.as_deref(), suspended, Instant::now());
        trace!(
            key = %event.key,
            action = ?event.action,
            emitted = response.events.len(),
            "Classified key event"
        );
        self.dispatch(response);
    }

    fn on_tick(&mut self) {
        let suspended = self.suspended.load(Ordering::Relaxed);
        let table = self.table.load();
        let response =
            self.interceptor
                .poll(&table, self.focus.as_deref(), suspended, Instant::now());
        if !response.is_empty() {
            self.dispatch(response);
        }
    }

    /// Emits synthesized events and hands side effects to the spawner.
    /// Emission failures are logged and dropped; interception continues.
    fn dispatch(&mut self, response: Response) {
        if let Err(e) = self.hook.emit(&response.events) {
            warn!(error = %e, "Failed to emit synthesized events");
        }
        for effect in response.effects {
            if self.effects.send(effect).is_err() {
                warn!("Action spawner is gone, dropping the action");
            }
        }
    }

    /// Reloads the document after a watcher notification. A document that
    /// fails to parse or carries blocking conflicts leaves the previous
    /// table live.
    fn reload(&mut self) {
        let document = match self.manager.load() {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "Reload failed, keeping the previous table");
                return;
            }
        };

        let conflicts = validator::check_conflicts(&document.remaps);
        if !conflicts.is_empty() {
            for conflict in &conflicts {
                warn!(%conflict, "Reloaded document has a blocking conflict");
            }
            warn!("Keeping the previous table");
            return;
        }

        let window = document.chord_window();
        let (table, defects) = RemapTable::build(document.remaps);
        for defect in &defects {
            warn!(%defect, "Dropped a defective entry");
        }
        let entries = table.len();
        self.table.store(Arc::new(table));
        self.interceptor.set_window(window);
        info!(entries, "Reloaded remap table");
    }

    /// Mirrors the suspension flag into the engine state, with one log
    /// line per transition. The event path reads the atomic directly.
    fn sync_suspension(&mut self) {
        let suspended = self.suspended.load(Ordering::Relaxed);
        match (self.state, suspended) {
            (EngineState::Intercepting, true) => self.transition(EngineState::Suspended),
            (EngineState::Suspended, false) => self.transition(EngineState::Intercepting),
            _ => {}
        }
    }

    fn transition(&mut self, next: EngineState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "Engine state changed");
            self.state = next;
        }
    }
}

/// Mirrors the editor-held suspension flag into an atomic the loop reads
/// per event. Runs until process exit.
fn spawn_suspension_poller(suspended: Arc<AtomicBool>) {
    let flag = SuspensionFlag::at_runtime_dir();
    let spawn = thread::Builder::new().name("suspension-poll".into()).spawn(move || loop {
        let state = flag.poll();
        suspended.store(state == SuspensionState::Suspended, Ordering::Relaxed);
        thread::sleep(SUSPENSION_POLL);
    });
    if let Err(e) = spawn {
        warn!(error = %e, "Could not start the suspension poller");
    }
}

/// Polls the focus provider and posts a message on each change.
fn spawn_focus_poller(mut provider: Box<dyn FocusProvider>, events: Sender<EngineEvent>) {
    let spawn = thread::Builder::new().name("focus-poll".into()).spawn(move || {
        let mut last: Option<String> = None;
        loop {
            let app = provider.active_app();
            if app != last {
                last.clone_from(&app);
                if events.send(EngineEvent::Focus(app)).is_err() {
                    return;
                }
            }
            thread::sleep(FOCUS_POLL);
        }
    });
    if let Err(e) = spawn {
        warn!(error = %e, "Could not start the focus poller");
    }
}

/// Starts the thread that runs [`SideEffect`]s away from the event path.
/// Launched children are reaped as they finish.
fn spawn_effect_runner() -> Sender<SideEffect> {
    let (tx, rx) = mpsc::channel::<SideEffect>();
    let spawn = thread::Builder::new().name("spawner".into()).spawn(move || {
        let mut children: Vec<Child> = Vec::new();
        loop {
            match rx.recv_timeout(Duration::from_secs(1)) {
                Ok(effect) => {
                    if let Some(child) = run_effect(effect) {
                        children.push(child);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            children.retain_mut(|child| !matches!(child.try_wait(), Ok(Some(_))));
        }
    });
    if let Err(e) = spawn {
        warn!(error = %e, "Could not start the action spawner");
    }
    tx
}

fn run_effect(effect: SideEffect) -> Option<Child> {
    match effect {
        SideEffect::Launch { program, args } => {
            let mut command = Command::new(&program);
            if let Some(args) = &args {
                command.args(args.split_whitespace());
            }
            match command.spawn() {
                Ok(child) => {
                    debug!(program = %program, pid = child.id(), "Launched program");
                    Some(child)
                }
                Err(e) => {
                    warn!(program = %program, error = %e, "Failed to launch program");
                    None
                }
            }
        }
        SideEffect::OpenUri { uri } => {
            if let Err(e) = open::that_detached(&uri) {
                warn!(uri = %uri, error = %e, "Failed to open URI");
            }
            None
        }
    }
}
