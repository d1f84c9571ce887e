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

//! src/engine/interceptor.rs
//!
//! The per-event rewrite state machine
//!
//! One [`Interceptor`] instance, owned by the engine loop, classifies
//! every raw key event against a table snapshot and answers with the
//! events to synthesize. It is deliberately pure: no device I/O, no clock
//! reads, no logging, so the full chord, routing, and suspension behavior
//! can be driven by tests with scripted timestamps.
//!
//! What it tracks:
//! - the physically held key set, mirroring the hardware
//! - presses withheld while a longer chord may still complete
//! - which output each physical press produced, so releases and repeats
//!   follow the same route even after the table is swapped out under it
//! - the active chord mapping, including the compensating releases that
//!   must be undone when its trigger comes back up

use std::collections::HashMap;
use std::time::{Duration, Instant};

use smallvec::SmallVec;

use crate::core::types::{Action, KeyChord, MAX_CHORD_KEYS};
use crate::core::{KeyId, RemapTable};
use crate::engine::hook::{KeyAction, KeyEvent};

/// What the engine loop should do after one event or one timer tick.
#[derive(Debug, Default)]
pub struct Response {
    /// Events to synthesize on the output device, in order.
    pub events: SmallVec<[KeyEvent; 8]>,
    /// Work to hand to the spawner thread.
    pub effects: SmallVec<[SideEffect; 1]>,
}

impl Response {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.effects.is_empty()
    }

    fn press(&mut self, key: KeyId) {
        self.events.push(KeyEvent::press(key));
    }

    fn release(&mut self, key: KeyId) {
        self.events.push(KeyEvent::release(key));
    }

    fn repeat(&mut self, key: KeyId) {
        self.events.push(KeyEvent::repeat(key));
    }

    fn forward(&mut self, event: KeyEvent) {
        self.events.push(event);
    }
}

/// Mapping work the event path hands off instead of performing itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Spawn a program, detached from the engine.
    Launch { program: String, args: Option<String> },
    /// Open a URI with the desktop handler.
    OpenUri { uri: String },
}

/// A press withheld until the chord window closes.
#[derive(Debug, Clone, Copy)]
struct PendingPress {
    key: KeyId,
    deadline: Instant,
}

/// What a physical press put into the session.
#[derive(Debug, Clone)]
enum Routed {
    /// Keys emitted for the press; the release unwinds them in reverse.
    Emitted(KeyChord),
    /// Nothing was emitted; the release and repeats stay swallowed.
    Silent,
}

/// A chord mapping currently held down.
#[derive(Debug)]
struct ActiveChord {
    /// The key whose press completed the chord; its release ends it.
    trigger: KeyId,
    /// Output keys currently down on behalf of the chord.
    output_down: KeyChord,
    /// (physical, emitted) pairs released to compensate at activation,
    /// pressed again on trigger release if still physically held.
    restore: SmallVec<[(KeyId, KeyId); MAX_CHORD_KEYS]>,
    /// (physical, emitted) pairs whose emission doubles as an output key
    /// and therefore stayed down through activation.
    carried: SmallVec<[(KeyId, KeyId); MAX_CHORD_KEYS]>,
}

/// The rewrite state machine. See the module docs for the big picture.
pub struct Interceptor {
    /// Physically held keys, regardless of what was emitted for them.
    held: KeyChord,
    /// Withheld presses in arrival order; the first deadline is earliest.
    pending: SmallVec<[PendingPress; MAX_CHORD_KEYS]>,
    /// Physical key -> what its press emitted.
    routed: HashMap<KeyId, Routed>,
    active: Option<ActiveChord>,
    window: Duration,
}

impl Interceptor {
    pub fn new(window: Duration) -> Self {
        Self {
            held: KeyChord::empty(),
            pending: SmallVec::new(),
            // Sized so steady-state routing never rehashes mid-typing
            routed: HashMap::with_capacity(64),
            active: None,
            window,
        }
    }

    /// Updates the chord window after a document reload.
    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    /// When the earliest withheld press expires, if any. The engine loop
    /// bounds its receive timeout with this.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.first().map(|p| p.deadline)
    }

    /// Classifies one raw event against the given table snapshot.
    ///
    /// `app` is the focused application class (lowercase) for scoped
    /// lookups. `suspended` bypasses table consultation for presses;
    /// releases and repeats always follow the route their press took, so
    /// no key sticks when suspension flips mid-hold. `now` anchors the
    /// chord window.
    pub fn process(
        &mut self,
        event: KeyEvent,
        table: &RemapTable,
        app: Option<&str>,
        suspended: bool,
        now: Instant,
    ) -> Response {
        let mut resp = Response::default();
        match event.action {
            KeyAction::Press => {
                self.held.insert(event.key);
                if suspended {
                    self.flush_verbatim(&mut resp);
                    resp.forward(event);
                } else {
                    self.on_press(event.key, table, app, now, &mut resp);
                }
            }
            KeyAction::Release => {
                self.held.remove(event.key);
                self.on_release(event.key, table, app, suspended, &mut resp);
            }
            KeyAction::Repeat => self.on_repeat(event.key, &mut resp),
        }
        resp
    }

    /// Flushes withheld presses whose window has expired. The loop calls
    /// this whenever its receive times out.
    pub fn poll(
        &mut self,
        table: &RemapTable,
        app: Option<&str>,
        suspended: bool,
        now: Instant,
    ) -> Response {
        let mut resp = Response::default();
        if self.pending.first().is_some_and(|p| p.deadline <= now) {
            // The earliest expiry resolves the whole queue: later entries
            // were only ever withheld as chord companions of the first.
            if suspended {
                self.flush_verbatim(&mut resp);
            } else {
                self.flush_pending(table, app, &mut resp);
            }
        }
        resp
    }

    fn on_press(
        &mut self,
        key: KeyId,
        table: &RemapTable,
        app: Option<&str>,
        now: Instant,
        resp: &mut Response,
    ) {
        // Longest match first: the full held set as an exact chord.
        if self.held.len() >= 2 {
            if let Some(action) = table.lookup(&self.held, app) {
                match action {
                    Action::Key { to } => {
                        let output = KeyChord::single(*to);
                        self.activate_chord(key, &output, resp);
                    }
                    Action::Shortcut { to } => {
                        let output = to.clone();
                        self.activate_chord(key, &output, resp);
                    }
                    Action::Launch { program, args } => {
                        let effect = SideEffect::Launch {
                            program: program.clone(),
                            args: args.clone(),
                        };
                        self.activate_silent(key, Some(effect), resp);
                    }
                    Action::OpenUri { uri } => {
                        let effect = SideEffect::OpenUri { uri: uri.clone() };
                        self.activate_silent(key, Some(effect), resp);
                    }
                    Action::Disabled => self.activate_silent(key, None, resp),
                }
                return;
            }
        }

        if table.is_chord_prefix(&self.held, app) {
            // Modifiers flow through immediately even inside a chord
            // window; withholding them would lag every ordinary shortcut.
            if !key.is_modifier() {
                self.pending.push(PendingPress { key, deadline: now + self.window });
                return;
            }
        } else {
            // The new press can no longer complete a chord together with
            // the withheld keys, so they resolve ahead of it.
            self.flush_pending(table, app, resp);
        }

        match table.lookup(&KeyChord::single(key), app) {
            Some(action) => self.apply_single(key, action, resp),
            None => resp.press(key),
        }
    }

    /// Applies a single-key mapping and records the route its release
    /// must follow. Modifier layering is preserved: a held physical
    /// modifier stays down, so `shift+w` under `w -> t` types `shift+t`.
    fn apply_single(&mut self, key: KeyId, action: &Action, resp: &mut Response) {
        match action {
            Action::Key { to } => {
                resp.press(*to);
                self.routed.insert(key, Routed::Emitted(KeyChord::single(*to)));
            }
            Action::Shortcut { to } => {
                for &out in to.keys() {
                    resp.press(out);
                }
                self.routed.insert(key, Routed::Emitted(to.clone()));
            }
            Action::Launch { program, args } => {
                resp.effects.push(SideEffect::Launch {
                    program: program.clone(),
                    args: args.clone(),
                });
                self.routed.insert(key, Routed::Silent);
            }
            Action::OpenUri { uri } => {
                resp.effects.push(SideEffect::OpenUri { uri: uri.clone() });
                self.routed.insert(key, Routed::Silent);
            }
            Action::Disabled => {
                self.routed.insert(key, Routed::Silent);
            }
        }
    }

    /// Fires a chord mapping completed by `trigger`.
    ///
    /// Withheld companions become silent. Every other held source key
    /// already emitted something (or was forwarded verbatim): emissions
    /// the output shares stay down and are carried, the rest get
    /// compensating releases and are restored when the trigger comes up.
    fn activate_chord(&mut self, trigger: KeyId, output: &KeyChord, resp: &mut Response) {
        for pending in self.pending.drain(..) {
            self.routed.insert(pending.key, Routed::Silent);
        }

        let mut chord = ActiveChord {
            trigger,
            output_down: output.clone(),
            restore: SmallVec::new(),
            carried: SmallVec::new(),
        };

        for &key in self.held.keys() {
            if key == trigger {
                continue;
            }
            match self.routed.get(&key) {
                Some(Routed::Silent) => {}
                Some(Routed::Emitted(emitted)) => {
                    for &out in emitted.keys() {
                        if output.contains(out) {
                            chord.carried.push((key, out));
                        } else {
                            resp.release(out);
                            chord.restore.push((key, out));
                        }
                    }
                }
                None => {
                    if output.contains(key) {
                        chord.carried.push((key, key));
                    } else {
                        resp.release(key);
                        chord.restore.push((key, key));
                    }
                }
            }
        }

        for &out in output.keys() {
            if !chord.carried.iter().any(|&(_, emitted)| emitted == out) {
                resp.press(out);
            }
        }

        self.active = Some(chord);
    }

    /// Fires a chord mapping that emits nothing. Held source keys keep
    /// whatever they already put into the session.
    fn activate_silent(&mut self, trigger: KeyId, effect: Option<SideEffect>, resp: &mut Response) {
        for pending in self.pending.drain(..) {
            self.routed.insert(pending.key, Routed::Silent);
        }
        self.routed.insert(trigger, Routed::Silent);
        if let Some(effect) = effect {
            resp.effects.push(effect);
        }
    }

    fn on_release(
        &mut self,
        key: KeyId,
        table: &RemapTable,
        app: Option<&str>,
        suspended: bool,
        resp: &mut Response,
    ) {
        // A release of a key still withheld delivers its press first, so
        // a quick tap inside the chord window is never lost.
        if self.pending.iter().any(|p| p.key == key) {
            if suspended {
                self.flush_verbatim(resp);
            } else {
                self.flush_pending(table, app, resp);
            }
        }

        if self.active.as_ref().is_some_and(|chord| chord.trigger == key) {
            self.end_chord(resp);
            return;
        }

        if let Some(chord) = self.active.as_mut() {
            if let Some(pos) = chord.restore.iter().position(|&(held, _)| held == key) {
                // Its emission already came up at activation; dropping the
                // pair also cancels the restore press.
                chord.restore.remove(pos);
                self.routed.remove(&key);
                return;
            }
            if let Some(pos) = chord.carried.iter().position(|&(held, _)| held == key) {
                let (_, emitted) = chord.carried.remove(pos);
                chord.output_down.remove(emitted);
                self.routed.remove(&key);
                resp.release(emitted);
                return;
            }
        }

        match self.routed.remove(&key) {
            Some(Routed::Emitted(emitted)) => {
                for &out in emitted.keys().iter().rev() {
                    resp.release(out);
                }
            }
            Some(Routed::Silent) => {}
            None => resp.release(key),
        }
    }

    /// Unwinds the active chord when its trigger releases: output keys
    /// come up newest first, then emissions borrowed from still-held
    /// source keys go back down.
    fn end_chord(&mut self, resp: &mut Response) {
        let Some(chord) = self.active.take() else {
            return;
        };
        for &out in chord.output_down.keys().iter().rev() {
            let keep = chord
                .carried
                .iter()
                .any(|&(held, emitted)| emitted == out && self.held.contains(held));
            if !keep {
                resp.release(out);
            }
        }
        for (held, emitted) in chord.restore {
            if self.held.contains(held) {
                resp.press(emitted);
            }
        }
    }

    fn on_repeat(&mut self, key: KeyId, resp: &mut Response) {
        // Repeats of a withheld press stay withheld with it.
        if self.pending.iter().any(|p| p.key == key) {
            return;
        }
        if let Some(chord) = self.active.as_ref() {
            if chord.trigger == key {
                if let Some(&out) = chord.output_down.keys().last() {
                    resp.repeat(out);
                }
                return;
            }
            if chord.restore.iter().any(|&(held, _)| held == key)
                || chord.carried.iter().any(|&(held, _)| held == key)
            {
                return;
            }
        }
        match self.routed.get(&key) {
            Some(Routed::Emitted(emitted)) => {
                if let Some(&out) = emitted.keys().last() {
                    resp.repeat(out);
                }
            }
            Some(Routed::Silent) => {}
            None => resp.repeat(key),
        }
    }

    /// Delivers all withheld presses in arrival order, each through its
    /// own single-key mapping or verbatim.
    fn flush_pending(&mut self, table: &RemapTable, app: Option<&str>, resp: &mut Response) {
        let pending: SmallVec<[PendingPress; MAX_CHORD_KEYS]> = self.pending.drain(..).collect();
        for entry in pending {
            match table.lookup(&KeyChord::single(entry.key), app) {
                Some(action) => self.apply_single(entry.key, action, resp),
                None => resp.press(entry.key),
            }
        }
    }

    /// Delivers all withheld presses untouched, without recording routes.
    fn flush_verbatim(&mut self, resp: &mut Response) {
        for entry in self.pending.drain(..) {
            resp.press(entry.key);
        }
    }
}
