//! src/engine/hook.rs
//!
//! Exclusive keyboard grabs in, synthesized events out
//!
//! [`EvdevHook`] owns the device boundary of the engine: it grabs the
//! physical keyboards (everything else types into the void), spawns one
//! reader thread per device that forwards raw key events into the engine
//! loop, and creates the uinput output device all rewritten events are
//! emitted through. Everything between those two edges is the
//! interceptor's business.

use std::io;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread;

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Device, EventType, InputEvent, Key};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::KeyId;
use crate::engine::EngineEvent;

/// Name the output device advertises; also used to skip our own device
/// (and any stale sibling) during keyboard detection.
const VIRTUAL_DEVICE_NAME: &str = "keyremapd virtual keyboard";

/// Highest key code the output device advertises (`KEY_MAX`), so any
/// mapping target a document names is emittable without rebuilding it.
const OUTPUT_KEY_CODE_MAX: u16 = 0x2ff;

/// Errors from installing or driving the device hook.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("No keyboard devices found to grab")]
    NoKeyboards,

    #[error("Failed to open device {path}: {source}")]
    OpenDevice { path: PathBuf, source: io::Error },

    #[error("Failed to grab device {path}: {source}")]
    GrabDevice { path: PathBuf, source: io::Error },

    #[error("Failed to create the virtual output device: {0}")]
    OutputDevice(io::Error),

    #[error("Failed to emit events on the output device: {0}")]
    Emit(io::Error),

    #[error("Failed to spawn a device reader thread: {0}")]
    SpawnReader(io::Error),
}

/// What a key did, decoded from the raw event value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Release,
    Press,
    Repeat,
}

impl KeyAction {
    /// Decodes a raw event value; non-key values yield `None`.
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyAction::Release),
            1 => Some(KeyAction::Press),
            2 => Some(KeyAction::Repeat),
            _ => None,
        }
    }

    /// The raw event value this action is written as.
    pub fn value(self) -> i32 {
        match self {
            KeyAction::Release => 0,
            KeyAction::Press => 1,
            KeyAction::Repeat => 2,
        }
    }
}

/// One key event, either read from a grabbed device or synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyId,
    pub action: KeyAction,
}

impl KeyEvent {
    pub fn press(key: KeyId) -> Self {
        Self { key, action: KeyAction::Press }
    }

    pub fn release(key: KeyId) -> Self {
        Self { key, action: KeyAction::Release }
    }

    pub fn repeat(key: KeyId) -> Self {
        Self { key, action: KeyAction::Repeat }
    }
}

/// The installed device hook: grabbed keyboards feeding the engine loop
/// and the uinput device rewritten events leave through.
///
/// Reader threads hold their device grabs until their send side dies with
/// the engine loop; dropping the hook closes the output device.
pub struct EvdevHook {
    output: VirtualDevice,
    devices: Vec<String>,
    _readers: Vec<thread::JoinHandle<()>>,
}

impl EvdevHook {
    /// Grabs keyboards and creates the output device.
    ///
    /// With an empty `devices` list every input device that looks like a
    /// keyboard is grabbed; one that refuses the grab is skipped with a
    /// warning. Explicitly listed devices are strict: any open or grab
    /// failure is fatal.
    ///
    /// # Errors
    ///
    /// Fails when an explicit device cannot be opened or grabbed, when no
    /// keyboard ends up grabbed, or when the uinput device cannot be
    /// created.
    pub fn install(devices: &[PathBuf], events: Sender<EngineEvent>) -> Result<Self, HookError> {
        let candidates = collect_candidates(devices)?;
        if candidates.is_empty() {
            return Err(HookError::NoKeyboards);
        }

        // The output device exists before any grab so a mid-install
        // failure never leaves keys swallowed without an exit path.
        let output = build_output_device().map_err(HookError::OutputDevice)?;

        let strict = !devices.is_empty();
        let mut grabbed = Vec::new();
        let mut readers = Vec::new();

        for (path, mut device) in candidates {
            if let Err(source) = device.grab() {
                if strict {
                    return Err(HookError::GrabDevice { path, source });
                }
                warn!(path = %path.display(), error = %source, "Could not grab device, skipping");
                continue;
            }

            let name = device.name().unwrap_or("unnamed device").to_string();
            info!(device = %name, path = %path.display(), "Grabbed keyboard");

            let tx = events.clone();
            let handle = thread::Builder::new()
                .name(format!("device-reader-{}", readers.len()))
                .spawn(move || read_loop(device, path, &tx))
                .map_err(HookError::SpawnReader)?;
            readers.push(handle);
            grabbed.push(name);
        }

        if grabbed.is_empty() {
            return Err(HookError::NoKeyboards);
        }

        Ok(Self { output, devices: grabbed, _readers: readers })
    }

    /// Names of the grabbed devices, for diagnostics.
    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    /// Writes key events to the output device in order. The kernel report
    /// boundary is appended automatically.
    ///
    /// # Errors
    ///
    /// Fails when the uinput write fails; the hook stays usable.
    pub fn emit(&mut self, events: &[KeyEvent]) -> Result<(), HookError> {
        if events.is_empty() {
            return Ok(());
        }
        let raw: SmallVec<[InputEvent; 8]> = events
            .iter()
            .map(|event| InputEvent::new(EventType::KEY, event.key.code(), event.action.value()))
            .collect();
        self.output.emit(&raw).map_err(HookError::Emit)
    }
}

/// Opens the devices to grab: the explicit list verbatim, or every
/// enumerable device that looks like a keyboard.
fn collect_candidates(devices: &[PathBuf]) -> Result<Vec<(PathBuf, Device)>, HookError> {
    if devices.is_empty() {
        return Ok(evdev::enumerate()
            .filter(|(_, device)| is_keyboard(device))
            .collect());
    }

    let mut explicit = Vec::with_capacity(devices.len());
    for path in devices {
        let device = Device::open(path).map_err(|source| HookError::OpenDevice {
            path: path.clone(),
            source,
        })?;
        explicit.push((path.clone(), device));
    }
    Ok(explicit)
}

/// A device counts as a keyboard when it can type letters. Pointers,
/// consumer-key remotes, and our own virtual device are excluded.
fn is_keyboard(device: &Device) -> bool {
    if device.name().is_some_and(|name| name.contains(VIRTUAL_DEVICE_NAME)) {
        return false;
    }
    let Some(keys) = device.supported_keys() else {
        return false;
    };
    keys.contains(Key::KEY_A) && keys.contains(Key::KEY_Z) && keys.contains(Key::KEY_ENTER)
}

fn build_output_device() -> io::Result<VirtualDevice> {
    let mut keys = AttributeSet::<Key>::new();
    for code in 1..=OUTPUT_KEY_CODE_MAX {
        keys.insert(Key::new(code));
    }
    VirtualDeviceBuilder::new()?
        .name(VIRTUAL_DEVICE_NAME)
        .with_keys(&keys)?
        .build()
}

/// Forwards key events from one grabbed device into the engine loop until
/// the device errors out or the loop goes away, then releases the grab.
fn read_loop(mut device: Device, path: PathBuf, events: &Sender<EngineEvent>) {
    'outer: loop {
        let batch = match device.fetch_events() {
            Ok(batch) => batch,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Device read failed, releasing grab");
                break;
            }
        };
        for event in batch {
            if event.event_type() != EventType::KEY {
                continue;
            }
            let Some(action) = KeyAction::from_value(event.value()) else {
                continue;
            };
            let key = KeyEvent { key: KeyId::new(event.code()), action };
            if events.send(EngineEvent::Key(key)).is_err() {
                break 'outer;
            }
        }
    }
    let _ = device.ungrab();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_value() {
        assert_eq!(KeyAction::from_value(0), Some(KeyAction::Release));
        assert_eq!(KeyAction::from_value(1), Some(KeyAction::Press));
        assert_eq!(KeyAction::from_value(2), Some(KeyAction::Repeat));
        assert_eq!(KeyAction::from_value(3), None);
        assert_eq!(KeyAction::from_value(-1), None);
    }

    #[test]
    fn test_action_value_round_trips() {
        for action in [KeyAction::Release, KeyAction::Press, KeyAction::Repeat] {
            assert_eq!(KeyAction::from_value(action.value()), Some(action));
        }
    }

    #[test]
    fn test_event_constructors() {
        let key = KeyId::new(30);
        assert_eq!(KeyEvent::press(key).action, KeyAction::Press);
        assert_eq!(KeyEvent::release(key).action, KeyAction::Release);
        assert_eq!(KeyEvent::repeat(key).action, KeyAction::Repeat);
        assert_eq!(KeyEvent::press(key).key, key);
    }
}
