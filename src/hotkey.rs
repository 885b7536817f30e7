//! Global hotkeys for stopping a run
//!
//! Key presses are turned into [`ControlSignal`]s; the run loop never sees
//! the hotkey machinery itself.

use anyhow::{anyhow, Result};
use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use tracing::{info, warn};

use crate::config::HotkeyConfig;
use crate::shared::ControlSignal;

/// Parses a hotkey string like "F9", "Ctrl+Shift+O", "Alt+F1" into a HotKey
pub fn parse_hotkey(hotkey_str: &str) -> Result<HotKey> {
    let parts: Vec<&str> = hotkey_str.split('+').map(|s| s.trim()).collect();

    let mut modifiers = Modifiers::empty();
    let mut key_code: Option<Code> = None;

    for part in parts {
        let upper = part.to_uppercase();
        match upper.as_str() {
            "CTRL" | "CONTROL" => modifiers |= Modifiers::CONTROL,
            "SHIFT" => modifiers |= Modifiers::SHIFT,
            "ALT" => modifiers |= Modifiers::ALT,
            "WIN" | "SUPER" | "META" => modifiers |= Modifiers::SUPER,
            _ => {
                // This should be the key code
                key_code = Some(parse_key_code(&upper)?);
            }
        }
    }

    let code = key_code.ok_or_else(|| anyhow!("No key code found in hotkey string"))?;
    Ok(HotKey::new(Some(modifiers), code))
}

/// Parse a key code string into a Code enum
fn parse_key_code(key: &str) -> Result<Code> {
    let code = match key {
        // Function keys
        "F1" => Code::F1,
        "F2" => Code::F2,
        "F3" => Code::F3,
        "F4" => Code::F4,
        "F5" => Code::F5,
        "F6" => Code::F6,
        "F7" => Code::F7,
        "F8" => Code::F8,
        "F9" => Code::F9,
        "F10" => Code::F10,
        "F11" => Code::F11,
        "F12" => Code::F12,

        // Letters
        "A" => Code::KeyA,
        "B" => Code::KeyB,
        "C" => Code::KeyC,
        "D" => Code::KeyD,
        "E" => Code::KeyE,
        "F" => Code::KeyF,
        "G" => Code::KeyG,
        "H" => Code::KeyH,
        "I" => Code::KeyI,
        "J" => Code::KeyJ,
        "K" => Code::KeyK,
        "L" => Code::KeyL,
        "M" => Code::KeyM,
        "N" => Code::KeyN,
        "O" => Code::KeyO,
        "P" => Code::KeyP,
        "Q" => Code::KeyQ,
        "R" => Code::KeyR,
        "S" => Code::KeyS,
        "T" => Code::KeyT,
        "U" => Code::KeyU,
        "V" => Code::KeyV,
        "W" => Code::KeyW,
        "X" => Code::KeyX,
        "Y" => Code::KeyY,
        "Z" => Code::KeyZ,

        // Numbers
        "0" => Code::Digit0,
        "1" => Code::Digit1,
        "2" => Code::Digit2,
        "3" => Code::Digit3,
        "4" => Code::Digit4,
        "5" => Code::Digit5,
        "6" => Code::Digit6,
        "7" => Code::Digit7,
        "8" => Code::Digit8,
        "9" => Code::Digit9,

        // Special keys
        "SPACE" => Code::Space,
        "ENTER" | "RETURN" => Code::Enter,
        "TAB" => Code::Tab,
        "ESCAPE" | "ESC" => Code::Escape,
        "BACKSPACE" => Code::Backspace,
        "DELETE" | "DEL" => Code::Delete,
        "INSERT" | "INS" => Code::Insert,
        "HOME" => Code::Home,
        "END" => Code::End,
        "PAGEUP" | "PGUP" => Code::PageUp,
        "PAGEDOWN" | "PGDN" => Code::PageDown,
        "UP" => Code::ArrowUp,
        "DOWN" => Code::ArrowDown,
        "LEFT" => Code::ArrowLeft,
        "RIGHT" => Code::ArrowRight,

        // Numpad
        "NUMPAD0" | "NUM0" => Code::Numpad0,
        "NUMPAD1" | "NUM1" => Code::Numpad1,
        "NUMPAD2" | "NUM2" => Code::Numpad2,
        "NUMPAD3" | "NUM3" => Code::Numpad3,
        "NUMPAD4" | "NUM4" => Code::Numpad4,
        "NUMPAD5" | "NUM5" => Code::Numpad5,
        "NUMPAD6" | "NUM6" => Code::Numpad6,
        "NUMPAD7" | "NUM7" => Code::Numpad7,
        "NUMPAD8" | "NUM8" => Code::Numpad8,
        "NUMPAD9" | "NUM9" => Code::Numpad9,

        _ => return Err(anyhow!("Unknown key code: {}", key)),
    };

    Ok(code)
}

/// Parsed stop bindings
#[derive(Debug, Clone, Copy)]
pub struct HotkeyBindings {
    pub stop: HotKey,
    pub force_stop: HotKey,
}

impl HotkeyBindings {
    pub fn from_config(config: &HotkeyConfig) -> Result<Self> {
        let stop = parse_hotkey(&config.stop)?;
        let force_stop = parse_hotkey(&config.force_stop)?;
        if stop.id() == force_stop.id() {
            return Err(anyhow!("Stop and force-stop hotkeys are both '{}'", config.stop));
        }
        Ok(Self { stop, force_stop })
    }

    /// Control signal for a pressed hotkey id, if it is one of ours
    pub fn signal_for(&self, id: u32) -> Option<ControlSignal> {
        if id == self.stop.id() {
            Some(ControlSignal::Stop)
        } else if id == self.force_stop.id() {
            Some(ControlSignal::ForceStop)
        } else {
            None
        }
    }
}

/// Global stop / force-stop hotkeys
pub struct StopHotkeys {
    manager: GlobalHotKeyManager,
    bindings: HotkeyBindings,
}

impl StopHotkeys {
    /// Register both hotkeys with the OS
    pub fn register(config: &HotkeyConfig) -> Result<Self> {
        let bindings = HotkeyBindings::from_config(config)?;
        let manager = GlobalHotKeyManager::new()
            .map_err(|e| anyhow!("Failed to create hotkey manager: {:?}", e))?;

        manager
            .register(bindings.stop)
            .map_err(|e| anyhow!("Failed to register hotkey '{}': {:?}", config.stop, e))?;
        if let Err(e) = manager.register(bindings.force_stop) {
            let _ = manager.unregister(bindings.stop);
            return Err(anyhow!("Failed to register hotkey '{}': {:?}", config.force_stop, e));
        }
        info!("Registered hotkeys: stop {}, force stop {}", config.stop, config.force_stop);

        Ok(Self { manager, bindings })
    }

    /// Next control signal from a pressed hotkey, if any
    pub fn poll(&self) -> Option<ControlSignal> {
        while let Ok(event) = GlobalHotKeyEvent::receiver().try_recv() {
            if event.state != HotKeyState::Pressed {
                continue;
            }
            if let Some(signal) = self.bindings.signal_for(event.id) {
                info!("Hotkey pressed: {:?}", signal);
                return Some(signal);
            }
        }
        None
    }
}

impl Drop for StopHotkeys {
    fn drop(&mut self) {
        for hotkey in [self.bindings.stop, self.bindings.force_stop] {
            if let Err(e) = self.manager.unregister(hotkey) {
                warn!("Failed to unregister hotkey: {:?}", e);
            }
        }
    }
}
