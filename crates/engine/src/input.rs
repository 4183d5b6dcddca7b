use couchtv_core::{Action, BrightnessDirection, EventBus, InputConfig, KeyLayout, TvError, TvEvent};
use std::collections::HashMap;
use tracing::{debug, warn};

const SEEK_STEP_SECS: i32 = 15;

// AZERTY digit row without shift.
const REMOTE_CHANNEL_KEYS: [&str; 9] = ["&", "é", "\"", "'", "(", "-", "è", "_", "ç"];
const REMOTE_KEYS: [(&str, Action); 7] = [
    ("à", Action::AlarmToggle),
    ("AudioVolumeMute", Action::PowerOff),
    ("MediaPlayPause", Action::PlayPause),
    ("MediaTrackNext", Action::Next),
    ("MediaTrackPrevious", Action::Previous),
    ("AudioVolumeUp", Action::VolumeUp),
    ("AudioVolumeDown", Action::VolumeDown),
];

const DESKTOP_CHANNEL_KEYS: [&str; 9] = ["1", "2", "3", "4", "5", "6", "7", "8", "9"];
const DESKTOP_KEYS: [(&str, Action); 7] = [
    ("0", Action::AlarmToggle),
    ("p", Action::PowerOff),
    (" ", Action::PlayPause),
    ("*", Action::Next),
    ("/", Action::Previous),
    ("z", Action::VolumeUp),
    ("a", Action::VolumeDown),
];

/// Key identity -> action table. One key maps to exactly one action.
#[derive(Debug, Clone)]
pub struct KeyMap {
    bindings: HashMap<String, Action>,
}

impl KeyMap {
    pub fn for_layout(layout: KeyLayout) -> Self {
        let (channel_keys, named) = match layout {
            KeyLayout::Remote => (&REMOTE_CHANNEL_KEYS[..], &REMOTE_KEYS[..]),
            KeyLayout::Desktop => (&DESKTOP_CHANNEL_KEYS[..], &DESKTOP_KEYS[..]),
        };

        let shared = [
            ("PageUp", Action::Brightness(BrightnessDirection::Up)),
            ("PageDown", Action::Brightness(BrightnessDirection::Down)),
            ("ArrowRight", Action::Seek(SEEK_STEP_SECS)),
            ("ArrowLeft", Action::Seek(-SEEK_STEP_SECS)),
            ("ArrowUp", Action::AlarmTimeUp),
            ("ArrowDown", Action::AlarmTimeDown),
        ];

        let mut bindings = HashMap::new();
        for (i, key) in channel_keys.iter().enumerate() {
            bindings.insert(key.to_string(), Action::SelectChannel(i));
        }
        for (key, action) in named.iter().chain(shared.iter()) {
            bindings.insert(key.to_string(), *action);
        }
        Self { bindings }
    }

    /// Layout table with the configured overrides applied. Overrides that do
    /// not parse are skipped with a warning.
    pub fn from_config(cfg: &InputConfig) -> Self {
        let mut map = Self::for_layout(cfg.layout);
        for (key, name) in &cfg.overrides {
            match parse_action(name) {
                Ok(action) => map.bind(key.clone(), action),
                Err(err) => warn!(%key, error = %err, "ignoring key override"),
            }
        }
        map
    }

    /// Rebinding an action drops its previous key, so each action keeps a
    /// single key.
    pub fn bind(&mut self, key: String, action: Action) {
        self.bindings.retain(|_, a| *a != action);
        self.bindings.insert(key, action);
    }

    pub fn lookup(&self, key: &str) -> Option<Action> {
        self.bindings.get(key).copied()
    }

    pub fn key_for(&self, action: Action) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, a)| **a == action)
            .map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Parses `channel:<n>`, `seek:<±secs>` and the plain action names
/// (`alarm-toggle`, `power-off`, `volume-up`, ...).
pub fn parse_action(name: &str) -> Result<Action, TvError> {
    let bad = || TvError::Config(format!("unknown action {name:?}"));
    let name = name.trim();
    if let Some(n) = name.strip_prefix("channel:") {
        let n: usize = n.parse().map_err(|_| bad())?;
        return Ok(Action::SelectChannel(n));
    }
    if let Some(s) = name.strip_prefix("seek:") {
        let s: i32 = s.parse().map_err(|_| bad())?;
        return Ok(Action::Seek(s));
    }
    Ok(match name {
        "alarm-toggle" => Action::AlarmToggle,
        "power-off" => Action::PowerOff,
        "volume-up" => Action::VolumeUp,
        "volume-down" => Action::VolumeDown,
        "play-pause" => Action::PlayPause,
        "next" => Action::Next,
        "previous" => Action::Previous,
        "brightness-up" => Action::Brightness(BrightnessDirection::Up),
        "brightness-down" => Action::Brightness(BrightnessDirection::Down),
        "alarm-time-up" => Action::AlarmTimeUp,
        "alarm-time-down" => Action::AlarmTimeDown,
        _ => return Err(bad()),
    })
}

pub struct InputDispatcher {
    keymap: KeyMap,
    bus: EventBus<TvEvent>,
}

impl InputDispatcher {
    pub fn new(keymap: KeyMap, bus: EventBus<TvEvent>) -> Self {
        Self { keymap, bus }
    }

    pub fn replace_keymap(&mut self, keymap: KeyMap) {
        self.keymap = keymap;
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    pub fn dispatch(&self, key: &str) -> Option<Action> {
        let action = self.keymap.lookup(key);

        self.bus.publish(TvEvent::UserInteraction);
        if action != Some(Action::PowerOff) {
            self.bus.publish(TvEvent::NonPowerOffInteraction);
        }

        match action {
            Some(action) => {
                debug!(key, ?action, "key dispatched");
                self.bus.publish(TvEvent::Action(action));
            }
            None => debug!(key, "unmapped key"),
        }
        action
    }
}
