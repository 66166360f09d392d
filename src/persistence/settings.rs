use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use super::{KeyValueStore, PersistenceHandle};
use crate::controller::Stick;
use crate::mapping::{AxisMapping, Inversion, DEFAULT_ACTIVATION_THRESHOLD};

pub const SETTINGS_KEY: &str = "settings.toml";

const MIN_TICK_RATE_HZ: u32 = 30;
const MAX_TICK_RATE_HZ: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerMode {
    /// Stick deflection is a velocity.
    #[default]
    Relative,
    /// Stick deflection is a position around an anchor.
    Teleport,
}

/// Which stick drives the pointer and which one scrolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StickRoles {
    pub pointer: Stick,
    pub scroll: Stick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub enabled: bool,
    pub speed: f64,
    pub acceleration: f64,
    pub deadzone: f64,
    pub scroll_speed: f64,
    pub horizontal_scroll: bool,
    pub pointer_stick: Stick,
    pub direction_threshold: f64,
    pub tick_rate_hz: u32,
    pub pointer_mode: PointerMode,
    pub teleport_radius: f64,
    pub pointer_inversion: Inversion,
    pub scroll_inversion: Inversion,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            speed: 18.0,
            acceleration: 1.0,
            deadzone: 0.15,
            scroll_speed: 6.0,
            horizontal_scroll: false,
            pointer_stick: Stick::Left,
            direction_threshold: DEFAULT_ACTIVATION_THRESHOLD,
            tick_rate_hz: 120,
            pointer_mode: PointerMode::Relative,
            teleport_radius: 200.0,
            pointer_inversion: Inversion::default(),
            scroll_inversion: Inversion::default(),
        }
    }
}

impl Settings {
    pub fn stick_roles(&self) -> StickRoles {
        StickRoles {
            pointer: self.pointer_stick,
            scroll: self.pointer_stick.other(),
        }
    }

    pub fn pointer_mapping(&self) -> AxisMapping {
        AxisMapping::new(self.deadzone, self.speed, self.acceleration)
    }

    pub fn scroll_mapping(&self) -> AxisMapping {
        AxisMapping::new(self.deadzone, self.scroll_speed, self.acceleration)
    }

    /// Bring out-of-range values back into their valid domain.
    pub fn sanitize(mut self) -> Self {
        let finite_or = |v: f64, fallback: f64| if v.is_finite() { v } else { fallback };
        let defaults = Settings::default();

        self.deadzone = finite_or(self.deadzone, defaults.deadzone).clamp(0.0, 1.0);
        self.direction_threshold =
            finite_or(self.direction_threshold, defaults.direction_threshold).clamp(0.0, 1.0);
        self.speed = finite_or(self.speed, defaults.speed).max(0.0);
        self.acceleration = finite_or(self.acceleration, defaults.acceleration).max(0.0);
        self.scroll_speed = finite_or(self.scroll_speed, defaults.scroll_speed).max(0.0);
        self.teleport_radius = finite_or(self.teleport_radius, defaults.teleport_radius).max(0.0);
        self.tick_rate_hz = self.tick_rate_hz.clamp(MIN_TICK_RATE_HZ, MAX_TICK_RATE_HZ);
        self
    }

    /// Load persisted settings; absent or unreadable data yields defaults.
    pub async fn load(store: &dyn KeyValueStore) -> Settings {
        let bytes = match store.load(SETTINGS_KEY).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!("No saved settings, using defaults");
                return Settings::default();
            }
            Err(e) => {
                warn!("Failed to read settings: {}", e);
                return Settings::default();
            }
        };

        let parsed = std::str::from_utf8(&bytes)
            .map_err(|e| e.to_string())
            .and_then(|text| toml::from_str::<Settings>(text).map_err(|e| e.to_string()));
        match parsed {
            Ok(settings) => settings.sanitize(),
            Err(e) => {
                warn!("Malformed settings, using defaults: {}", e);
                Settings::default()
            }
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, toml::ser::Error> {
        toml::to_string_pretty(self).map(String::into_bytes)
    }
}

/// Owner of the live settings. Every update is broadcast to subscribers and
/// persisted.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    tx: std::sync::Arc<watch::Sender<Settings>>,
    persistence: Option<PersistenceHandle>,
}

impl SettingsHandle {
    pub fn new(initial: Settings, persistence: Option<PersistenceHandle>) -> Self {
        let (tx, _) = watch::channel(initial.sanitize());
        Self {
            tx: std::sync::Arc::new(tx),
            persistence,
        }
    }

    pub fn current(&self) -> Settings {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        let mut next = self.current();
        f(&mut next);
        let next = next.sanitize();
        if next == *self.tx.borrow() {
            return;
        }

        self.persist(&next);
        self.tx.send_replace(next);
    }

    fn persist(&self, settings: &Settings) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        match settings.encode() {
            Ok(bytes) => persistence.save(SETTINGS_KEY, bytes),
            Err(e) => warn!("Failed to encode settings: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{persistence_worker::PersistAction, MemoryStore};

    #[tokio::test]
    async fn missing_or_malformed_settings_fall_back_to_defaults() {
        let empty = MemoryStore::new();
        assert_eq!(Settings::load(&empty).await, Settings::default());

        let garbage = MemoryStore::with_entry(SETTINGS_KEY, "speed = [not toml");
        assert_eq!(Settings::load(&garbage).await, Settings::default());
    }

    #[tokio::test]
    async fn partial_file_keeps_other_defaults() {
        let store = MemoryStore::with_entry(
            SETTINGS_KEY,
            "speed = 30.0\npointer_stick = \"right\"\ndeadzone = 4.0\n",
        );
        let settings = Settings::load(&store).await;
        assert_eq!(settings.speed, 30.0);
        assert_eq!(settings.deadzone, 1.0);
        assert_eq!(settings.stick_roles().scroll, Stick::Left);
        assert_eq!(settings.tick_rate_hz, 120);
    }

    #[test]
    fn encoded_settings_parse_back() {
        let mut settings = Settings::default();
        settings.pointer_mode = PointerMode::Teleport;
        settings.scroll_inversion.y = true;
        let text = String::from_utf8(settings.encode().unwrap()).unwrap();
        assert!(text.contains("pointer_mode = \"teleport\""));
        assert_eq!(toml::from_str::<Settings>(&text).unwrap(), settings);
    }

    #[test]
    fn tick_rate_is_bounded() {
        let settings = Settings {
            tick_rate_hz: 5,
            ..Settings::default()
        };
        assert_eq!(settings.sanitize().tick_rate_hz, MIN_TICK_RATE_HZ);
    }

    #[tokio::test]
    async fn update_notifies_and_persists_changes_only() {
        let (persistence, mut rx) = PersistenceHandle::detached();
        let handle = SettingsHandle::new(Settings::default(), Some(persistence));
        let mut watcher = handle.subscribe();

        handle.update(|s| s.enabled = false);
        assert!(watcher.has_changed().unwrap());
        assert!(!watcher.borrow_and_update().enabled);
        assert!(matches!(
            rx.try_recv(),
            Ok(PersistAction::Save { ref key, .. }) if key == SETTINGS_KEY
        ));

        handle.update(|s| s.enabled = false);
        assert!(!watcher.has_changed().unwrap());
        assert!(rx.try_recv().is_err());
    }
}
