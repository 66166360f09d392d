use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::shortcut::{MouseButton, Shortcut};
use crate::controller::{names, ControllerButton, Stick};
use crate::persistence::{KeyValueStore, PersistenceHandle};

pub const BINDINGS_KEY: &str = "bindings.json";
pub const BINDINGS_VERSION: u32 = 1;

pub type SharedBindings = Arc<RwLock<BindingStore>>;

#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("Unsupported bindings version {0}")]
    UnsupportedVersion(u32),

    #[error("Malformed bindings: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct BindingDocument {
    version: u32,
    bindings: Vec<BindingEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BindingEntry {
    button: ControllerButton,
    shortcut: Option<Shortcut>,
}

/// Map from controller inputs to their optional shortcut.
///
/// Every known input has an entry; `None` means the input was seen or added
/// but is not bound yet. Stick-direction pseudo-buttons are always present as
/// a full cluster of four.
#[derive(Debug, Default)]
pub struct BindingStore {
    table: BTreeMap<ControllerButton, Option<Shortcut>>,
    persistence: Option<PersistenceHandle>,
}

impl BindingStore {
    pub fn new(persistence: Option<PersistenceHandle>) -> Self {
        Self {
            table: BTreeMap::new(),
            persistence,
        }
    }

    pub fn with_defaults(persistence: Option<PersistenceHandle>) -> Self {
        let mut store = Self::new(persistence);
        store.table = Self::default_table();
        store
    }

    fn default_table() -> BTreeMap<ControllerButton, Option<Shortcut>> {
        BTreeMap::from([
            (
                ControllerButton::new(names::BUTTON_A),
                Some(Shortcut::mouse(MouseButton::Left)),
            ),
            (
                ControllerButton::new(names::BUTTON_B),
                Some(Shortcut::mouse(MouseButton::Right)),
            ),
        ])
    }

    /// Load the persisted table. Defaults apply only when nothing is stored
    /// or the stored table cannot be decoded.
    pub async fn load(store: &dyn KeyValueStore, persistence: Option<PersistenceHandle>) -> Self {
        let bytes = match store.load(BINDINGS_KEY).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!("No saved bindings, using defaults");
                return Self::with_defaults(persistence);
            }
            Err(e) => {
                warn!("Failed to read bindings, using defaults: {}", e);
                return Self::with_defaults(persistence);
            }
        };

        match Self::decode(&bytes) {
            Ok(table) => {
                info!("Loaded {} bindings", table.len());
                let mut loaded = Self::new(persistence);
                loaded.table = table;
                loaded.repair_clusters();
                loaded
            }
            Err(e) => {
                warn!("{}, using defaults", e);
                Self::with_defaults(persistence)
            }
        }
    }

    fn decode(bytes: &[u8]) -> Result<BTreeMap<ControllerButton, Option<Shortcut>>, BindingError> {
        let doc: BindingDocument = serde_json::from_slice(bytes)?;
        if doc.version != BINDINGS_VERSION {
            return Err(BindingError::UnsupportedVersion(doc.version));
        }
        Ok(doc
            .bindings
            .into_iter()
            .map(|entry| (entry.button, entry.shortcut))
            .collect())
    }

    pub fn encode(&self) -> Result<Vec<u8>, BindingError> {
        let doc = BindingDocument {
            version: BINDINGS_VERSION,
            bindings: self
                .table
                .iter()
                .map(|(button, shortcut)| BindingEntry {
                    button: button.clone(),
                    shortcut: shortcut.clone(),
                })
                .collect(),
        };
        Ok(serde_json::to_vec_pretty(&doc)?)
    }

    // A hand-edited file may carry a partial cluster
    fn repair_clusters(&mut self) {
        for stick in Stick::ALL {
            let present = ControllerButton::stick_cluster(stick)
                .iter()
                .any(|b| self.table.contains_key(b));
            if present {
                self.insert_cluster(stick);
            }
        }
    }

    pub fn get(&self, button: &ControllerButton) -> Option<&Shortcut> {
        self.table.get(button).and_then(Option::as_ref)
    }

    pub fn contains(&self, button: &ControllerButton) -> bool {
        self.table.contains_key(button)
    }

    /// Bind `button`, replacing any previous shortcut. Binding a direction
    /// pseudo-button brings in the rest of its cluster.
    pub fn set(&mut self, button: ControllerButton, shortcut: Option<Shortcut>) {
        if let Some((stick, _)) = button.stick_direction_parts() {
            self.insert_cluster(stick);
        }
        debug!(
            "Binding {} -> {}",
            button,
            shortcut
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "none".to_string())
        );
        self.table.insert(button, shortcut);
        self.persist();
    }

    /// Remove `button`. A direction pseudo-button takes its whole cluster
    /// with it. Returns whether anything was removed.
    pub fn remove(&mut self, button: &ControllerButton) -> bool {
        if let Some((stick, _)) = button.stick_direction_parts() {
            return self.remove_stick_cluster(stick) > 0;
        }
        let removed = self.table.remove(button).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    /// Add an unbound entry for `button` if it is unknown. Returns `true`
    /// when a new entry was created.
    pub fn ensure(&mut self, button: &ControllerButton) -> bool {
        if self.table.contains_key(button) {
            return false;
        }
        if let Some((stick, _)) = button.stick_direction_parts() {
            self.insert_cluster(stick);
        } else {
            self.table.insert(button.clone(), None);
        }
        self.persist();
        true
    }

    /// Make all four direction pseudo-buttons of `stick` bindable.
    pub fn ensure_stick_cluster(&mut self, stick: Stick) -> bool {
        let added = self.insert_cluster(stick);
        if added {
            self.persist();
        }
        added
    }

    fn insert_cluster(&mut self, stick: Stick) -> bool {
        let mut added = false;
        for button in ControllerButton::stick_cluster(stick) {
            if !self.table.contains_key(&button) {
                self.table.insert(button, None);
                added = true;
            }
        }
        added
    }

    /// Whether any direction of `stick` is bound to a shortcut.
    pub fn has_stick_binding(&self, stick: Stick) -> bool {
        ControllerButton::stick_cluster(stick)
            .iter()
            .any(|button| self.get(button).is_some())
    }

    /// Remove the four direction pseudo-buttons of `stick`. Returns how many
    /// entries were removed.
    pub fn remove_stick_cluster(&mut self, stick: Stick) -> usize {
        let removed = ControllerButton::stick_cluster(stick)
            .iter()
            .filter(|button| self.table.remove(*button).is_some())
            .count();
        if removed > 0 {
            self.persist();
        }
        removed
    }

    /// Drop every entry, bound or not. Defaults are not restored.
    pub fn reset(&mut self) {
        self.table.clear();
        info!("Bindings cleared");
        self.persist();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ControllerButton, Option<&Shortcut>)> {
        self.table.iter().map(|(button, shortcut)| (button, shortcut.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn into_shared(self) -> SharedBindings {
        Arc::new(RwLock::new(self))
    }

    fn persist(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        match self.encode() {
            Ok(bytes) => persistence.save(BINDINGS_KEY, bytes),
            Err(e) => warn!("Failed to encode bindings: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::shortcut::{keycodes, system_keys, Modifier, ModifierSet};
    use crate::controller::Direction;
    use crate::persistence::{persistence_worker::PersistAction, MemoryStore};

    fn button(name: &str) -> ControllerButton {
        ControllerButton::new(name)
    }

    #[test]
    fn defaults_bind_face_buttons_to_clicks() {
        let store = BindingStore::with_defaults(None);
        assert_eq!(
            store.get(&button("ButtonA")),
            Some(&Shortcut::mouse(MouseButton::Left))
        );
        assert_eq!(
            store.get(&button("ButtonB")),
            Some(&Shortcut::mouse(MouseButton::Right))
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn setting_a_direction_creates_its_cluster() {
        let mut store = BindingStore::new(None);
        let up = ControllerButton::stick_direction(Stick::Left, Direction::Up);
        store.set(up.clone(), Some(Shortcut::keyboard(keycodes::A, ModifierSet::EMPTY)));

        assert_eq!(store.len(), 4);
        assert!(store.has_stick_binding(Stick::Left));
        assert!(!store.has_stick_binding(Stick::Right));
        assert!(store.contains(&ControllerButton::stick_direction(
            Stick::Left,
            Direction::Right
        )));
    }

    #[test]
    fn unbound_cluster_does_not_count_as_binding() {
        let mut store = BindingStore::new(None);
        assert!(store.ensure_stick_cluster(Stick::Right));
        assert!(!store.ensure_stick_cluster(Stick::Right));
        assert!(!store.has_stick_binding(Stick::Right));
    }

    #[test]
    fn removing_cluster_leaves_other_entries() {
        let mut store = BindingStore::with_defaults(None);
        store.ensure_stick_cluster(Stick::Left);
        store.ensure_stick_cluster(Stick::Right);

        assert_eq!(store.remove_stick_cluster(Stick::Left), 4);
        assert_eq!(store.len(), 2 + 4);
        assert!(store
            .iter()
            .all(|(b, _)| !b.as_str().starts_with("JoystickLeft")));
        assert_eq!(store.remove_stick_cluster(Stick::Left), 0);
    }

    #[test]
    fn removing_one_direction_removes_all_four() {
        let mut store = BindingStore::new(None);
        store.ensure_stick_cluster(Stick::Left);
        assert!(store.remove(&ControllerButton::stick_direction(Stick::Left, Direction::Down)));
        assert!(store.is_empty());
    }

    #[test]
    fn ensure_reports_new_entries_only() {
        let mut store = BindingStore::with_defaults(None);
        assert!(!store.ensure(&button("ButtonA")));
        assert!(store.ensure(&button("L1")));
        assert_eq!(store.get(&button("L1")), None);
        assert!(store.contains(&button("L1")));
    }

    #[test]
    fn wire_format_keeps_unbound_entries() {
        let mut store = BindingStore::with_defaults(None);
        store.set(
            button("R1"),
            Some(Shortcut::system_key(system_keys::PLAY, ModifierSet::EMPTY)),
        );
        store.ensure(&button("ButtonX"));

        let json: serde_json::Value = serde_json::from_slice(&store.encode().unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        let entries = json["bindings"].as_array().unwrap();
        let x = entries.iter().find(|e| e["button"] == "ButtonX").unwrap();
        assert!(x["shortcut"].is_null());
        let r1 = entries.iter().find(|e| e["button"] == "R1").unwrap();
        assert_eq!(r1["shortcut"]["type"], "system_key");
        assert_eq!(r1["shortcut"]["code"], 16);
    }

    #[tokio::test]
    async fn load_accepts_documented_format() {
        let json = r#"{"version":1,"bindings":[
            {"button":"ButtonA","shortcut":{"type":"mouse","button":"left"}},
            {"button":"L1","shortcut":{"type":"keyboard","key_code":0,"modifiers":["command","shift"]}},
            {"button":"ButtonX","shortcut":null}]}"#;
        let kv = MemoryStore::with_entry(BINDINGS_KEY, json);
        let store = BindingStore::load(&kv, None).await;

        assert_eq!(store.len(), 3);
        assert_eq!(store.get(&button("ButtonB")), None);
        assert_eq!(
            store.get(&button("L1")),
            Some(&Shortcut::keyboard(
                keycodes::A,
                ModifierSet::EMPTY
                    .with(Modifier::Command)
                    .with(Modifier::Shift)
            ))
        );
    }

    #[tokio::test]
    async fn empty_saved_table_is_not_replaced_by_defaults() {
        let kv = MemoryStore::with_entry(BINDINGS_KEY, r#"{"version":1,"bindings":[]}"#);
        assert!(BindingStore::load(&kv, None).await.is_empty());
    }

    #[tokio::test]
    async fn unreadable_table_falls_back_to_defaults() {
        for bad in [r#"{"version":9,"bindings":[]}"#, "not json"] {
            let kv = MemoryStore::with_entry(BINDINGS_KEY, bad);
            assert_eq!(BindingStore::load(&kv, None).await.len(), 2);
        }
    }

    #[tokio::test]
    async fn partial_cluster_is_completed_on_load() {
        let json = r#"{"version":1,"bindings":[
            {"button":"JoystickRightUp","shortcut":{"type":"mouse","button":"middle"}}]}"#;
        let kv = MemoryStore::with_entry(BINDINGS_KEY, json);
        let store = BindingStore::load(&kv, None).await;
        assert_eq!(store.len(), 4);
        assert!(store.has_stick_binding(Stick::Right));
    }

    #[test]
    fn every_mutation_persists() {
        let (persistence, mut rx) = PersistenceHandle::detached();
        let mut store = BindingStore::with_defaults(Some(persistence));

        store.set(button("L1"), None);
        store.remove(&button("L1"));
        store.ensure(&button("R1"));
        store.reset();

        let mut saves = 0;
        while let Ok(action) = rx.try_recv() {
            assert!(matches!(action, PersistAction::Save { ref key, .. } if key == BINDINGS_KEY));
            saves += 1;
        }
        assert_eq!(saves, 4);

        // No-ops do not write
        store.remove(&button("nothing"));
        store.ensure(&button("L1"));
        assert!(rx.try_recv().is_ok());
        store.ensure(&button("L1"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reset_clears_everything() {
        let (persistence, mut rx) = PersistenceHandle::detached();
        let mut store = BindingStore::with_defaults(Some(persistence));
        store.ensure(&button("L1"));
        store.ensure_stick_cluster(Stick::Left);
        while rx.try_recv().is_ok() {}

        store.reset();

        assert!(store.is_empty());
        assert_eq!(store.get(&button("ButtonA")), None);
        let Ok(PersistAction::Save { bytes, .. }) = rx.try_recv() else {
            panic!("reset did not queue a save");
        };
        assert!(BindingStore::decode(&bytes).unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }
}
