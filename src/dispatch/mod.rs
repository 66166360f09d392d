//! # Action Dispatcher
//!
//! Executes bound shortcuts against an [`OutputSink`] with correct down/up
//! pairing and modifier ordering, and performs pointer and scroll output for
//! the tick loop.
//!
//! Every press is matched by exactly one release. Sink failures are logged,
//! counted and skipped; nothing here returns an error to the caller.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::bindings::{KeyCode, Modifier, ModifierSet, MouseButton, Shortcut, SystemKeyCode};
use crate::controller::ControllerButton;
use crate::host::{KeyStroke, OutputSink, Point, PointerEvent, SinkError};

pub type SharedDispatcher = Arc<Mutex<ActionDispatcher>>;

/// Key transitions for pressing a keyboard chord: modifiers go down in
/// canonical order, then the primary key with the full mask.
///
/// A modifier that is the primary key itself is not pressed separately.
pub fn keyboard_press_sequence(key: KeyCode, modifiers: ModifierSet) -> Vec<KeyStroke> {
    let own = Modifier::from_key_code(key);
    let mut flags = ModifierSet::EMPTY;
    let mut strokes = Vec::with_capacity(modifiers.len() + 1);

    for modifier in modifiers.iter().filter(|m| Some(*m) != own) {
        flags.insert(modifier);
        strokes.push(KeyStroke {
            code: modifier.key_code(),
            down: true,
            flags,
        });
    }
    strokes.push(KeyStroke {
        code: key,
        down: true,
        flags: modifiers,
    });
    strokes
}

/// Mirror of [`keyboard_press_sequence`]: primary key up, then modifiers up in
/// reverse order.
pub fn keyboard_release_sequence(key: KeyCode, modifiers: ModifierSet) -> Vec<KeyStroke> {
    let own = Modifier::from_key_code(key);
    let mut flags = modifiers;
    if let Some(own) = own {
        flags.remove(own);
    }

    let mut strokes = Vec::with_capacity(modifiers.len() + 1);
    strokes.push(KeyStroke {
        code: key,
        down: false,
        flags,
    });
    for modifier in modifiers.iter().rev().filter(|m| Some(*m) != own) {
        flags.remove(modifier);
        strokes.push(KeyStroke {
            code: modifier.key_code(),
            down: false,
            flags,
        });
    }
    strokes
}

pub struct ActionDispatcher {
    sink: Arc<dyn OutputSink>,
    held: BTreeMap<ControllerButton, Shortcut>,
    failures: u64,
}

impl ActionDispatcher {
    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        Self {
            sink,
            held: BTreeMap::new(),
            failures: 0,
        }
    }

    pub fn into_shared(self) -> SharedDispatcher {
        Arc::new(Mutex::new(self))
    }

    pub fn sink(&self) -> &Arc<dyn OutputSink> {
        &self.sink
    }

    /// Press `shortcut` on behalf of `source`.
    ///
    /// A shortcut still held for the same source is released first, as is
    /// any held chord sharing modifiers with the new one and any other source
    /// holding the same mouse button.
    pub fn press(&mut self, source: &ControllerButton, shortcut: &Shortcut) {
        self.release(source);

        let conflicting: Vec<ControllerButton> = self
            .held
            .iter()
            .filter(|(_, held)| Self::overlaps(held, shortcut))
            .map(|(button, _)| button.clone())
            .collect();
        for button in conflicting {
            debug!("Releasing {} to avoid overlapping output", button);
            self.release(&button);
        }

        debug!("Press {} -> {}", source, shortcut);
        match shortcut {
            Shortcut::Mouse { button } => {
                let at = self.sink.pointer_location();
                self.post_pointer(PointerEvent::ButtonDown {
                    button: *button,
                    at,
                });
            }
            Shortcut::Keyboard {
                key_code,
                modifiers,
            } => {
                for stroke in keyboard_press_sequence(*key_code, *modifiers) {
                    self.post_key(stroke);
                }
            }
            Shortcut::SystemKey { code, modifiers } => self.system_key(*code, *modifiers, true),
        }
        self.held.insert(source.clone(), shortcut.clone());
    }

    fn overlaps(held: &Shortcut, next: &Shortcut) -> bool {
        if let (Shortcut::Mouse { button: a }, Shortcut::Mouse { button: b }) = (held, next) {
            return a == b;
        }
        let modifiers = next.modifiers();
        !modifiers.is_empty() && held.modifiers().intersects(modifiers)
    }

    /// Release whatever `source` holds. Returns `false` if it held nothing.
    pub fn release(&mut self, source: &ControllerButton) -> bool {
        let Some(shortcut) = self.held.remove(source) else {
            return false;
        };

        debug!("Release {} -> {}", source, shortcut);
        match shortcut {
            Shortcut::Mouse { button } => {
                let at = self.sink.pointer_location();
                self.post_pointer(PointerEvent::ButtonUp { button, at });
            }
            Shortcut::Keyboard {
                key_code,
                modifiers,
            } => {
                for stroke in keyboard_release_sequence(key_code, modifiers) {
                    self.post_key(stroke);
                }
            }
            Shortcut::SystemKey { code, modifiers } => self.system_key(code, modifiers, false),
        }
        true
    }

    /// Release everything currently held. Returns the released sources.
    pub fn release_all(&mut self) -> Vec<ControllerButton> {
        let sources: Vec<ControllerButton> = self.held.keys().cloned().collect();
        for source in &sources {
            self.release(source);
        }
        if !sources.is_empty() {
            debug!("Force-released {} held shortcuts", sources.len());
        }
        sources
    }

    pub fn is_holding(&self, source: &ControllerButton) -> bool {
        self.held.contains_key(source)
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    pub fn held_sources(&self) -> impl Iterator<Item = &ControllerButton> {
        self.held.keys()
    }

    /// Mouse button currently held down by a shortcut, if any.
    pub fn held_mouse_button(&self) -> Option<MouseButton> {
        self.held.values().find_map(|shortcut| match shortcut {
            Shortcut::Mouse { button } => Some(*button),
            _ => None,
        })
    }

    /// Move the pointer by a delta, clamped to the display bounds.
    pub fn move_relative(&mut self, dx: f64, dy: f64) -> Point {
        let target = self.sink.pointer_location().offset(dx, dy);
        self.move_absolute(target)
    }

    /// Move the pointer to `target`, clamped to the display bounds. Reported
    /// as a drag while a shortcut holds a mouse button.
    pub fn move_absolute(&mut self, target: Point) -> Point {
        let to = self.sink.display_bounds().clamp(target);
        let event = match self.held_mouse_button() {
            Some(button) => PointerEvent::Dragged { button, to },
            None => PointerEvent::Moved { to },
        };
        self.post_pointer(event);
        to
    }

    pub fn scroll(&mut self, dx: f64, dy: f64) {
        let result = self.sink.post_scroll(dx, dy);
        self.check("scroll", result);
    }

    /// Number of events the sink failed to post.
    pub fn failure_count(&self) -> u64 {
        self.failures
    }

    fn system_key(&mut self, code: SystemKeyCode, modifiers: ModifierSet, down: bool) {
        if down {
            let mut flags = ModifierSet::EMPTY;
            for modifier in modifiers.iter() {
                flags.insert(modifier);
                self.post_key(KeyStroke {
                    code: modifier.key_code(),
                    down: true,
                    flags,
                });
            }
            let result = self.sink.post_system_defined(code.packed(true));
            self.check("system-defined", result);
        } else {
            let result = self.sink.post_system_defined(code.packed(false));
            self.check("system-defined", result);
            let mut flags = modifiers;
            for modifier in modifiers.iter().rev() {
                flags.remove(modifier);
                self.post_key(KeyStroke {
                    code: modifier.key_code(),
                    down: false,
                    flags,
                });
            }
        }
    }

    fn post_pointer(&mut self, event: PointerEvent) {
        let result = self.sink.post_pointer(event);
        self.check("pointer", result);
    }

    fn post_key(&mut self, stroke: KeyStroke) {
        let result = self.sink.post_key(stroke);
        self.check("key", result);
    }

    fn check(&mut self, what: &str, result: Result<(), SinkError>) {
        if let Err(e) = result {
            self.failures += 1;
            warn!("Dropped {} event: {}", what, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{keycodes, system_keys};
    use crate::host::testing::{RecordingSink, SinkRecord};

    fn dispatcher() -> (ActionDispatcher, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::at(Point::new(300.0, 200.0)));
        (ActionDispatcher::new(sink.clone()), sink)
    }

    fn cmd_shift() -> ModifierSet {
        ModifierSet::EMPTY
            .with(Modifier::Shift)
            .with(Modifier::Command)
    }

    #[test]
    fn mouse_click_goes_down_and_up_at_pointer() {
        let (mut d, sink) = dispatcher();
        let a = ControllerButton::new("ButtonA");
        d.press(&a, &Shortcut::mouse(MouseButton::Left));
        assert!(d.release(&a));
        assert!(!d.release(&a));

        let at = Point::new(300.0, 200.0);
        assert_eq!(
            sink.records(),
            vec![
                SinkRecord::Pointer(PointerEvent::ButtonDown {
                    button: MouseButton::Left,
                    at
                }),
                SinkRecord::Pointer(PointerEvent::ButtonUp {
                    button: MouseButton::Left,
                    at
                }),
            ]
        );
    }

    #[test]
    fn two_sources_on_one_mouse_button_stay_balanced() {
        let (mut d, sink) = dispatcher();
        let a = ControllerButton::new("ButtonA");
        let r1 = ControllerButton::new("R1");
        d.press(&a, &Shortcut::mouse(MouseButton::Left));
        d.press(&r1, &Shortcut::mouse(MouseButton::Left));

        assert!(!d.is_holding(&a));
        assert!(d.is_holding(&r1));
        assert!(!d.release(&a));
        assert!(d.release(&r1));

        let downs = sink
            .records()
            .iter()
            .filter(|r| matches!(r, SinkRecord::Pointer(PointerEvent::ButtonDown { .. })))
            .count();
        let ups = sink
            .records()
            .iter()
            .filter(|r| matches!(r, SinkRecord::Pointer(PointerEvent::ButtonUp { .. })))
            .count();
        assert_eq!((downs, ups), (2, 2));
        // Up before the second down
        assert!(matches!(
            sink.records()[1],
            SinkRecord::Pointer(PointerEvent::ButtonUp { .. })
        ));
    }

    #[test]
    fn different_mouse_buttons_are_held_together() {
        let (mut d, _sink) = dispatcher();
        let a = ControllerButton::new("ButtonA");
        let b = ControllerButton::new("ButtonB");
        d.press(&a, &Shortcut::mouse(MouseButton::Left));
        d.press(&b, &Shortcut::mouse(MouseButton::Right));
        assert_eq!(d.held_count(), 2);
    }

    #[test]
    fn chord_modifiers_wrap_primary_key() {
        let downs = keyboard_press_sequence(keycodes::S, cmd_shift());
        let codes: Vec<KeyCode> = downs.iter().map(|s| s.code).collect();
        assert_eq!(codes, vec![keycodes::COMMAND, keycodes::SHIFT, keycodes::S]);
        assert_eq!(downs[0].flags, ModifierSet::EMPTY.with(Modifier::Command));
        assert_eq!(downs[2].flags, cmd_shift());

        let ups = keyboard_release_sequence(keycodes::S, cmd_shift());
        let codes: Vec<KeyCode> = ups.iter().map(|s| s.code).collect();
        assert_eq!(codes, vec![keycodes::S, keycodes::SHIFT, keycodes::COMMAND]);
        assert_eq!(ups.last().unwrap().flags, ModifierSet::EMPTY);
        assert!(ups.iter().all(|s| !s.down));
    }

    #[test]
    fn modifier_primary_is_not_pressed_twice() {
        let mods = ModifierSet::EMPTY
            .with(Modifier::Command)
            .with(Modifier::Option);
        let downs = keyboard_press_sequence(keycodes::COMMAND, mods);
        let codes: Vec<KeyCode> = downs.iter().map(|s| s.code).collect();
        assert_eq!(codes, vec![keycodes::OPTION, keycodes::COMMAND]);

        let ups = keyboard_release_sequence(keycodes::COMMAND, mods);
        assert_eq!(ups.len(), downs.len());
        assert_eq!(ups[0].code, keycodes::COMMAND);
    }

    #[test]
    fn overlapping_modifiers_release_held_chord_first() {
        let (mut d, sink) = dispatcher();
        let l1 = ControllerButton::new("L1");
        let r1 = ControllerButton::new("R1");
        let copy = Shortcut::keyboard(keycodes::C, ModifierSet::EMPTY.with(Modifier::Command));
        let paste = Shortcut::keyboard(keycodes::V, ModifierSet::EMPTY.with(Modifier::Command));

        d.press(&l1, &copy);
        sink.clear();
        d.press(&r1, &paste);

        let keys = sink.keys();
        assert_eq!(keys[0].code, keycodes::C);
        assert!(!keys[0].down);
        assert_eq!(keys[1].code, keycodes::COMMAND);
        assert!(!keys[1].down);
        assert!(!d.is_holding(&l1));
        assert!(d.is_holding(&r1));

        // Releasing the displaced source later posts nothing
        sink.clear();
        assert!(!d.release(&l1));
        assert!(sink.records().is_empty());
    }

    #[test]
    fn system_key_is_wrapped_by_modifiers() {
        let (mut d, sink) = dispatcher();
        let src = ControllerButton::new("R2");
        let mods = ModifierSet::EMPTY.with(Modifier::Shift);
        d.press(&src, &Shortcut::system_key(system_keys::SOUND_UP, mods));
        d.release(&src);

        let records = sink.records();
        assert_eq!(records.len(), 4);
        assert!(matches!(records[0], SinkRecord::Key(KeyStroke { down: true, .. })));
        assert_eq!(records[1], SinkRecord::System(system_keys::SOUND_UP.packed(true)));
        assert_eq!(records[2], SinkRecord::System(system_keys::SOUND_UP.packed(false)));
        assert!(matches!(records[3], SinkRecord::Key(KeyStroke { down: false, .. })));
    }

    #[test]
    fn held_mouse_turns_moves_into_drags() {
        let (mut d, sink) = dispatcher();
        let a = ControllerButton::new("ButtonA");
        d.press(&a, &Shortcut::mouse(MouseButton::Left));
        sink.clear();

        let to = d.move_relative(5.0, -5.0);
        assert_eq!(to, Point::new(305.0, 195.0));
        assert_eq!(
            sink.records(),
            vec![SinkRecord::Pointer(PointerEvent::Dragged {
                button: MouseButton::Left,
                to
            })]
        );
    }

    #[test]
    fn moves_are_clamped_to_display() {
        let (mut d, _sink) = dispatcher();
        assert_eq!(d.move_relative(-10_000.0, 0.0), Point::new(0.0, 200.0));
    }

    #[test]
    fn release_all_balances_every_press() {
        let (mut d, sink) = dispatcher();
        d.press(
            &ControllerButton::new("L1"),
            &Shortcut::keyboard(keycodes::TAB, ModifierSet::EMPTY.with(Modifier::Control)),
        );
        d.press(&ControllerButton::new("ButtonA"), &Shortcut::mouse(MouseButton::Right));

        assert_eq!(d.release_all().len(), 2);
        assert_eq!(d.held_count(), 0);

        let keys = sink.keys();
        let downs = keys.iter().filter(|k| k.down).count();
        assert_eq!(downs, keys.len() - downs);
    }

    #[test]
    fn sink_failures_are_counted_not_raised() {
        let (mut d, sink) = dispatcher();
        sink.set_failing(true);
        let a = ControllerButton::new("ButtonA");
        d.press(&a, &Shortcut::mouse(MouseButton::Left));
        d.scroll(0.0, 1.0);
        assert_eq!(d.failure_count(), 2);
        assert!(d.is_holding(&a));
    }
}
