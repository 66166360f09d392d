//! Game-controller driven pointer, scroll and shortcut engine.
//!
//! Analog sticks move the pointer and scroll; buttons and stick directions
//! trigger mouse clicks, keyboard chords and system keys bound to them.

pub mod bindings;
pub mod controller;
pub mod dispatch;
pub mod engine;
pub mod host;
pub mod mapping;
pub mod persistence;
pub mod recorder;
