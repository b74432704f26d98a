//! The world collaborator
//!
//! Everything the interpreter knows about characters comes through this
//! trait: redirections, trigger values, persistent variables, hit pause and
//! state changes. The interpreter never holds a character, only a [`CharId`].
//!
//! Getters default to `SFalse` so a host only implements what its scripts
//! actually read.

use crate::opcode::{CharConst, HitVar, IndexedTrigger, Redirect, Trigger, VarKind};
use serde::{Deserialize, Serialize};
use statevm_core::Value;
use std::fmt;

/// Identity of a character (player or helper) in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharId(pub i32);

impl fmt::Display for CharId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait World {
    /// Find the character `redirect` names, as seen from `from`.
    ///
    /// `index` is the popped argument for redirections that take one and 0
    /// for the others.
    fn resolve(&mut self, from: CharId, redirect: Redirect, index: i32) -> Option<CharId>;

    fn trigger(&mut self, _who: CharId, _trigger: Trigger) -> Value {
        Value::SFALSE
    }

    fn indexed_trigger(&mut self, _who: CharId, _trigger: IndexedTrigger, _arg: Value) -> Value {
        Value::SFALSE
    }

    fn constant(&mut self, _who: CharId, _constant: CharConst) -> Value {
        Value::SFALSE
    }

    fn hit_var(&mut self, _who: CharId, _field: HitVar) -> Value {
        Value::SFALSE
    }

    /// Read a persistent variable. Out-of-range indices yield `SFalse`.
    fn var(&mut self, who: CharId, kind: VarKind, index: i32) -> Value;

    /// Write a persistent variable and return the value actually stored
    /// (after conversion to the variable's kind).
    fn set_var(&mut self, who: CharId, kind: VarKind, index: i32, value: Value) -> Value;

    fn hit_pause(&self, who: CharId) -> bool;

    /// Uniform integer in `0..=999`
    fn random(&mut self, who: CharId) -> i32;

    /// Whether integer `**` must reproduce the legacy bit order for `who`
    fn legacy_pow(&self, _who: CharId) -> bool {
        false
    }

    fn change_state(&mut self, who: CharId, state: i32);
}
