//! In-memory world
//!
//! [`Sandbox`] is a small, deterministic [`World`] for tests and the `svm`
//! tool. Characters are plain records loaded from TOML; trigger, constant
//! and hit-var values are looked up by mnemonic, so a sandbox file reads
//! like the scripts it feeds:
//!
//! ```toml
//! seed = 7
//!
//! [[char]]
//! id = 1
//! team = 1
//! pos = [0.0, 0.0]
//! vars = [0, 0, 5]
//!
//! [char.triggers]
//! life = 1000
//! "pos.x" = 12.5
//! ctrl = true
//!
//! [[char]]
//! id = 2
//! team = 2
//! pos = [80.0, 0.0]
//! ```
//!
//! Relationships: a helper has `parent` and `root` set; players have
//! neither. Enemies are players of another team, partners are players of the
//! same team. Missing trigger values read as `0`.

use crate::error::ConfigError;
use crate::opcode::{CharConst, HitVar, IndexedTrigger, Redirect, Trigger, VarKind};
use crate::world::{CharId, World};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statevm_core::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub const NUM_VARS: usize = 60;
pub const NUM_FVARS: usize = 40;
pub const NUM_SYSVARS: usize = 5;
pub const NUM_SYSFVARS: usize = 5;

/// A number as written in a sandbox file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl From<Number> for Value {
    fn from(n: Number) -> Value {
        match n {
            Number::Bool(b) => Value::bool(b),
            Number::Int(i) => Value::int64(i),
            Number::Float(f) => Value::float64(f),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CharSpec {
    pub id: i32,
    pub team: i32,
    pub parent: Option<i32>,
    pub root: Option<i32>,
    pub helper_id: i32,
    pub hit_pause: bool,
    pub pos: [f32; 2],
    /// Ids of the characters this one currently holds as targets
    pub targets: Vec<i32>,
    pub vars: Vec<i32>,
    pub fvars: Vec<f32>,
    pub sysvars: Vec<i32>,
    pub sysfvars: Vec<f32>,
    pub triggers: BTreeMap<String, Number>,
    /// Indexed triggers without a built-in answer; the argument is ignored
    pub indexed: BTreeMap<String, Number>,
    pub constants: BTreeMap<String, Number>,
    pub hit_vars: BTreeMap<String, Number>,
}

impl CharSpec {
    pub fn player(id: i32, team: i32) -> Self {
        CharSpec {
            id,
            team,
            ..CharSpec::default()
        }
    }

    /// Helper spawned by player `parent`. It joins the parent's team.
    pub fn helper(id: i32, parent: i32, helper_id: i32) -> Self {
        CharSpec {
            id,
            parent: Some(parent),
            root: Some(parent),
            helper_id,
            ..CharSpec::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxSpec {
    pub seed: u64,
    pub legacy_pow: bool,
    #[serde(rename = "char")]
    pub chars: Vec<CharSpec>,
}

#[derive(Debug, Clone)]
struct Character {
    spec: CharSpec,
    /// Indexed by `VarKind`
    vars: [Vec<Value>; 4],
}

fn slot(kind: VarKind) -> usize {
    match kind {
        VarKind::Int => 0,
        VarKind::Float => 1,
        VarKind::SysInt => 2,
        VarKind::SysFloat => 3,
    }
}

fn fit(kind: VarKind, v: Value) -> Value {
    match kind {
        VarKind::Int | VarKind::SysInt => Value::int(v.to_int()),
        VarKind::Float | VarKind::SysFloat => Value::float(v.to_float()),
    }
}

fn fill<T: Copy>(
    id: i32,
    name: &str,
    init: &[T],
    len: usize,
    zero: Value,
    conv: impl Fn(T) -> Value,
) -> Result<Vec<Value>, ConfigError> {
    if init.len() > len {
        return Err(ConfigError::Sandbox(format!(
            "char {}: {} initial {} values, only {} exist",
            id,
            init.len(),
            name,
            len
        )));
    }
    let mut out: Vec<Value> = init.iter().map(|&v| conv(v)).collect();
    out.resize(len, zero);
    Ok(out)
}

impl Character {
    fn new(spec: CharSpec) -> Result<Self, ConfigError> {
        let id = spec.id;
        let vars = [
            fill(id, "var", &spec.vars, NUM_VARS, Value::int(0), Value::int)?,
            fill(id, "fvar", &spec.fvars, NUM_FVARS, Value::float(0.0), Value::float)?,
            fill(id, "sysvar", &spec.sysvars, NUM_SYSVARS, Value::int(0), Value::int)?,
            fill(id, "sysfvar", &spec.sysfvars, NUM_SYSFVARS, Value::float(0.0), Value::float)?,
        ];
        Ok(Character { spec, vars })
    }

    fn is_player(&self) -> bool {
        self.spec.root.is_none()
    }

    fn root(&self) -> CharId {
        CharId(self.spec.root.unwrap_or(self.spec.id))
    }

    fn lookup(map: &BTreeMap<String, Number>, key: &str) -> Value {
        map.get(key).map_or(Value::int(0), |&n| n.into())
    }
}

#[derive(Debug, Clone)]
pub struct Sandbox {
    chars: BTreeMap<CharId, Character>,
    rng: StdRng,
    legacy_pow: bool,
    state_changes: Vec<(CharId, i32)>,
}

impl Sandbox {
    pub fn new(seed: u64) -> Self {
        Sandbox {
            chars: BTreeMap::new(),
            rng: StdRng::seed_from_u64(seed),
            legacy_pow: false,
            state_changes: Vec::new(),
        }
    }

    pub fn from_spec(spec: SandboxSpec) -> Result<Self, ConfigError> {
        let mut sandbox = Sandbox::new(spec.seed);
        sandbox.legacy_pow = spec.legacy_pow;
        for c in spec.chars {
            let id = c.id;
            if sandbox.chars.contains_key(&CharId(id)) {
                return Err(ConfigError::Sandbox(format!("char {} defined twice", id)));
            }
            sandbox.insert(c)?;
        }
        Ok(sandbox)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Self::from_spec(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    fn insert(&mut self, mut spec: CharSpec) -> Result<CharId, ConfigError> {
        if spec.team == 0 {
            if let Some(parent) = spec.parent.and_then(|p| self.chars.get(&CharId(p))) {
                spec.team = parent.spec.team;
            }
        }
        let id = CharId(spec.id);
        self.chars.insert(id, Character::new(spec)?);
        Ok(id)
    }

    /// Add or replace a character. Initial variable lists longer than the
    /// variable files are truncated.
    pub fn add_char(&mut self, mut spec: CharSpec) -> CharId {
        spec.vars.truncate(NUM_VARS);
        spec.fvars.truncate(NUM_FVARS);
        spec.sysvars.truncate(NUM_SYSVARS);
        spec.sysfvars.truncate(NUM_SYSFVARS);
        let id = CharId(spec.id);
        if let Err(e) = self.insert(spec) {
            tracing::warn!(char = %id, "{}", e);
        }
        id
    }

    pub fn contains(&self, id: CharId) -> bool {
        self.chars.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = CharId> + '_ {
        self.chars.keys().copied()
    }

    pub fn set_legacy_pow(&mut self, on: bool) {
        self.legacy_pow = on;
    }

    pub fn set_hit_pause(&mut self, id: CharId, paused: bool) {
        if let Some(c) = self.chars.get_mut(&id) {
            c.spec.hit_pause = paused;
        }
    }

    pub fn set_trigger(&mut self, id: CharId, trigger: Trigger, value: Number) {
        if let Some(c) = self.chars.get_mut(&id) {
            c.spec.triggers.insert(trigger.mnemonic().to_string(), value);
        }
    }

    /// Every state change requested so far, in order
    pub fn state_changes(&self) -> &[(CharId, i32)] {
        &self.state_changes
    }

    fn players(&self) -> impl Iterator<Item = &Character> {
        self.chars.values().filter(|c| c.is_player())
    }

    fn helpers_of(&self, root: CharId) -> impl Iterator<Item = &Character> {
        self.chars
            .values()
            .filter(move |c| !c.is_player() && c.root() == root)
    }

    fn enemies_of(&self, me: &Character) -> Vec<CharId> {
        let team = me.spec.team;
        self.players()
            .filter(|c| c.spec.team != team)
            .map(|c| CharId(c.spec.id))
            .collect()
    }

    fn nearest_enemies(&self, me: &Character) -> Vec<CharId> {
        let x = me.spec.pos[0];
        let mut enemies: Vec<(f32, CharId)> = self
            .enemies_of(me)
            .into_iter()
            .filter_map(|id| self.chars.get(&id).map(|c| ((c.spec.pos[0] - x).abs(), id)))
            .collect();
        enemies.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        enemies.into_iter().map(|(_, id)| id).collect()
    }
}

fn nth(ids: impl IntoIterator<Item = CharId>, index: i32) -> Option<CharId> {
    usize::try_from(index)
        .ok()
        .and_then(|i| ids.into_iter().nth(i))
}

impl World for Sandbox {
    fn resolve(&mut self, from: CharId, redirect: Redirect, index: i32) -> Option<CharId> {
        let me = self.chars.get(&from)?;
        let found = match redirect {
            Redirect::PlayerId => Some(CharId(index)),
            Redirect::Parent => me.spec.parent.map(CharId),
            Redirect::Root => me.spec.root.map(CharId),
            Redirect::Helper => self
                .helpers_of(me.root())
                .find(|c| index <= 0 || c.spec.helper_id == index)
                .map(|c| CharId(c.spec.id)),
            Redirect::HelperIndex => nth(
                self.helpers_of(me.root()).map(|c| CharId(c.spec.id)),
                index,
            ),
            Redirect::Target => nth(me.spec.targets.iter().map(|&t| CharId(t)), index.max(0)),
            Redirect::Partner => {
                let (root, team) = (me.root(), me.spec.team);
                nth(
                    self.players()
                        .filter(|c| c.spec.team == team && CharId(c.spec.id) != root)
                        .map(|c| CharId(c.spec.id)),
                    index,
                )
            }
            Redirect::Enemy => nth(self.enemies_of(me), index),
            Redirect::EnemyNear => nth(self.nearest_enemies(me), index),
            Redirect::P2 => self.nearest_enemies(me).first().copied(),
        };
        found.filter(|id| self.chars.contains_key(id))
    }

    fn trigger(&mut self, who: CharId, trigger: Trigger) -> Value {
        let Some(c) = self.chars.get(&who) else {
            return Value::SFALSE;
        };
        match trigger {
            Trigger::Id => Value::int(c.spec.id),
            Trigger::IsHelper => Value::bool(!c.is_player()),
            Trigger::NumEnemy => Value::int(self.enemies_of(c).len() as i32),
            Trigger::NumPartner => {
                let (root, team) = (c.root(), c.spec.team);
                let n = self
                    .players()
                    .filter(|p| p.spec.team == team && CharId(p.spec.id) != root)
                    .count();
                Value::int(n as i32)
            }
            _ => Character::lookup(&c.spec.triggers, trigger.mnemonic()),
        }
    }

    fn indexed_trigger(&mut self, who: CharId, trigger: IndexedTrigger, arg: Value) -> Value {
        let Some(c) = self.chars.get(&who) else {
            return Value::SFALSE;
        };
        let arg = arg.to_int();
        match trigger {
            IndexedTrigger::NumHelper => {
                let n = self
                    .helpers_of(c.root())
                    .filter(|h| arg <= 0 || h.spec.helper_id == arg)
                    .count();
                Value::int(n as i32)
            }
            IndexedTrigger::NumTarget => Value::int(c.spec.targets.len() as i32),
            IndexedTrigger::IsHelperId => {
                Value::bool(!c.is_player() && (arg <= 0 || c.spec.helper_id == arg))
            }
            _ => Character::lookup(&c.spec.indexed, trigger.mnemonic()),
        }
    }

    fn constant(&mut self, who: CharId, constant: CharConst) -> Value {
        self.chars.get(&who).map_or(Value::SFALSE, |c| {
            Character::lookup(&c.spec.constants, constant.mnemonic())
        })
    }

    fn hit_var(&mut self, who: CharId, field: HitVar) -> Value {
        self.chars.get(&who).map_or(Value::SFALSE, |c| {
            Character::lookup(&c.spec.hit_vars, field.mnemonic())
        })
    }

    fn var(&mut self, who: CharId, kind: VarKind, index: i32) -> Value {
        self.chars
            .get(&who)
            .and_then(|c| {
                let i = usize::try_from(index).ok()?;
                c.vars[slot(kind)].get(i).copied()
            })
            .unwrap_or(Value::SFALSE)
    }

    fn set_var(&mut self, who: CharId, kind: VarKind, index: i32, value: Value) -> Value {
        let stored = fit(kind, value);
        self.chars
            .get_mut(&who)
            .and_then(|c| {
                let i = usize::try_from(index).ok()?;
                let cell = c.vars[slot(kind)].get_mut(i)?;
                *cell = stored;
                Some(stored)
            })
            .unwrap_or(Value::SFALSE)
    }

    fn hit_pause(&self, who: CharId) -> bool {
        self.chars.get(&who).is_some_and(|c| c.spec.hit_pause)
    }

    fn random(&mut self, _who: CharId) -> i32 {
        self.rng.gen_range(0..1000)
    }

    fn legacy_pow(&self, _who: CharId) -> bool {
        self.legacy_pow
    }

    fn change_state(&mut self, who: CharId, state: i32) {
        self.state_changes.push((who, state));
        if let Some(c) = self.chars.get_mut(&who) {
            let triggers = &mut c.spec.triggers;
            let prev = triggers
                .get(Trigger::StateNo.mnemonic())
                .copied()
                .unwrap_or(Number::Int(0));
            triggers.insert(Trigger::PrevStateNo.mnemonic().to_string(), prev);
            triggers.insert(
                Trigger::StateNo.mnemonic().to_string(),
                Number::Int(state as i64),
            );
        }
        tracing::debug!(char = %who, state, "state change requested");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = r#"
seed = 11

[[char]]
id = 1
team = 1
pos = [0.0, 0.0]
vars = [3]
targets = [3]

[char.triggers]
life = 900
"pos.x" = 2.5
ctrl = true

[char.constants]
"data.life" = 1000

[[char]]
id = 2
team = 1

[[char]]
id = 3
team = 2
pos = [90.0, 0.0]

[[char]]
id = 4
team = 2
pos = [-20.0, 0.0]

[[char]]
id = 10
parent = 1
root = 1
helper_id = 1234
"#;

    fn sandbox() -> Sandbox {
        Sandbox::from_toml_str(FILE).unwrap()
    }

    #[test]
    fn test_load_values() {
        let mut w = sandbox();
        let p1 = CharId(1);
        assert_eq!(w.trigger(p1, Trigger::Life), Value::int(900));
        assert_eq!(w.trigger(p1, Trigger::PosX), Value::float(2.5));
        assert_eq!(w.trigger(p1, Trigger::Ctrl), Value::bool(true));
        assert_eq!(w.trigger(p1, Trigger::Power), Value::int(0));
        assert_eq!(w.constant(p1, CharConst::DataLife), Value::int(1000));
        assert_eq!(w.var(p1, VarKind::Int, 0), Value::int(3));
        assert_eq!(w.var(p1, VarKind::Float, 39), Value::float(0.0));
        assert!(w.var(p1, VarKind::Float, 40).is_sf());
        assert!(w.trigger(CharId(99), Trigger::Life).is_sf());
    }

    #[test]
    fn test_relationships() {
        let mut w = sandbox();
        let (p1, helper) = (CharId(1), CharId(10));
        assert_eq!(w.resolve(helper, Redirect::Parent, 0), Some(p1));
        assert_eq!(w.resolve(helper, Redirect::Root, 0), Some(p1));
        assert_eq!(w.resolve(p1, Redirect::Parent, 0), None);
        assert_eq!(w.resolve(p1, Redirect::Helper, 1234), Some(helper));
        assert_eq!(w.resolve(p1, Redirect::Helper, 1), None);
        assert_eq!(w.resolve(p1, Redirect::HelperIndex, 0), Some(helper));
        assert_eq!(w.resolve(p1, Redirect::Partner, 0), Some(CharId(2)));
        assert_eq!(w.resolve(p1, Redirect::Enemy, 1), Some(CharId(4)));
        assert_eq!(w.resolve(p1, Redirect::EnemyNear, 0), Some(CharId(4)));
        assert_eq!(w.resolve(p1, Redirect::P2, 0), Some(CharId(4)));
        assert_eq!(w.resolve(p1, Redirect::Target, -1), Some(CharId(3)));
        assert_eq!(w.resolve(p1, Redirect::PlayerId, 77), None);
        assert_eq!(w.trigger(helper, Trigger::IsHelper), Value::bool(true));
        assert_eq!(
            w.indexed_trigger(p1, IndexedTrigger::NumHelper, Value::int(1234)),
            Value::int(1)
        );
        assert_eq!(w.trigger(p1, Trigger::NumEnemy), Value::int(2));
    }

    #[test]
    fn test_set_var_converts_to_kind() {
        let mut w = sandbox();
        let p1 = CharId(1);
        assert_eq!(
            w.set_var(p1, VarKind::Int, 5, Value::float(2.75)),
            Value::int(2)
        );
        assert_eq!(
            w.set_var(p1, VarKind::SysFloat, 0, Value::int(3)),
            Value::float(3.0)
        );
        assert!(w.set_var(p1, VarKind::SysInt, 5, Value::int(1)).is_sf());
        assert!(w.set_var(p1, VarKind::Int, -1, Value::int(1)).is_sf());
    }

    #[test]
    fn test_random_is_seeded() {
        let mut a = sandbox();
        let mut b = sandbox();
        let ra: Vec<i32> = (0..20).map(|_| a.random(CharId(1))).collect();
        let rb: Vec<i32> = (0..20).map(|_| b.random(CharId(1))).collect();
        assert_eq!(ra, rb);
        assert!(ra.iter().all(|r| (0..1000).contains(r)));
    }

    #[test]
    fn test_change_state_updates_triggers() {
        let mut w = sandbox();
        let p1 = CharId(1);
        w.change_state(p1, 200);
        w.change_state(p1, 210);
        assert_eq!(w.trigger(p1, Trigger::StateNo), Value::int(210));
        assert_eq!(w.trigger(p1, Trigger::PrevStateNo), Value::int(200));
        assert_eq!(w.state_changes(), &[(p1, 200), (p1, 210)]);
    }

    #[test]
    fn test_invalid_files() {
        let dup = "[[char]]\nid = 1\n[[char]]\nid = 1\n";
        assert!(matches!(
            Sandbox::from_toml_str(dup),
            Err(ConfigError::Sandbox(_))
        ));
        let too_many = format!("[[char]]\nid = 1\nsysvars = {:?}\n", [0; 6]);
        assert!(matches!(
            Sandbox::from_toml_str(&too_many),
            Err(ConfigError::Sandbox(_))
        ));
        assert!(matches!(
            Sandbox::from_toml_str("[[char]]\nid = 1\nspeed = 3\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_helper_joins_parent_team() {
        let mut w = Sandbox::new(0);
        w.add_char(CharSpec::player(1, 3));
        w.add_char(CharSpec::player(2, 4));
        w.add_char(CharSpec::helper(5, 1, 0));
        assert_eq!(w.resolve(CharId(5), Redirect::Enemy, 0), Some(CharId(2)));
    }
}
