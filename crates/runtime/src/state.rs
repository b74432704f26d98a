//! State scripts
//!
//! A [`StateScript`] is one compiled state: a preamble run once on entry and
//! a root [`Block`] run every tick. Per-entity scratch for the state lives in
//! [`StateSlots`], created on entry and handed back on every tick.

use crate::block::Block;
use crate::controller::{Controller, Flow, run_all};
use crate::error::VmError;
use crate::machine::{Exec, Machine};
use crate::world::{CharId, World};

#[derive(Debug, Default)]
pub struct StateScript {
    pub number: i32,
    /// Locals allocated for every tick
    pub num_vars: usize,
    pub persistent_slots: usize,
    pub pause_slots: usize,
    /// Controllers run once when the state is entered
    pub preamble: Vec<Box<dyn Controller>>,
    pub root: Block,
}

/// Persistence counters and hit-pause toggles of one entity in one state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSlots {
    persistent: Vec<i32>,
    toggles: Vec<bool>,
}

impl StateSlots {
    pub fn new(persistent: usize, pause: usize) -> Self {
        StateSlots {
            persistent: vec![0; persistent],
            toggles: vec![false; pause],
        }
    }

    pub fn for_script(script: &StateScript) -> Self {
        Self::new(script.persistent_slots, script.pause_slots)
    }

    pub fn persistent(&self, slot: usize) -> Option<i32> {
        self.persistent.get(slot).copied()
    }

    pub fn toggle(&self, slot: usize) -> Option<bool> {
        self.toggles.get(slot).copied()
    }

    pub fn persistent_mut(&mut self, slot: usize) -> Result<&mut i32, VmError> {
        let len = self.persistent.len();
        self.persistent.get_mut(slot).ok_or(VmError::SlotOutOfRange {
            kind: "persistence",
            slot,
            len,
        })
    }

    pub fn toggle_mut(&mut self, slot: usize) -> Result<&mut bool, VmError> {
        let len = self.toggles.len();
        self.toggles.get_mut(slot).ok_or(VmError::SlotOutOfRange {
            kind: "hit-pause",
            slot,
            len,
        })
    }
}

impl Machine {
    /// Enter `script` for `owner`: fresh slots, then the preamble
    pub fn enter_state(
        &mut self,
        world: &mut dyn World,
        owner: CharId,
        script: &StateScript,
    ) -> Result<StateSlots, VmError> {
        tracing::debug!(char = %owner, state = script.number, "entering state");
        let mut slots = StateSlots::for_script(script);
        self.in_frame(world, owner, script.num_vars, |ex| {
            run_all(&script.preamble, ex, &mut slots)
        })?;
        Ok(slots)
    }

    /// Run one tick of `script` for `owner`.
    ///
    /// Returns whether the owner changed state. On a fatal error the machine
    /// is reset and the error returned; the caller moves on to the next
    /// entity.
    pub fn run_state(
        &mut self,
        world: &mut dyn World,
        owner: CharId,
        script: &StateScript,
        slots: &mut StateSlots,
    ) -> Result<bool, VmError> {
        let flow = self.in_frame(world, owner, script.num_vars, |ex| {
            script.root.run(ex, slots)
        })?;
        let changed = flow == Flow::ChangeState;
        if changed {
            tracing::debug!(char = %owner, state = script.number, "left state");
        }
        Ok(changed)
    }

    fn in_frame<F>(
        &mut self,
        world: &mut dyn World,
        owner: CharId,
        num_vars: usize,
        body: F,
    ) -> Result<Flow, VmError>
    where
        F: FnOnce(&mut Exec<'_>) -> Result<Flow, VmError>,
    {
        let frame = self.arena.alloc(num_vars);
        let saved = std::mem::replace(&mut self.frame, frame);
        let result = body(&mut self.exec(world, owner));
        self.frame = saved;
        self.arena.release(frame);

        let result = result.and_then(|flow| match self.stack.len() {
            0 => Ok(flow),
            n => Err(VmError::UnbalancedStack {
                expected: 0,
                found: n as isize,
            }),
        });
        if result.is_err() {
            self.reset();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::Assembler;
    use crate::builtin::{ChangeState, ChangeStateTag, VarSet, VarSetTag};
    use crate::params::ParamBuffer;
    use crate::sandbox::{CharSpec, Sandbox};
    use statevm_core::Value;

    const P1: CharId = CharId(1);

    fn world() -> Sandbox {
        let mut w = Sandbox::new(3);
        w.add_char(CharSpec::player(1, 1));
        w
    }

    #[test]
    fn test_slots_start_cleared() {
        let slots = StateSlots::new(2, 1);
        assert_eq!(slots.persistent(1), Some(0));
        assert_eq!(slots.toggle(0), Some(false));
        assert_eq!(slots.persistent(2), None);
    }

    #[test]
    fn test_preamble_and_tick() {
        // preamble: var(0) := 11; tick: var(0) := var(0) + 1
        let mut asm = Assembler::new();
        asm.int(0).int(11).set(crate::opcode::SetOp::Var);
        let init = asm.finish().unwrap();
        let mut asm = Assembler::new();
        asm.int(0).int(1).set(crate::opcode::SetOp::VarAdd);
        let bump = asm.finish().unwrap();

        let mut params = ParamBuffer::new();
        params.add(VarSetTag::Assign, &[init.as_bytes()]).unwrap();
        let preamble: Vec<Box<dyn Controller>> = vec![Box::new(VarSet::new(params))];
        let mut params = ParamBuffer::new();
        params.add(VarSetTag::Assign, &[bump.as_bytes()]).unwrap();
        let script = StateScript {
            number: 200,
            preamble,
            root: Block::new(vec![Box::new(VarSet::new(params))]),
            ..StateScript::default()
        };

        let mut m = Machine::default();
        let mut w = world();
        let mut slots = m.enter_state(&mut w, P1, &script).unwrap();
        assert_eq!(m.run_state(&mut w, P1, &script, &mut slots), Ok(false));
        assert_eq!(m.run_state(&mut w, P1, &script, &mut slots), Ok(false));
        assert_eq!(
            w.var(P1, crate::opcode::VarKind::Int, 0),
            Value::int(13)
        );
        assert_eq!(m.arena().depth(), 0);
    }

    #[test]
    fn test_change_state_stops_the_tick() {
        let mut asm = Assembler::new();
        asm.int(0);
        let zero = asm.finish().unwrap();
        let mut params = ParamBuffer::new();
        params.add(ChangeStateTag::Value, &[zero.as_bytes()]).unwrap();

        let mut asm = Assembler::new();
        asm.int(0).int(1).set(crate::opcode::SetOp::VarAdd);
        let bump = asm.finish().unwrap();
        let mut after = ParamBuffer::new();
        after.add(VarSetTag::Assign, &[bump.as_bytes()]).unwrap();

        let script = StateScript {
            number: 5,
            root: Block::new(vec![
                Box::new(Block::new(vec![Box::new(ChangeState::new(params))])),
                Box::new(VarSet::new(after)),
            ]),
            ..StateScript::default()
        };
        let mut m = Machine::default();
        let mut w = world();
        let mut slots = m.enter_state(&mut w, P1, &script).unwrap();
        assert_eq!(m.run_state(&mut w, P1, &script, &mut slots), Ok(true));
        assert_eq!(w.state_changes(), &[(P1, 0)]);
        assert_eq!(w.var(P1, crate::opcode::VarKind::Int, 0), Value::int(0));
    }

    #[test]
    fn test_fatal_error_resets_machine() {
        #[derive(Debug)]
        struct Leak;
        impl Controller for Leak {
            fn run(&self, ex: &mut Exec<'_>, _: &mut StateSlots) -> Result<Flow, VmError> {
                ex.push_values(&[crate::opcode::OpCode::Int8 as u8, 1])?;
                Ok(Flow::Proceed)
            }
        }
        let script = StateScript {
            num_vars: 3,
            root: Block::new(vec![Box::new(Leak)]),
            ..StateScript::default()
        };
        let mut m = Machine::default();
        let mut w = world();
        let mut slots = StateSlots::for_script(&script);
        assert_eq!(
            m.run_state(&mut w, P1, &script, &mut slots),
            Err(VmError::UnbalancedStack {
                expected: 0,
                found: 1
            })
        );
        assert!(m.stack().is_empty());
        assert_eq!(m.arena().depth(), 0);
    }
}
