//! Controllers decoded through the parameter protocol
//!
//! These are the only concrete controllers the VM itself ships; game
//! controllers follow the same pattern from outside the crate.

use crate::controller::{Controller, Flow};
use crate::diagnostics::Diagnostic;
use crate::error::VmError;
use crate::machine::Exec;
use crate::opcode::Redirect;
use crate::params::{ParamBuffer, ParamTag};
use crate::state::StateSlots;
use crate::world::CharId;

/// Rebind the working subject to the character with the id `program`
/// evaluates to. Returns `false` (stop decoding) when there is none.
///
/// The rebinding lasts for the rest of one invocation only; see [`scoped`].
fn redirect_by_id(ex: &mut Exec<'_>, program: &[u8]) -> Result<bool, VmError> {
    let id = ex.eval_int(program)?;
    match ex.world.resolve(ex.working, Redirect::PlayerId, id) {
        Some(found) => {
            ex.working = found;
            Ok(true)
        }
        None => {
            ex.report(&Diagnostic::RedirectFailed {
                redirect: Redirect::PlayerId,
                index: id,
            });
            Ok(false)
        }
    }
}

/// Run `f` and put the working subject back afterwards, on error too, so a
/// redirect tag never leaks into sibling controllers.
fn scoped<T>(
    ex: &mut Exec<'_>,
    f: impl FnOnce(&mut Exec<'_>) -> Result<T, VmError>,
) -> Result<T, VmError> {
    let saved = ex.working;
    let result = f(ex);
    ex.working = saved;
    result
}

fn single<'p>(programs: &[&'p [u8]], at: usize) -> Result<&'p [u8], VmError> {
    match programs {
        [p] => Ok(p),
        _ => Err(VmError::MalformedParams { at }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarSetTag {
    /// One program: id of the character whose variables are assigned
    Redirect = 0,
    /// Any number of assignment expressions
    Assign = 1,
}

impl ParamTag for VarSetTag {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(VarSetTag::Redirect),
            1 => Some(VarSetTag::Assign),
            _ => None,
        }
    }

    fn tag(self) -> u8 {
        self as u8
    }
}

/// Evaluates assignment expressions for their side effects
#[derive(Debug, Clone, Default)]
pub struct VarSet {
    params: ParamBuffer,
}

impl VarSet {
    pub fn new(params: ParamBuffer) -> Self {
        VarSet { params }
    }
}

impl Controller for VarSet {
    fn run(&self, ex: &mut Exec<'_>, _slots: &mut StateSlots) -> Result<Flow, VmError> {
        scoped(ex, |ex| {
            self.params.decode_typed(|tag: VarSetTag, programs| match tag {
                VarSetTag::Redirect => redirect_by_id(ex, single(programs, 0)?),
                VarSetTag::Assign => {
                    for p in programs {
                        ex.eval(p)?;
                    }
                    Ok(true)
                }
            })
        })?;
        Ok(Flow::Proceed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStateTag {
    Redirect = 0,
    /// One program: the new state number
    Value = 1,
}

impl ParamTag for ChangeStateTag {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ChangeStateTag::Redirect),
            1 => Some(ChangeStateTag::Value),
            _ => None,
        }
    }

    fn tag(self) -> u8 {
        self as u8
    }
}

/// Moves the working subject to another state. Only a change of the owner
/// itself ends the running script.
#[derive(Debug, Clone, Default)]
pub struct ChangeState {
    params: ParamBuffer,
}

impl ChangeState {
    pub fn new(params: ParamBuffer) -> Self {
        ChangeState { params }
    }
}

impl Controller for ChangeState {
    fn run(&self, ex: &mut Exec<'_>, _slots: &mut StateSlots) -> Result<Flow, VmError> {
        let mut target: Option<CharId> = None;
        scoped(ex, |ex| {
            self.params.decode_typed(|tag: ChangeStateTag, programs| match tag {
                ChangeStateTag::Redirect => redirect_by_id(ex, single(programs, 0)?),
                ChangeStateTag::Value => {
                    let state = ex.eval_int(single(programs, 0)?)?;
                    ex.world.change_state(ex.working, state);
                    target = Some(ex.working);
                    Ok(false)
                }
            })
        })?;
        if target == Some(ex.owner) {
            Ok(Flow::ChangeState)
        } else {
            Ok(Flow::Proceed)
        }
    }
}

/// Does nothing. Its parameters are still decoded so a malformed buffer is
/// caught the same way as for any other controller.
#[derive(Debug, Clone, Default)]
pub struct Null {
    params: ParamBuffer,
}

impl Null {
    pub fn new(params: ParamBuffer) -> Self {
        Null { params }
    }
}

impl Controller for Null {
    fn run(&self, _ex: &mut Exec<'_>, _slots: &mut StateSlots) -> Result<Flow, VmError> {
        self.params.decode(|_, _| Ok(true))?;
        Ok(Flow::Proceed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::Assembler;
    use crate::diagnostics::RecordingSink;
    use crate::machine::Machine;
    use crate::config::VmConfig;
    use crate::controller::run_all;
    use crate::opcode::{SetOp, VarKind};
    use crate::program::Program;
    use crate::sandbox::{CharSpec, Sandbox};
    use crate::world::World;
    use statevm_core::Value;

    const P1: CharId = CharId(1);
    const P2: CharId = CharId(2);

    fn world() -> Sandbox {
        let mut w = Sandbox::new(9);
        w.add_char(CharSpec::player(1, 1));
        w.add_char(CharSpec::player(2, 2));
        w
    }

    fn int(v: i32) -> Program {
        let mut asm = Assembler::new();
        asm.int(v);
        asm.finish().unwrap()
    }

    fn assign(index: i32, v: i32) -> Program {
        let mut asm = Assembler::new();
        asm.int(index).int(v).set(SetOp::Var);
        asm.finish().unwrap()
    }

    #[test]
    fn test_varset_assigns_in_order() {
        let mut params = ParamBuffer::new();
        params
            .add(VarSetTag::Assign, &[assign(1, 5).as_bytes(), assign(2, 6).as_bytes()])
            .unwrap();
        let mut m = Machine::default();
        let mut w = world();
        let mut ex = m.exec(&mut w, P1);
        let flow = VarSet::new(params).run(&mut ex, &mut StateSlots::default());
        assert_eq!(flow, Ok(Flow::Proceed));
        assert_eq!(w.var(P1, VarKind::Int, 1), Value::int(5));
        assert_eq!(w.var(P1, VarKind::Int, 2), Value::int(6));
    }

    #[test]
    fn test_varset_redirect() {
        let mut params = ParamBuffer::new();
        params
            .add(VarSetTag::Redirect, &[int(2).as_bytes()])
            .unwrap()
            .add(VarSetTag::Assign, &[assign(0, 8).as_bytes()])
            .unwrap();
        let mut m = Machine::default();
        let mut w = world();
        let mut ex = m.exec(&mut w, P1);
        VarSet::new(params)
            .run(&mut ex, &mut StateSlots::default())
            .unwrap();
        assert_eq!(w.var(P2, VarKind::Int, 0), Value::int(8));
        assert_eq!(w.var(P1, VarKind::Int, 0), Value::int(0));
    }

    #[test]
    fn test_redirect_does_not_outlive_its_controller() {
        let mut redirected = ParamBuffer::new();
        redirected
            .add(VarSetTag::Redirect, &[int(2).as_bytes()])
            .unwrap()
            .add(VarSetTag::Assign, &[assign(0, 8).as_bytes()])
            .unwrap();
        let mut plain = ParamBuffer::new();
        plain.add(VarSetTag::Assign, &[assign(1, 9).as_bytes()]).unwrap();
        let mut state = ParamBuffer::new();
        state.add(ChangeStateTag::Value, &[int(200).as_bytes()]).unwrap();
        let list: Vec<Box<dyn Controller>> = vec![
            Box::new(VarSet::new(redirected)),
            Box::new(VarSet::new(plain)),
            Box::new(ChangeState::new(state)),
        ];

        let mut m = Machine::default();
        let mut w = world();
        let mut ex = m.exec(&mut w, P1);
        let flow = run_all(&list, &mut ex, &mut StateSlots::default());
        assert_eq!(flow, Ok(Flow::ChangeState));
        assert_eq!(ex.working, P1);
        assert_eq!(w.var(P2, VarKind::Int, 0), Value::int(8));
        assert_eq!(w.var(P1, VarKind::Int, 1), Value::int(9));
        assert_eq!(w.var(P2, VarKind::Int, 1), Value::int(0));
        assert_eq!(w.state_changes(), &[(P1, 200)]);
    }

    #[test]
    fn test_subject_restored_after_fatal_error() {
        let mut params = ParamBuffer::new();
        params
            .add(ChangeStateTag::Redirect, &[int(2).as_bytes()])
            .unwrap()
            .add(ChangeStateTag::Value, &[])
            .unwrap();
        let mut m = Machine::default();
        let mut w = world();
        let mut ex = m.exec(&mut w, P1);
        assert!(
            ChangeState::new(params)
                .run(&mut ex, &mut StateSlots::default())
                .is_err()
        );
        assert_eq!(ex.working, P1);
    }

    #[test]
    fn test_failed_redirect_skips_the_rest() {
        let mut params = ParamBuffer::new();
        params
            .add(VarSetTag::Redirect, &[int(77).as_bytes()])
            .unwrap()
            .add(VarSetTag::Assign, &[assign(0, 8).as_bytes()])
            .unwrap();
        let sink = RecordingSink::new();
        let mut m = Machine::with_sink(VmConfig::default(), sink.clone());
        let mut w = world();
        let mut ex = m.exec(&mut w, P1);
        VarSet::new(params)
            .run(&mut ex, &mut StateSlots::default())
            .unwrap();
        assert_eq!(w.var(P1, VarKind::Int, 0), Value::int(0));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_change_state_of_another_character_continues() {
        let mut params = ParamBuffer::new();
        params
            .add(ChangeStateTag::Redirect, &[int(2).as_bytes()])
            .unwrap()
            .add(ChangeStateTag::Value, &[int(5050).as_bytes()])
            .unwrap();
        let mut m = Machine::default();
        let mut w = world();
        let mut ex = m.exec(&mut w, P1);
        let flow = ChangeState::new(params).run(&mut ex, &mut StateSlots::default());
        assert_eq!(flow, Ok(Flow::Proceed));
        assert_eq!(w.state_changes(), &[(P2, 5050)]);
    }

    #[test]
    fn test_wrong_program_count_is_fatal() {
        let mut params = ParamBuffer::new();
        params.add(ChangeStateTag::Value, &[]).unwrap();
        let mut m = Machine::default();
        let mut w = world();
        let mut ex = m.exec(&mut w, P1);
        assert_eq!(
            ChangeState::new(params).run(&mut ex, &mut StateSlots::default()),
            Err(VmError::MalformedParams { at: 0 })
        );
    }

    #[test]
    fn test_null_checks_its_buffer() {
        let mut m = Machine::default();
        let mut w = world();
        let mut ex = m.exec(&mut w, P1);
        let ok = Null::default();
        assert_eq!(ok.run(&mut ex, &mut StateSlots::default()), Ok(Flow::Proceed));
        let bad = Null::new(ParamBuffer::from_bytes(vec![0, 1, 9]));
        assert!(bad.run(&mut ex, &mut StateSlots::default()).is_err());
    }
}
