//! The interpreter context
//!
//! A [`Machine`] owns everything that survives between evaluations: the
//! operand stack, the variable arena, the active frame and the call depth.
//! It is long-lived and reused for every entity on every tick.
//!
//! An [`Exec`] binds a machine to one world and one owning entity for the
//! duration of a state-script run. Controllers receive the `Exec` and use it
//! to evaluate their parameters.
//!
//! After a fatal error the machine resets itself, so the next entity always
//! starts with an empty stack and arena.

use crate::config::VmConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::error::VmError;
use crate::world::{CharId, World};
use statevm_core::{Frame, OperandStack, Value, VarArena};
use std::fmt;

pub struct Machine {
    pub(crate) stack: OperandStack,
    pub(crate) arena: VarArena,
    /// Locals of the innermost state script or function
    pub(crate) frame: Frame,
    pub(crate) call_depth: u32,
    config: VmConfig,
    sink: Box<dyn DiagnosticSink>,
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("stack", &self.stack.len())
            .field("arena", &self.arena.depth())
            .field("frame", &self.frame)
            .field("call_depth", &self.call_depth)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}

impl Machine {
    /// Machine reporting diagnostics through `tracing`
    pub fn new(config: VmConfig) -> Self {
        Self::with_sink(config, TracingSink)
    }

    pub fn with_sink(config: VmConfig, sink: impl DiagnosticSink + 'static) -> Self {
        Machine {
            stack: OperandStack::with_capacity(config.stack_capacity),
            arena: VarArena::with_capacity(config.arena_capacity),
            frame: Frame::default(),
            call_depth: 0,
            config,
            sink: Box::new(sink),
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    pub fn arena(&self) -> &VarArena {
        &self.arena
    }

    /// Drop all transient state
    pub fn reset(&mut self) {
        self.stack.clear();
        self.arena.reset();
        self.frame = Frame::default();
        self.call_depth = 0;
    }

    pub(crate) fn report(&self, who: CharId, diagnostic: &Diagnostic) {
        self.sink.report(who, diagnostic);
    }

    /// Bind this machine to `world` for a run on behalf of `owner`
    pub fn exec<'a>(&'a mut self, world: &'a mut dyn World, owner: CharId) -> Exec<'a> {
        Exec {
            machine: self,
            world,
            owner,
            working: owner,
        }
    }

    /// Evaluate one top-level expression for `owner` in the active frame
    pub fn eval(
        &mut self,
        world: &mut dyn World,
        owner: CharId,
        program: &[u8],
    ) -> Result<Value, VmError> {
        let result = self.exec(world, owner).eval(program);
        if result.is_err() {
            self.reset();
        }
        result
    }

    /// Evaluate one top-level expression inside a fresh frame of `locals`
    /// variables, returning the value and the final locals.
    pub fn eval_with_locals(
        &mut self,
        world: &mut dyn World,
        owner: CharId,
        program: &[u8],
        locals: usize,
    ) -> Result<(Value, Vec<Value>), VmError> {
        let frame = self.arena.alloc(locals);
        let saved = std::mem::replace(&mut self.frame, frame);
        let result = self.exec(world, owner).eval(program);
        let vars = self.arena.frame(frame).to_vec();
        self.frame = saved;
        self.arena.release(frame);
        match result {
            Ok(v) => Ok((v, vars)),
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }
}

/// A machine bound to a world and an owning entity
pub struct Exec<'a> {
    pub(crate) machine: &'a mut Machine,
    pub world: &'a mut dyn World,
    /// Entity whose state script is running
    pub owner: CharId,
    /// Subject controllers evaluate against. Reset to `owner` on block entry.
    pub working: CharId,
}

impl fmt::Debug for Exec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exec")
            .field("machine", &self.machine)
            .field("owner", &self.owner)
            .field("working", &self.working)
            .finish_non_exhaustive()
    }
}

impl Exec<'_> {
    pub fn config(&self) -> &VmConfig {
        &self.machine.config
    }

    pub fn report(&self, diagnostic: &Diagnostic) {
        self.machine.report(self.owner, diagnostic);
    }

    /// Read a local of the active frame
    pub fn local(&self, index: u8) -> Result<Value, VmError> {
        let frame = self.machine.frame;
        self.machine
            .arena
            .get(frame, index as usize)
            .ok_or(VmError::LocalOutOfRange {
                index: index as usize,
                len: frame.len(),
            })
    }

    pub fn set_local(&mut self, index: u8, value: Value) -> Result<(), VmError> {
        let frame = self.machine.frame;
        if self.machine.arena.set(frame, index as usize, value) {
            Ok(())
        } else {
            Err(VmError::LocalOutOfRange {
                index: index as usize,
                len: frame.len(),
            })
        }
    }

    pub fn eval_bool(&mut self, program: &[u8]) -> Result<bool, VmError> {
        Ok(self.eval(program)?.to_bool())
    }

    pub fn eval_int(&mut self, program: &[u8]) -> Result<i32, VmError> {
        Ok(self.eval(program)?.to_int())
    }
}
