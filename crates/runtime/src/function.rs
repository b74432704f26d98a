//! Script functions
//!
//! A [`Function`] is declared with its frame shape first and given a body
//! later, so bodies can call themselves or each other. Call sites hold an
//! `Arc` to the declaration.
//!
//! Frame layout: `[args..][rets..][other locals..]`. Arguments are moved off
//! the operand stack into the first `num_args` slots; on normal completion
//! the next `num_rets` slots are copied into the caller's designated locals.

use crate::controller::{Controller, Flow, run_all};
use crate::error::VmError;
use crate::machine::Exec;
use crate::program::Program;
use crate::state::StateSlots;
use statevm_core::Value;
use std::sync::{Arc, OnceLock};

#[derive(Debug)]
pub struct Function {
    name: String,
    num_vars: usize,
    num_args: usize,
    num_rets: usize,
    body: OnceLock<Vec<Box<dyn Controller>>>,
}

impl Function {
    pub fn declare(
        name: impl Into<String>,
        num_vars: usize,
        num_args: usize,
        num_rets: usize,
    ) -> Result<Arc<Function>, VmError> {
        let name = name.into();
        if num_args + num_rets > num_vars {
            return Err(VmError::InvalidFunction {
                reason: format!(
                    "{} arguments and {} returns do not fit {} locals",
                    num_args, num_rets, num_vars
                ),
                name,
            });
        }
        Ok(Arc::new(Function {
            name,
            num_vars,
            num_args,
            num_rets,
            body: OnceLock::new(),
        }))
    }

    /// Attach the body. A function is defined exactly once.
    pub fn define(&self, body: Vec<Box<dyn Controller>>) -> Result<(), VmError> {
        self.body.set(body).map_err(|_| VmError::InvalidFunction {
            name: self.name.clone(),
            reason: "body defined twice".to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_args(&self) -> usize {
        self.num_args
    }

    pub fn num_rets(&self) -> usize {
        self.num_rets
    }

    pub fn is_defined(&self) -> bool {
        self.body.get().is_some()
    }

    /// Invoke with the arguments already on top of the operand stack.
    ///
    /// Returns the body's flow and, unless the owner changed state, the
    /// return values.
    pub fn invoke(
        &self,
        ex: &mut Exec<'_>,
        slots: &mut StateSlots,
    ) -> Result<(Flow, Vec<Value>), VmError> {
        let body = self.body.get().ok_or_else(|| VmError::UndefinedFunction {
            name: self.name.clone(),
        })?;
        let max = ex.config().max_call_depth;
        if ex.machine.call_depth >= max {
            return Err(VmError::CallDepthExceeded { max });
        }

        let m = &mut *ex.machine;
        if m.stack.len() < self.num_args {
            return Err(VmError::ArityMismatch {
                name: self.name.clone(),
                expected: self.num_args,
                found: m.stack.len(),
            });
        }
        let frame = m.arena.alloc(self.num_vars);
        if let Some(args) = m.stack.drain_top(self.num_args) {
            for (slot, v) in m.arena.frame_mut(frame).iter_mut().zip(args) {
                *slot = v;
            }
        }
        let saved = std::mem::replace(&mut m.frame, frame);
        m.call_depth += 1;

        let result = run_all(body, ex, slots);

        let m = &mut *ex.machine;
        m.call_depth -= 1;
        m.frame = saved;
        let flow = match result {
            Ok(flow) => flow,
            Err(e) => {
                m.arena.release(frame);
                return Err(e);
            }
        };
        let rets = if flow == Flow::ChangeState {
            Vec::new()
        } else {
            m.arena.frame(frame)[self.num_args..self.num_args + self.num_rets].to_vec()
        };
        m.arena.release(frame);
        // break and continue stop at the function boundary
        let flow = if flow == Flow::ChangeState {
            Flow::ChangeState
        } else {
            Flow::Proceed
        };
        Ok((flow, rets))
    }
}

/// Controller calling a [`Function`]
#[derive(Debug)]
pub struct CallFunction {
    function: Arc<Function>,
    args: Option<Program>,
    rets: Vec<u8>,
}

impl CallFunction {
    /// `args` must push exactly the function's argument count; `rets` lists
    /// the caller locals receiving the return values (or is empty to
    /// discard them).
    pub fn new(
        function: Arc<Function>,
        args: Option<Program>,
        rets: Vec<u8>,
    ) -> Result<Self, VmError> {
        if !rets.is_empty() && rets.len() != function.num_rets {
            return Err(VmError::InvalidFunction {
                name: function.name.clone(),
                reason: format!(
                    "call site binds {} return values, function has {}",
                    rets.len(),
                    function.num_rets
                ),
            });
        }
        Ok(CallFunction {
            function,
            args,
            rets,
        })
    }
}

impl Controller for CallFunction {
    fn run(&self, ex: &mut Exec<'_>, slots: &mut StateSlots) -> Result<Flow, VmError> {
        let base = ex.machine.stack.len();
        let pushed = match &self.args {
            Some(p) => ex.push_values(p)?,
            None => 0,
        };
        if pushed != self.function.num_args {
            ex.machine.stack.truncate(base);
            return Err(VmError::ArityMismatch {
                name: self.function.name.clone(),
                expected: self.function.num_args,
                found: pushed,
            });
        }

        let (flow, values) = self.function.invoke(ex, slots)?;
        if flow == Flow::ChangeState {
            return Ok(flow);
        }
        for (&index, v) in self.rets.iter().zip(values) {
            ex.set_local(index, v)?;
        }
        Ok(Flow::Proceed)
    }
}
