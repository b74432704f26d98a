//! Control blocks
//!
//! A [`Block`] is a trigger-gated list of controllers. Blocks nest (a block
//! is itself a controller) and optionally loop.
//!
//! Order of checks on every visit:
//!
//! 1. the working subject is reset to the owner
//! 2. hit-pause gating ([`PauseGate`])
//! 3. persistence ([`Persistence`]): counts down and skips without looking
//!    at the trigger
//! 4. the trigger, then the children or the else-block
//!
//! Loops count their passes and give up after
//! [`VmConfig::max_loop_iterations`](crate::config::VmConfig) passes with
//! one diagnostic.

use crate::controller::{Controller, Flow, run_all};
use crate::diagnostics::Diagnostic;
use crate::error::VmError;
use crate::machine::Exec;
use crate::program::Program;
use crate::state::StateSlots;
use statevm_core::Value;

/// What a block does while its owner is frozen in hit pause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PauseGate {
    /// Do not run during hit pause
    #[default]
    Skip,
    /// Run regardless of hit pause
    Run,
    /// Run on every other hit-pause tick. The toggle lives in the given
    /// pause slot and resets to off once the pause ends.
    Toggle(usize),
}

/// Run at most once every `period` visits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persistence {
    pub slot: usize,
    pub period: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ForLoop {
    /// Initial counter (default 0)
    pub begin: Option<Program>,
    /// Inclusive bound (default 0)
    pub end: Option<Program>,
    /// Increment (default 1)
    pub step: Option<Program>,
    /// Local the counter is mirrored into
    pub var: Option<u8>,
}

#[derive(Debug, Clone)]
pub enum Loop {
    /// Re-evaluate the trigger before every pass
    While,
    For(ForLoop),
}

#[derive(Debug, Default)]
pub struct Block {
    trigger: Option<Program>,
    body: Vec<Box<dyn Controller>>,
    else_block: Option<Box<Block>>,
    persistence: Option<Persistence>,
    pause: PauseGate,
    looping: Option<Loop>,
}

impl Block {
    pub fn new(body: Vec<Box<dyn Controller>>) -> Self {
        Block {
            body,
            ..Block::default()
        }
    }

    pub fn when(mut self, trigger: Program) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Block run when the trigger is false on entry
    pub fn otherwise(mut self, block: Block) -> Self {
        self.else_block = Some(Box::new(block));
        self
    }

    pub fn persistent(mut self, slot: usize, period: i32) -> Self {
        self.persistence = Some(Persistence { slot, period });
        self
    }

    pub fn pause(mut self, gate: PauseGate) -> Self {
        self.pause = gate;
        self
    }

    pub fn while_loop(mut self) -> Self {
        self.looping = Some(Loop::While);
        self
    }

    pub fn for_loop(mut self, spec: ForLoop) -> Self {
        self.looping = Some(Loop::For(spec));
        self
    }

    fn pause_allows(&self, ex: &mut Exec<'_>, slots: &mut StateSlots) -> Result<bool, VmError> {
        let paused = ex.world.hit_pause(ex.owner);
        match self.pause {
            PauseGate::Skip => Ok(!paused),
            PauseGate::Run => Ok(true),
            PauseGate::Toggle(slot) => {
                let toggle = slots.toggle_mut(slot)?;
                if paused {
                    *toggle = !*toggle;
                    Ok(*toggle)
                } else {
                    *toggle = false;
                    Ok(true)
                }
            }
        }
    }

    fn test(&self, ex: &mut Exec<'_>) -> Result<bool, VmError> {
        ex.working = ex.owner;
        match &self.trigger {
            Some(t) => ex.eval_bool(t),
            None => Ok(true),
        }
    }

    fn run_else(&self, ex: &mut Exec<'_>, slots: &mut StateSlots) -> Result<Flow, VmError> {
        match &self.else_block {
            Some(block) => block.run(ex, slots),
            None => Ok(Flow::Proceed),
        }
    }

    /// Execute the block once its gates have passed. The bool reports
    /// whether the children were entered.
    fn execute(
        &self,
        ex: &mut Exec<'_>,
        slots: &mut StateSlots,
    ) -> Result<(Flow, bool), VmError> {
        match &self.looping {
            None => {
                if self.test(ex)? {
                    Ok((run_all(&self.body, ex, slots)?, true))
                } else {
                    Ok((self.run_else(ex, slots)?, false))
                }
            }
            Some(Loop::While) => self.run_while(ex, slots),
            Some(Loop::For(spec)) => self.run_for(spec, ex, slots),
        }
    }

    fn run_while(
        &self,
        ex: &mut Exec<'_>,
        slots: &mut StateSlots,
    ) -> Result<(Flow, bool), VmError> {
        if !self.test(ex)? {
            return Ok((self.run_else(ex, slots)?, false));
        }
        let max = ex.config().max_loop_iterations;
        let mut passes = 0u32;
        loop {
            if passes == max {
                ex.report(&Diagnostic::LoopLimit { max });
                break;
            }
            passes += 1;
            match run_all(&self.body, ex, slots)? {
                Flow::ChangeState => return Ok((Flow::ChangeState, true)),
                Flow::Break => break,
                Flow::Proceed | Flow::Continue => {}
            }
            if !self.test(ex)? {
                break;
            }
        }
        Ok((Flow::Proceed, true))
    }

    fn run_for(
        &self,
        spec: &ForLoop,
        ex: &mut Exec<'_>,
        slots: &mut StateSlots,
    ) -> Result<(Flow, bool), VmError> {
        if !self.test(ex)? {
            return Ok((self.run_else(ex, slots)?, false));
        }
        let bound = |ex: &mut Exec<'_>, p: &Option<Program>, default: i32| match p {
            Some(p) => {
                ex.working = ex.owner;
                ex.eval_int(p)
            }
            None => Ok(default),
        };
        let mut counter = bound(ex, &spec.begin, 0)?;
        let end = bound(ex, &spec.end, 0)?;
        let step = bound(ex, &spec.step, 1)?;
        let in_range = |c: i32| if step >= 0 { c <= end } else { c >= end };

        if let Some(var) = spec.var {
            ex.set_local(var, Value::int(counter))?;
        }
        let max = ex.config().max_loop_iterations;
        let mut passes = 0u32;
        while in_range(counter) {
            if passes == max {
                ex.report(&Diagnostic::LoopLimit { max });
                break;
            }
            passes += 1;
            match run_all(&self.body, ex, slots)? {
                Flow::ChangeState => return Ok((Flow::ChangeState, true)),
                Flow::Break => break,
                Flow::Proceed | Flow::Continue => {}
            }
            // The body may have moved the counter
            if let Some(var) = spec.var {
                counter = ex.local(var)?.to_int();
            }
            counter = counter.wrapping_add(step);
            if let Some(var) = spec.var {
                ex.set_local(var, Value::int(counter))?;
            }
        }
        Ok((Flow::Proceed, true))
    }
}

impl Controller for Block {
    fn run(&self, ex: &mut Exec<'_>, slots: &mut StateSlots) -> Result<Flow, VmError> {
        ex.working = ex.owner;
        if !self.pause_allows(ex, slots)? {
            return Ok(Flow::Proceed);
        }
        if let Some(p) = self.persistence {
            let counter = slots.persistent_mut(p.slot)?;
            if *counter > 0 {
                *counter -= 1;
            }
            if *counter > 0 {
                return Ok(Flow::Proceed);
            }
        }
        let (flow, entered) = self.execute(ex, slots)?;
        if let (Some(p), true) = (self.persistence, entered) {
            *slots.persistent_mut(p.slot)? = p.period;
        }
        Ok(flow)
    }
}
