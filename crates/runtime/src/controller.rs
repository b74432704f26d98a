//! Controllers: the statements of a state script
//!
//! Concrete game controllers live outside the VM and plug in through the
//! [`Controller`] trait. This module holds the trait, the control-flow
//! result, and the two loop-control statements.

use crate::error::VmError;
use crate::machine::Exec;
use crate::state::StateSlots;
use std::fmt;

/// How execution continues after a controller ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Proceed,
    /// The owner changed state; abandon the rest of the script
    ChangeState,
    Break,
    Continue,
}

pub trait Controller: fmt::Debug + Send + Sync {
    fn run(&self, ex: &mut Exec<'_>, slots: &mut StateSlots) -> Result<Flow, VmError>;
}

/// Run controllers in order until one asks to leave the list
pub fn run_all(
    controllers: &[Box<dyn Controller>],
    ex: &mut Exec<'_>,
    slots: &mut StateSlots,
) -> Result<Flow, VmError> {
    for c in controllers {
        match c.run(ex, slots)? {
            Flow::Proceed => {}
            flow => return Ok(flow),
        }
    }
    Ok(Flow::Proceed)
}

/// Leave the innermost loop
#[derive(Debug, Clone, Copy, Default)]
pub struct Break;

impl Controller for Break {
    fn run(&self, _ex: &mut Exec<'_>, _slots: &mut StateSlots) -> Result<Flow, VmError> {
        Ok(Flow::Break)
    }
}

/// Start the next pass of the innermost loop
#[derive(Debug, Clone, Copy, Default)]
pub struct Continue;

impl Controller for Continue {
    fn run(&self, _ex: &mut Exec<'_>, _slots: &mut StateSlots) -> Result<Flow, VmError> {
        Ok(Flow::Continue)
    }
}
