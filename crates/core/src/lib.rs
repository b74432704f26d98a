//! statevm core: the data layer shared by every part of the interpreter
//!
//! Key design principles:
//! - Value: what scripts compute with (Float, Int, Bool, and the SFalse sentinel)
//! - OperandStack: LIFO scratch space for expression evaluation
//! - VarArena: LIFO frames of script-local variables
//!
//! Nothing in this crate knows about opcodes or characters; the runtime crate
//! builds the interpreter on top of these types.
//!
//! # Modules
//!
//! - `value`: tagged numeric value and its operators
//! - `stack`: operand stack
//! - `arena`: variable arena and frame handles

pub mod arena;
pub mod stack;
pub mod value;

pub use arena::{DEFAULT_ARENA_CAPACITY, Frame, VarArena};
pub use stack::{DEFAULT_STACK_CAPACITY, OperandStack};
pub use value::{Fault, Value, ValueType};
