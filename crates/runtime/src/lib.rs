//! statevm runtime: bytecode interpreter for fighting-game state scripts
//!
//! Key design principles:
//! - Program: immutable, shareable bytecode for one expression
//! - Machine: operand stack, variable arena and limits, reused across entities
//! - World: everything about characters, supplied by the host
//! - Controller: a statement; blocks, functions and builtins all implement it
//!
//! Failures come in two tiers. Script-data faults become `SFalse` plus a
//! [`Diagnostic`]; engine-invariant violations are a [`VmError`] and reset
//! the machine.
//!
//! # Modules
//!
//! - `opcode`, `program`, `assembler`, `disasm`: the bytecode format
//! - `machine`, `interpreter`: expression evaluation
//! - `controller`, `block`, `function`, `state`: statement execution
//! - `params`, `builtin`: the controller parameter protocol
//! - `world`, `sandbox`: the host collaborator and an in-memory one
//! - `config`, `diagnostics`, `error`: ambient concerns

pub mod assembler;
pub mod block;
pub mod builtin;
pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod disasm;
pub mod error;
pub mod function;
pub mod interpreter;
pub mod machine;
pub mod opcode;
pub mod params;
pub mod program;
pub mod sandbox;
pub mod state;
pub mod world;

pub use statevm_core::{Fault, Value, ValueType};

// Bytecode
pub use assembler::{Assembler, Label};
pub use disasm::{Instruction, disassemble, render, verify};
pub use opcode::{
    CharConst, HitVar, IndexedTrigger, OpCode, Redirect, SetOp, Trigger, VarKind,
};
pub use program::Program;

// Execution
pub use block::{Block, ForLoop, Loop, PauseGate};
pub use controller::{Controller, Flow};
pub use function::{CallFunction, Function};
pub use machine::{Exec, Machine};
pub use state::{StateScript, StateSlots};

// Controllers and their parameters
pub use builtin::{ChangeState, ChangeStateTag, Null, VarSet, VarSetTag};
pub use params::{ParamBuffer, ParamTag};

// Host side
pub use config::VmConfig;
pub use diagnostics::{Diagnostic, DiagnosticSink, RecordingSink, TracingSink};
pub use error::{AsmError, ConfigError, VmError};
pub use sandbox::{CharSpec, Sandbox, SandboxSpec};
pub use world::{CharId, World};
