//! Runtime error types
//!
//! Two tiers of failure exist in the VM:
//!
//! - **Soft** script-data faults (division by zero, bad logarithm, failed
//!   redirection, runaway loop) never show up here. They become `SFalse`
//!   plus a [`Diagnostic`](crate::diagnostics::Diagnostic) and evaluation
//!   carries on.
//! - **Fatal** engine-invariant violations are [`VmError`]s. They mean the
//!   bytecode generator produced something impossible; the current entity's
//!   tick is abandoned and the machine is reset for the next entity.

use crate::opcode::Space;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    #[error("operand stack underflow at byte {at}")]
    StackUnderflow { at: usize },

    #[error("unknown opcode 0x{code:02x} in {space} space at byte {at}")]
    UnknownOpcode { space: Space, code: u8, at: usize },

    #[error("program truncated inside operand at byte {at}")]
    Truncated { at: usize },

    #[error("jump at byte {at} targets {target}, outside program of {len} bytes")]
    BadJump { at: usize, target: i64, len: usize },

    #[error("expression left {found} net values on the stack, expected {expected}")]
    UnbalancedStack { expected: usize, found: isize },

    #[error("local variable {index} is outside the active frame of {len} slots")]
    LocalOutOfRange { index: usize, len: usize },

    #[error("function `{name}` takes {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("function `{name}` was called before its body was defined")]
    UndefinedFunction { name: String },

    #[error("function `{name}`: {reason}")]
    InvalidFunction { name: String, reason: String },

    #[error("call depth limit of {max} exceeded")]
    CallDepthExceeded { max: u32 },

    #[error("{kind} slot {slot} does not exist in this state ({len} allocated)")]
    SlotOutOfRange {
        kind: &'static str,
        slot: usize,
        len: usize,
    },

    #[error("malformed controller parameters at byte {at}")]
    MalformedParams { at: usize },

    #[error("unknown controller parameter tag {tag}")]
    UnknownParamTag { tag: u8 },
}

/// Errors raised while assembling a program
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    #[error("label {0} was never bound")]
    UnboundLabel(usize),

    #[error("label {label} is {distance} bytes away, out of range for a 1-byte jump")]
    ShortJumpOutOfRange { label: usize, distance: i64 },

    #[error("`{0}` is not a jump opcode")]
    NotAJump(&'static str),

    #[error("nested program of {0} bytes does not fit a 4-byte length")]
    ProgramTooLarge(usize),

    #[error("`{0}` has no opcode encoding")]
    NoEncoding(&'static str),

    #[error("`{0}` takes an inline operand; use its dedicated emitter")]
    NeedsOperand(&'static str),

    #[error("parameter record holds {0} programs, at most 255 fit")]
    TooManyPrograms(usize),
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid sandbox: {0}")]
    Sandbox(String),
}
