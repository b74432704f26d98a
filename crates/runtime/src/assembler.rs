//! Program assembler
//!
//! Emits well-formed programs with label-based jump patching. The textual
//! script compiler lives outside this crate; the assembler is what tests,
//! the CLI and host tooling use to produce bytecode by hand.
//!
//! Emitters chain and never fail on the spot. The first problem is kept and
//! returned by [`Assembler::finish`].
//!
//! ```
//! use statevm_runtime::assembler::Assembler;
//! use statevm_runtime::opcode::OpCode;
//!
//! let mut asm = Assembler::new();
//! asm.int(2).int(3).op(OpCode::Add).int(5).op(OpCode::Eq);
//! let program = asm.finish().unwrap();
//! assert_eq!(program.len(), 8);
//! ```

use crate::error::AsmError;
use crate::opcode::{
    CharConst, ExOp, HitVar, IndexedTrigger, OpCode, Operand, REDIRECT_BASE, Redirect, SetOp,
    Trigger, VarKind, encode_ex, encode_trigger,
};
use crate::program::Program;

/// Jump target handle. Bind it once; reference it any number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug, Clone, Copy)]
struct Fixup {
    label: Label,
    /// Offset of the jump operand
    at: usize,
    short: bool,
}

#[derive(Debug, Default)]
pub struct Assembler {
    code: Vec<u8>,
    labels: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
    error: Option<AsmError>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current position
    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.code.len());
        self
    }

    fn fail(&mut self, err: AsmError) {
        self.error.get_or_insert(err);
    }

    fn emit_encoding(&mut self, encoding: (u8, Option<u8>)) {
        self.code.push(encoding.0);
        if let Some(secondary) = encoding.1 {
            self.code.push(secondary);
        }
    }

    /// Emit an opcode that takes no operand
    pub fn op(&mut self, op: OpCode) -> &mut Self {
        if op.operand() != Operand::None {
            self.fail(AsmError::NeedsOperand(op.mnemonic()));
            return self;
        }
        self.code.push(op as u8);
        self
    }

    /// Integer literal, in the narrowest encoding that holds it
    pub fn int(&mut self, v: i32) -> &mut Self {
        match i8::try_from(v) {
            Ok(b) => {
                self.code.push(OpCode::Int8 as u8);
                self.code.push(b as u8);
            }
            Err(_) => {
                self.code.push(OpCode::Int32 as u8);
                self.code.extend_from_slice(&v.to_le_bytes());
            }
        }
        self
    }

    pub fn int64(&mut self, v: i64) -> &mut Self {
        self.code.push(OpCode::Int64 as u8);
        self.code.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn float(&mut self, v: f32) -> &mut Self {
        self.code.push(OpCode::Float as u8);
        self.code.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn sfalse(&mut self) -> &mut Self {
        self.code.push(OpCode::SFalse as u8);
        self
    }

    /// Read a local variable of the active frame
    pub fn local(&mut self, index: u8) -> &mut Self {
        self.code.push(OpCode::LocalVar as u8);
        self.code.push(index);
        self
    }

    /// ( index -- v ) persistent variable read
    pub fn var(&mut self, kind: VarKind) -> &mut Self {
        let op = match kind {
            VarKind::Int => OpCode::Var,
            VarKind::Float => OpCode::FVar,
            VarKind::SysInt => OpCode::SysVar,
            VarKind::SysFloat => OpCode::SysFVar,
        };
        self.code.push(op as u8);
        self
    }

    /// Persistent-variable assignment
    pub fn set(&mut self, op: SetOp) -> &mut Self {
        if op.operand() != Operand::None {
            self.fail(AsmError::NeedsOperand(op.mnemonic()));
            return self;
        }
        self.code.push(OpCode::EscSet as u8);
        self.code.push(op as u8);
        self
    }

    /// ( v -- v ) store into a local
    pub fn set_local(&mut self, index: u8) -> &mut Self {
        self.code
            .extend_from_slice(&[OpCode::EscSet as u8, SetOp::Local as u8, index]);
        self
    }

    /// ( v -- local+v ) add into a local
    pub fn add_local(&mut self, index: u8) -> &mut Self {
        self.code
            .extend_from_slice(&[OpCode::EscSet as u8, SetOp::LocalAdd as u8, index]);
        self
    }

    pub fn trigger(&mut self, trigger: Trigger) -> &mut Self {
        match encode_trigger(trigger) {
            Some(enc) => self.emit_encoding(enc),
            None => self.fail(AsmError::NoEncoding(trigger.mnemonic())),
        }
        self
    }

    /// ( arg -- v )
    pub fn indexed(&mut self, trigger: IndexedTrigger) -> &mut Self {
        match encode_ex(ExOp::GetIndexed(trigger)) {
            Some(enc) => self.emit_encoding(enc),
            None => self.fail(AsmError::NoEncoding(trigger.mnemonic())),
        }
        self
    }

    pub fn constant(&mut self, constant: CharConst) -> &mut Self {
        self.code.push(OpCode::EscConst as u8);
        self.code.push(constant as u8);
        self
    }

    pub fn hit_var(&mut self, field: HitVar) -> &mut Self {
        match encode_ex(ExOp::GetHitVar) {
            Some(enc) => {
                self.emit_encoding(enc);
                self.code.push(field as u8);
            }
            None => self.fail(AsmError::NoEncoding("gethitvar")),
        }
        self
    }

    /// Redirection whose failure path skips to `on_fail`
    pub fn redirect(&mut self, redirect: Redirect, on_fail: Label) -> &mut Self {
        self.code.push(REDIRECT_BASE + redirect as u8);
        self.fixup(on_fail, false);
        self
    }

    /// Jump-family opcode to `target`
    pub fn jump(&mut self, op: OpCode, target: Label) -> &mut Self {
        let short = match op.operand() {
            Operand::Jump8 => true,
            Operand::Jump32 => false,
            _ => {
                self.fail(AsmError::NotAJump(op.mnemonic()));
                return self;
            }
        };
        self.code.push(op as u8);
        self.fixup(target, short);
        self
    }

    fn fixup(&mut self, label: Label, short: bool) {
        let at = self.code.len();
        self.fixups.push(Fixup { label, at, short });
        let width = if short { 1 } else { 4 };
        self.code.extend(std::iter::repeat_n(0, width));
    }

    /// Evaluate a nested program against the current subject
    pub fn run(&mut self, program: &[u8]) -> &mut Self {
        self.nested(OpCode::Run, program)
    }

    /// Evaluate a nested program against the original subject
    pub fn run_original(&mut self, program: &[u8]) -> &mut Self {
        self.nested(OpCode::RunOriginal, program)
    }

    fn nested(&mut self, op: OpCode, program: &[u8]) -> &mut Self {
        let Ok(len) = u32::try_from(program.len()) else {
            self.fail(AsmError::ProgramTooLarge(program.len()));
            return self;
        };
        self.code.push(op as u8);
        self.code.extend_from_slice(&len.to_le_bytes());
        self.code.extend_from_slice(program);
        self
    }

    /// Append raw bytes
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    /// Patch every jump and return the program
    pub fn finish(mut self) -> Result<Program, AsmError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        for fixup in &self.fixups {
            let target = self.labels[fixup.label.0].ok_or(AsmError::UnboundLabel(fixup.label.0))?;
            let width = if fixup.short { 1 } else { 4 };
            let distance = target as i64 - (fixup.at + width) as i64;
            if fixup.short {
                let offset = i8::try_from(distance).map_err(|_| AsmError::ShortJumpOutOfRange {
                    label: fixup.label.0,
                    distance,
                })?;
                self.code[fixup.at] = offset as u8;
            } else {
                let offset =
                    i32::try_from(distance).map_err(|_| AsmError::ProgramTooLarge(self.code.len()))?;
                self.code[fixup.at..fixup.at + 4].copy_from_slice(&offset.to_le_bytes());
            }
        }
        Ok(Program::from(self.code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_picks_narrowest_encoding() {
        let mut asm = Assembler::new();
        asm.int(-128).int(128);
        let p = asm.finish().unwrap();
        assert_eq!(p[0], OpCode::Int8 as u8);
        assert_eq!(p[1], 0x80);
        assert_eq!(p[2], OpCode::Int32 as u8);
        assert_eq!(&p[3..7], &128i32.to_le_bytes());
    }

    #[test]
    fn test_forward_and_backward_jumps() {
        let mut asm = Assembler::new();
        let top = asm.label();
        let end = asm.label();
        asm.bind(top).int(1).jump(OpCode::Jz8, end).jump(OpCode::Jmp, top).bind(end);
        let p = asm.finish().unwrap();
        // int8 1 | jz8 +5 | jmp -9
        assert_eq!(p[3], 5);
        assert_eq!(&p[5..9], &(-9i32).to_le_bytes());
    }

    #[test]
    fn test_redirect_skip_is_patched() {
        let mut asm = Assembler::new();
        let skip = asm.label();
        asm.redirect(Redirect::Parent, skip)
            .trigger(Trigger::Time)
            .bind(skip);
        let p = asm.finish().unwrap();
        assert_eq!(p[0], REDIRECT_BASE + 1);
        assert_eq!(&p[1..5], &1i32.to_le_bytes());
    }

    #[test]
    fn test_errors() {
        let mut asm = Assembler::new();
        let l = asm.label();
        asm.jump(OpCode::Jmp8, l);
        assert_eq!(asm.finish().unwrap_err(), AsmError::UnboundLabel(0));

        let mut asm = Assembler::new();
        asm.jump(OpCode::Add, Label(0));
        assert_eq!(asm.finish().unwrap_err(), AsmError::NotAJump("add"));

        let mut asm = Assembler::new();
        asm.op(OpCode::Int32);
        assert_eq!(asm.finish().unwrap_err(), AsmError::NeedsOperand("int"));

        let mut asm = Assembler::new();
        let far = asm.label();
        asm.jump(OpCode::Jmp8, far);
        for _ in 0..100 {
            asm.int(1000);
        }
        asm.bind(far);
        assert!(matches!(
            asm.finish(),
            Err(AsmError::ShortJumpOutOfRange { label: 0, .. })
        ));
    }

    #[test]
    fn test_nested_program_is_length_prefixed() {
        let mut inner = Assembler::new();
        inner.int(4);
        let inner = inner.finish().unwrap();

        let mut asm = Assembler::new();
        asm.run(&inner);
        let p = asm.finish().unwrap();
        assert_eq!(p[0], OpCode::Run as u8);
        assert_eq!(&p[1..5], &2u32.to_le_bytes());
        assert_eq!(&p[5..], &inner[..]);
    }
}
