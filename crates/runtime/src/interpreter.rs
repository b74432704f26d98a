//! Expression interpreter
//!
//! A single instruction-pointer loop over a program's bytes. Each iteration
//! decodes one primary byte through the opcode tables and consumes exactly
//! that opcode's operand.
//!
//! The current subject is a plain local of the loop: redirections rebind it
//! for the rest of the program being executed, and nested programs get their
//! own copy, so nothing has to be restored on exit.
//!
//! Every program and nested program must net exactly one value. Pops are
//! checked against the depth the program started at, so a program can never
//! consume values that belong to its caller.

use crate::diagnostics::Diagnostic;
use crate::error::VmError;
use crate::machine::Exec;
use crate::opcode::{
    CharConst, ExOp, HitVar, OpCode, Primary, SetOp, Space, VarKind, decode_primary, ex_op,
};
use crate::program::Reader;
use crate::world::CharId;
use statevm_core::{Fault, Value};

impl Exec<'_> {
    /// Evaluate a top-level expression against the working subject
    pub fn eval(&mut self, program: &[u8]) -> Result<Value, VmError> {
        let subject = self.working;
        self.run(program, subject, subject)
    }

    /// Execute `program` for its pushed values rather than a single result.
    ///
    /// Returns how many values it left on the stack. Used for call-site
    /// argument lists.
    pub fn push_values(&mut self, program: &[u8]) -> Result<usize, VmError> {
        let subject = self.working;
        self.exec_program(program, subject, subject)
    }

    fn run(&mut self, code: &[u8], subject: CharId, original: CharId) -> Result<Value, VmError> {
        let base = self.machine.stack.len();
        let net = self.exec_program(code, subject, original)?;
        if net != 1 {
            self.machine.stack.truncate(base);
            return Err(VmError::UnbalancedStack {
                expected: 1,
                found: net as isize,
            });
        }
        self.pop(base, code.len())
    }

    fn exec_program(
        &mut self,
        code: &[u8],
        mut subject: CharId,
        original: CharId,
    ) -> Result<usize, VmError> {
        let base = self.machine.stack.len();
        let mut r = Reader::new(code);
        while !r.at_end() {
            let at = r.pos();
            let byte = r.u8()?;
            let primary = decode_primary(byte).ok_or(VmError::UnknownOpcode {
                space: Space::Primary,
                code: byte,
                at,
            })?;
            match primary {
                Primary::Get(trigger) => {
                    let v = self.world.trigger(subject, trigger);
                    self.push(v);
                }
                Primary::Redirect(redirect) => {
                    let index = if redirect.takes_index() {
                        self.pop(base, at)?.to_int()
                    } else {
                        0
                    };
                    let skip = r.i32()? as i64;
                    match self.world.resolve(subject, redirect, index) {
                        Some(id) => subject = id,
                        None => {
                            self.push(Value::SFALSE);
                            self.report(&Diagnostic::RedirectFailed { redirect, index });
                            r.jump(skip, at)?;
                        }
                    }
                }
                Primary::Op(op) => self.op(op, &mut r, at, base, subject, original)?,
            }
        }
        // Pops never go below `base`, so this cannot underflow
        Ok(self.machine.stack.len() - base)
    }

    fn op(
        &mut self,
        op: OpCode,
        r: &mut Reader<'_>,
        at: usize,
        base: usize,
        subject: CharId,
        original: CharId,
    ) -> Result<(), VmError> {
        match op {
            OpCode::Int8 => {
                let v = r.i8()?;
                self.push(Value::int(v as i32));
            }
            OpCode::Int32 => {
                let v = r.i32()?;
                self.push(Value::int(v));
            }
            OpCode::Int64 => {
                let v = r.i64()?;
                self.push(Value::int64(v));
            }
            OpCode::Float => {
                let v = r.f32()?;
                self.push(Value::float(v));
            }
            OpCode::SFalse => self.push(Value::SFALSE),

            OpCode::Pop => {
                self.pop(base, at)?;
            }
            OpCode::Dup => {
                let v = self.peek(base, at)?;
                self.push(v);
            }
            OpCode::Swap => {
                let b = self.pop(base, at)?;
                let a = self.pop(base, at)?;
                self.push(b);
                self.push(a);
            }

            OpCode::Run => {
                let body = r.sub_program()?;
                let v = self.run(body, subject, original)?;
                self.push(v);
            }
            OpCode::RunOriginal => {
                let body = r.sub_program()?;
                let v = self.run(body, original, original)?;
                self.push(v);
            }

            OpCode::Jmp8 => {
                let offset = r.i8()? as i64;
                r.jump(offset, at)?;
            }
            OpCode::Jmp => {
                let offset = r.i32()? as i64;
                r.jump(offset, at)?;
            }
            OpCode::Jz8 | OpCode::Jnz8 | OpCode::Jsf8 => {
                let offset = r.i8()? as i64;
                if self.branch_taken(op, base, at)? {
                    r.jump(offset, at)?;
                }
            }
            OpCode::Jz | OpCode::Jnz | OpCode::Jsf => {
                let offset = r.i32()? as i64;
                if self.branch_taken(op, base, at)? {
                    r.jump(offset, at)?;
                }
            }

            OpCode::Eq => self.binary(base, at, Value::equal)?,
            OpCode::Ne => self.binary(base, at, Value::not_equal)?,
            OpCode::Gt => self.binary(base, at, Value::greater)?,
            OpCode::Ge => self.binary(base, at, Value::greater_eq)?,
            OpCode::Lt => self.binary(base, at, Value::less)?,
            OpCode::Le => self.binary(base, at, Value::less_eq)?,

            OpCode::Neg => self.unary(base, at, Value::neg)?,
            OpCode::BlNot => self.unary(base, at, Value::logical_not)?,
            OpCode::Not => self.unary(base, at, Value::bit_not)?,
            OpCode::Abs => self.unary(base, at, Value::abs)?,

            OpCode::BlAnd => self.binary(base, at, Value::logical_and)?,
            OpCode::BlOr => self.binary(base, at, Value::logical_or)?,
            OpCode::BlXor => self.binary(base, at, Value::logical_xor)?,
            OpCode::And => self.binary(base, at, Value::bit_and)?,
            OpCode::Or => self.binary(base, at, Value::bit_or)?,
            OpCode::Xor => self.binary(base, at, Value::bit_xor)?,

            OpCode::Add => self.binary(base, at, Value::add)?,
            OpCode::Sub => self.binary(base, at, Value::sub)?,
            OpCode::Mul => self.binary(base, at, Value::mul)?,
            OpCode::Div => self.fallible_binary(base, at, Value::div)?,
            OpCode::Mod => self.fallible_binary(base, at, Value::rem)?,
            OpCode::Pow => {
                let legacy = self.world.legacy_pow(self.owner);
                self.fallible_binary(base, at, |a, b| a.pow(b, legacy))?
            }

            OpCode::Exp => self.fallible_unary(base, at, Value::exp)?,
            OpCode::Ln => self.fallible_unary(base, at, Value::ln)?,
            OpCode::Log => self.fallible_binary(base, at, Value::log)?,
            OpCode::Sqrt => self.fallible_unary(base, at, Value::sqrt)?,
            OpCode::Sin => self.fallible_unary(base, at, Value::sin)?,
            OpCode::Cos => self.fallible_unary(base, at, Value::cos)?,
            OpCode::Tan => self.fallible_unary(base, at, Value::tan)?,
            OpCode::Asin => self.fallible_unary(base, at, Value::asin)?,
            OpCode::Acos => self.fallible_unary(base, at, Value::acos)?,
            OpCode::Atan => self.fallible_unary(base, at, Value::atan)?,
            OpCode::Floor => self.unary(base, at, Value::floor)?,
            OpCode::Ceil => self.unary(base, at, Value::ceil)?,
            OpCode::Min => self.binary(base, at, Value::min)?,
            OpCode::Max => self.binary(base, at, Value::max)?,
            OpCode::IfElse => {
                // ( cond then else -- v )
                let otherwise = self.pop(base, at)?;
                let then = self.pop(base, at)?;
                let cond = self.pop(base, at)?;
                self.push(if cond.to_bool() { then } else { otherwise });
            }
            OpCode::Random => {
                let v = self.world.random(subject);
                self.push(Value::int(v));
            }

            OpCode::Var => self.read_var(base, at, subject, VarKind::Int)?,
            OpCode::FVar => self.read_var(base, at, subject, VarKind::Float)?,
            OpCode::SysVar => self.read_var(base, at, subject, VarKind::SysInt)?,
            OpCode::SysFVar => self.read_var(base, at, subject, VarKind::SysFloat)?,
            OpCode::LocalVar => {
                let index = r.u8()?;
                let v = self.local(index)?;
                self.push(v);
            }

            OpCode::EscConst => {
                let code = r.u8()?;
                let constant = CharConst::from_byte(code).ok_or(VmError::UnknownOpcode {
                    space: Space::Const,
                    code,
                    at,
                })?;
                let v = self.world.constant(subject, constant);
                self.push(v);
            }
            OpCode::EscSet => self.assign(r, at, base, subject)?,
            OpCode::EscEx => self.extended(Space::Ex, r, at, base, subject)?,
            OpCode::EscEx2 => self.extended(Space::Ex2, r, at, base, subject)?,
        }
        Ok(())
    }

    fn assign(
        &mut self,
        r: &mut Reader<'_>,
        at: usize,
        base: usize,
        subject: CharId,
    ) -> Result<(), VmError> {
        let code = r.u8()?;
        let set = SetOp::from_byte(code).ok_or(VmError::UnknownOpcode {
            space: Space::Set,
            code,
            at,
        })?;
        let (kind, add) = set.target();
        match kind {
            Some(kind) => {
                // ( index value -- stored )
                let mut value = self.pop(base, at)?;
                let index = self.pop(base, at)?.to_int();
                if add {
                    let mut current = self.world.var(subject, kind, index);
                    current.add(value);
                    value = current;
                }
                let stored = self.world.set_var(subject, kind, index, value);
                self.push(stored);
            }
            None => {
                // ( value -- stored )
                let index = r.u8()?;
                let mut value = self.pop(base, at)?;
                if add {
                    let mut current = self.local(index)?;
                    current.add(value);
                    value = current;
                }
                self.set_local(index, value)?;
                self.push(value);
            }
        }
        Ok(())
    }

    fn extended(
        &mut self,
        space: Space,
        r: &mut Reader<'_>,
        at: usize,
        base: usize,
        subject: CharId,
    ) -> Result<(), VmError> {
        let code = r.u8()?;
        let op = ex_op(space, code).ok_or(VmError::UnknownOpcode { space, code, at })?;
        let v = match op {
            ExOp::Get(trigger) => self.world.trigger(subject, trigger),
            ExOp::GetIndexed(trigger) => {
                let arg = self.pop(base, at)?;
                self.world.indexed_trigger(subject, trigger, arg)
            }
            ExOp::GetHitVar => {
                let field = r.u8()?;
                let field = HitVar::from_byte(field).ok_or(VmError::UnknownOpcode {
                    space,
                    code: field,
                    at,
                })?;
                self.world.hit_var(subject, field)
            }
        };
        self.push(v);
        Ok(())
    }

    fn read_var(
        &mut self,
        base: usize,
        at: usize,
        subject: CharId,
        kind: VarKind,
    ) -> Result<(), VmError> {
        let index = self.pop(base, at)?.to_int();
        let v = self.world.var(subject, kind, index);
        self.push(v);
        Ok(())
    }

    fn branch_taken(&self, op: OpCode, base: usize, at: usize) -> Result<bool, VmError> {
        let top = self.peek(base, at)?;
        Ok(match op {
            OpCode::Jz8 | OpCode::Jz => !top.to_bool(),
            OpCode::Jnz8 | OpCode::Jnz => top.to_bool(),
            _ => top.is_sf(),
        })
    }

    // =========================================================================
    // Stack helpers
    // =========================================================================

    #[inline]
    fn push(&mut self, v: Value) {
        self.machine.stack.push(v);
    }

    #[inline]
    fn pop(&mut self, base: usize, at: usize) -> Result<Value, VmError> {
        if self.machine.stack.len() <= base {
            return Err(VmError::StackUnderflow { at });
        }
        self.machine.stack.pop().ok_or(VmError::StackUnderflow { at })
    }

    #[inline]
    fn peek(&self, base: usize, at: usize) -> Result<Value, VmError> {
        if self.machine.stack.len() <= base {
            return Err(VmError::StackUnderflow { at });
        }
        self.machine
            .stack
            .top()
            .copied()
            .ok_or(VmError::StackUnderflow { at })
    }

    fn top_mut(&mut self, base: usize, at: usize) -> Result<&mut Value, VmError> {
        if self.machine.stack.len() <= base {
            return Err(VmError::StackUnderflow { at });
        }
        self.machine
            .stack
            .top_mut()
            .ok_or(VmError::StackUnderflow { at })
    }

    fn unary(&mut self, base: usize, at: usize, f: impl FnOnce(&mut Value)) -> Result<(), VmError> {
        f(self.top_mut(base, at)?);
        Ok(())
    }

    fn binary(
        &mut self,
        base: usize,
        at: usize,
        f: impl FnOnce(&mut Value, Value),
    ) -> Result<(), VmError> {
        let rhs = self.pop(base, at)?;
        f(self.top_mut(base, at)?, rhs);
        Ok(())
    }

    fn fallible_unary(
        &mut self,
        base: usize,
        at: usize,
        f: impl FnOnce(&mut Value) -> Result<(), Fault>,
    ) -> Result<(), VmError> {
        if let Err(fault) = f(self.top_mut(base, at)?) {
            self.report(&Diagnostic::Arithmetic { fault, at });
        }
        Ok(())
    }

    fn fallible_binary(
        &mut self,
        base: usize,
        at: usize,
        f: impl FnOnce(&mut Value, Value) -> Result<(), Fault>,
    ) -> Result<(), VmError> {
        let rhs = self.pop(base, at)?;
        if let Err(fault) = f(self.top_mut(base, at)?, rhs) {
            self.report(&Diagnostic::Arithmetic { fault, at });
        }
        Ok(())
    }
}
