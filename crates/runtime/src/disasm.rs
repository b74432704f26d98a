//! Disassembler and static verifier
//!
//! Decoding here walks the same opcode tables the interpreter dispatches
//! on, so anything that disassembles cleanly has known opcodes and complete
//! operands. [`verify`] additionally checks that every jump lands on an
//! instruction boundary (or the end) of its own program.

use crate::error::VmError;
use crate::opcode::{CharConst, ExOp, HitVar, Operand, SetOp, Space, decode_primary, ex_op};
use crate::program::Reader;
use std::collections::HashSet;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Offset of the opcode byte within its program
    pub at: usize,
    pub mnemonic: String,
    pub operand: Option<String>,
    /// Absolute target for jumps and redirections
    pub target: Option<usize>,
    /// Decoded body of a nested program
    pub nested: Vec<Instruction>,
    /// Byte length of the nested program
    pub nested_len: usize,
}

impl Instruction {
    fn new(at: usize, mnemonic: String) -> Self {
        Instruction {
            at,
            mnemonic,
            operand: None,
            target: None,
            nested: Vec::new(),
            nested_len: 0,
        }
    }
}

pub fn disassemble(code: &[u8]) -> Result<Vec<Instruction>, VmError> {
    let mut r = Reader::new(code);
    let mut out = Vec::new();
    while !r.at_end() {
        out.push(decode_one(&mut r)?);
    }
    Ok(out)
}

fn decode_one(r: &mut Reader<'_>) -> Result<Instruction, VmError> {
    let at = r.pos();
    let byte = r.u8()?;
    let primary = decode_primary(byte).ok_or(VmError::UnknownOpcode {
        space: Space::Primary,
        code: byte,
        at,
    })?;
    let mut ins = Instruction::new(at, primary.mnemonic().to_string());
    match primary.operand() {
        Operand::Escape(space) => decode_escaped(r, space, at, &mut ins)?,
        operand => decode_operand(r, operand, at, &mut ins)?,
    }
    Ok(ins)
}

fn decode_escaped(
    r: &mut Reader<'_>,
    space: Space,
    at: usize,
    ins: &mut Instruction,
) -> Result<(), VmError> {
    let code = r.u8()?;
    let unknown = VmError::UnknownOpcode { space, code, at };
    match space {
        Space::Const => {
            let c = CharConst::from_byte(code).ok_or(unknown)?;
            ins.mnemonic.push_str(c.mnemonic());
        }
        Space::Set => {
            let op = SetOp::from_byte(code).ok_or(unknown)?;
            ins.mnemonic.push_str(op.mnemonic());
            decode_operand(r, op.operand(), at, ins)?;
        }
        Space::Ex | Space::Ex2 => {
            let op = ex_op(space, code).ok_or(unknown)?;
            ins.mnemonic.push_str(op.mnemonic());
            if op == ExOp::GetHitVar {
                let field = r.u8()?;
                let hv = HitVar::from_byte(field).ok_or(VmError::UnknownOpcode {
                    space,
                    code: field,
                    at,
                })?;
                ins.operand = Some(hv.mnemonic().to_string());
            }
        }
        Space::Primary => return Err(unknown),
    }
    Ok(())
}

fn decode_operand(
    r: &mut Reader<'_>,
    operand: Operand,
    at: usize,
    ins: &mut Instruction,
) -> Result<(), VmError> {
    ins.operand = match operand {
        Operand::None | Operand::Escape(_) => None,
        Operand::I8 => Some(r.i8()?.to_string()),
        Operand::U8 => Some(r.u8()?.to_string()),
        Operand::I32 => Some(r.i32()?.to_string()),
        Operand::I64 => Some(r.i64()?.to_string()),
        Operand::F32 => Some(format!("{:?}", r.f32()?)),
        Operand::Jump8 | Operand::Jump32 => {
            let offset = if operand == Operand::Jump8 {
                r.i8()? as i64
            } else {
                r.i32()? as i64
            };
            let target = r.jump_target(offset, at)?;
            ins.target = Some(target);
            Some(format!("{:+} -> {:04x}", offset, target))
        }
        Operand::SubProgram => {
            let body = r.sub_program()?;
            ins.nested = disassemble(body)?;
            ins.nested_len = body.len();
            Some(format!("[{} bytes]", body.len()))
        }
    };
    Ok(())
}

/// Check that `code` decodes completely and every jump target is an
/// instruction boundary. Returns the number of instructions, nested ones
/// included.
pub fn verify(code: &[u8]) -> Result<usize, VmError> {
    let listing = disassemble(code)?;
    verify_listing(&listing, code.len())
}

fn verify_listing(listing: &[Instruction], len: usize) -> Result<usize, VmError> {
    let boundaries: HashSet<usize> = listing.iter().map(|i| i.at).chain([len]).collect();
    let mut count = listing.len();
    for ins in listing {
        if let Some(target) = ins.target.filter(|t| !boundaries.contains(t)) {
            return Err(VmError::BadJump {
                at: ins.at,
                target: target as i64,
                len,
            });
        }
        if !ins.nested.is_empty() {
            count += verify_listing(&ins.nested, ins.nested_len)?;
        }
    }
    Ok(count)
}

/// Human-readable listing, nested programs indented
pub fn render(listing: &[Instruction]) -> String {
    let mut out = String::new();
    render_into(&mut out, listing, 0);
    out
}

fn render_into(out: &mut String, listing: &[Instruction], depth: usize) {
    for ins in listing {
        let _ = write!(out, "{:indent$}{:04x}  {}", "", ins.at, ins.mnemonic, indent = depth * 2);
        if let Some(operand) = &ins.operand {
            let _ = write!(out, " {}", operand);
        }
        out.push('\n');
        render_into(out, &ins.nested, depth + 1);
    }
}
