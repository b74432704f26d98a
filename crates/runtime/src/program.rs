//! Compiled programs and the operand reader
//!
//! A [`Program`] is an immutable, cheaply clonable byte string. [`Reader`]
//! walks one with explicit little-endian operand decoding; every read is
//! bounds-checked and reports [`VmError::Truncated`] instead of panicking.

use crate::error::VmError;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Program(Arc<[u8]>);

impl Program {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Program(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Default for Program {
    fn default() -> Self {
        Program(Arc::from(&[][..]))
    }
}

impl Deref for Program {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Program {
    fn from(bytes: Vec<u8>) -> Self {
        Program(bytes.into())
    }
}

impl From<&[u8]> for Program {
    fn from(bytes: &[u8]) -> Self {
        Program(bytes.into())
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Program({})", hex::encode(&self.0))
    }
}

/// Cursor over a program's bytes
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Reader { code, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.code.len()
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], VmError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.code.len())
            .ok_or(VmError::Truncated { at: self.pos })?;
        let out = &self.code[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], VmError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, VmError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn i8(&mut self) -> Result<i8, VmError> {
        Ok(i8::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32, VmError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, VmError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64, VmError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> Result<f32, VmError> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    /// Length-prefixed nested program
    pub fn sub_program(&mut self) -> Result<&'a [u8], VmError> {
        let at = self.pos;
        let len = self.u32()? as usize;
        self.bytes(len).map_err(|_| VmError::Truncated { at })
    }

    /// Absolute target of a relative jump taken from the current position.
    ///
    /// `at` is the offset of the jump instruction, used for error reporting.
    pub fn jump_target(&self, offset: i64, at: usize) -> Result<usize, VmError> {
        let target = self.pos as i64 + offset;
        if target < 0 || target > self.code.len() as i64 {
            return Err(VmError::BadJump {
                at,
                target,
                len: self.code.len(),
            });
        }
        Ok(target as usize)
    }

    pub fn jump(&mut self, offset: i64, at: usize) -> Result<(), VmError> {
        self.pos = self.jump_target(offset, at)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_operands() {
        let mut code = vec![0xfe];
        code.extend_from_slice(&(-2i32).to_le_bytes());
        code.extend_from_slice(&1.5f32.to_le_bytes());
        let mut r = Reader::new(&code);
        assert_eq!(r.i8().unwrap(), -2);
        assert_eq!(r.i32().unwrap(), -2);
        assert_eq!(r.f32().unwrap(), 1.5);
        assert!(r.at_end());
    }

    #[test]
    fn test_truncated_read() {
        let code = [1u8, 2];
        let mut r = Reader::new(&code);
        r.u8().unwrap();
        assert_eq!(r.i32(), Err(VmError::Truncated { at: 1 }));
    }

    #[test]
    fn test_sub_program() {
        let mut code = 3u32.to_le_bytes().to_vec();
        code.extend_from_slice(&[7, 8, 9, 10]);
        let mut r = Reader::new(&code);
        assert_eq!(r.sub_program().unwrap(), &[7, 8, 9]);
        assert_eq!(r.pos(), 7);

        let short = 9u32.to_le_bytes();
        assert_eq!(
            Reader::new(&short).sub_program(),
            Err(VmError::Truncated { at: 0 })
        );
    }

    #[test]
    fn test_jump_bounds() {
        let code = [0u8; 4];
        let mut r = Reader::new(&code);
        r.bytes(2).unwrap();
        assert_eq!(r.jump_target(2, 0), Ok(4));
        assert_eq!(r.jump_target(-2, 0), Ok(0));
        assert!(matches!(
            r.jump_target(3, 1),
            Err(VmError::BadJump { at: 1, target: 5, len: 4 })
        ));
        assert!(r.jump(-3, 0).is_err());
    }

    #[test]
    fn test_program_derefs_to_bytes() {
        let p = Program::from(vec![1u8, 2, 3]);
        assert_eq!(&p[..], &[1, 2, 3]);
        assert_eq!(format!("{:?}", p), "Program(010203)");
        assert!(Program::default().is_empty());
    }
}
