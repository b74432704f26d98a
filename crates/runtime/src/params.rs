//! Controller parameter protocol
//!
//! Every concrete controller receives its parameters as one flat buffer of
//! tagged records:
//!
//! ```text
//! record  := tag:u8 count:u8 program{count}
//! program := len:u32le bytes{len}
//! ```
//!
//! Decoding replays the records in order and hands each one to a callback
//! together with its programs. Record order is significant (a redirect
//! record changes the subject of the records after it), and the callback
//! can stop decoding by returning `false`.
//!
//! Controllers name their tags with a small enum implementing [`ParamTag`]
//! and decode through [`ParamBuffer::decode_typed`].

use crate::error::{AsmError, VmError};
use crate::program::Reader;

/// Typed tag set of one controller kind
pub trait ParamTag: Copy {
    fn from_tag(tag: u8) -> Option<Self>;
    fn tag(self) -> u8;
}

impl ParamTag for u8 {
    fn from_tag(tag: u8) -> Option<Self> {
        Some(tag)
    }

    fn tag(self) -> u8 {
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamBuffer {
    bytes: Vec<u8>,
}

impl ParamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already-encoded buffer; it is validated when decoded
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        ParamBuffer { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Append one record
    pub fn add<T: ParamTag>(&mut self, tag: T, programs: &[&[u8]]) -> Result<&mut Self, AsmError> {
        let count =
            u8::try_from(programs.len()).map_err(|_| AsmError::TooManyPrograms(programs.len()))?;
        self.bytes.push(tag.tag());
        self.bytes.push(count);
        for p in programs {
            let len = u32::try_from(p.len()).map_err(|_| AsmError::ProgramTooLarge(p.len()))?;
            self.bytes.extend_from_slice(&len.to_le_bytes());
            self.bytes.extend_from_slice(p);
        }
        Ok(self)
    }

    /// Replay every record through `f` until it returns `false`
    pub fn decode<'p, F>(&'p self, mut f: F) -> Result<(), VmError>
    where
        F: FnMut(u8, &[&'p [u8]]) -> Result<bool, VmError>,
    {
        let mut r = Reader::new(&self.bytes);
        let mut programs: Vec<&'p [u8]> = Vec::new();
        while !r.at_end() {
            let at = r.pos();
            let malformed = |_| VmError::MalformedParams { at };
            let tag = r.u8().map_err(malformed)?;
            let count = r.u8().map_err(malformed)?;
            programs.clear();
            for _ in 0..count {
                programs.push(r.sub_program().map_err(malformed)?);
            }
            if !f(tag, &programs)? {
                break;
            }
        }
        Ok(())
    }

    /// [`decode`](Self::decode) with tags checked against `T`
    pub fn decode_typed<'p, T, F>(&'p self, mut f: F) -> Result<(), VmError>
    where
        T: ParamTag,
        F: FnMut(T, &[&'p [u8]]) -> Result<bool, VmError>,
    {
        self.decode(|tag, programs| {
            let tag = T::from_tag(tag).ok_or(VmError::UnknownParamTag { tag })?;
            f(tag, programs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_replay_in_order() {
        let mut buf = ParamBuffer::new();
        buf.add(3u8, &[&[1, 2], &[]])
            .unwrap()
            .add(1u8, &[&[9]])
            .unwrap();

        let mut seen = Vec::new();
        buf.decode(|tag, programs| {
            seen.push((tag, programs.iter().map(|p| p.to_vec()).collect::<Vec<_>>()));
            Ok(true)
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![(3, vec![vec![1, 2], vec![]]), (1, vec![vec![9]])]
        );
    }

    #[test]
    fn test_callback_can_stop() {
        let mut buf = ParamBuffer::new();
        buf.add(0u8, &[]).unwrap().add(1u8, &[]).unwrap();
        let mut calls = 0;
        buf.decode(|_, _| {
            calls += 1;
            Ok(false)
        })
        .unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_truncated_buffer_is_fatal() {
        let mut buf = ParamBuffer::new();
        buf.add(0u8, &[&[1, 2, 3]]).unwrap();
        let mut bytes = buf.as_bytes().to_vec();
        bytes.pop();
        let buf = ParamBuffer::from_bytes(bytes);
        assert_eq!(
            buf.decode(|_, _| Ok(true)),
            Err(VmError::MalformedParams { at: 0 })
        );

        let buf = ParamBuffer::from_bytes(vec![7]);
        assert_eq!(
            buf.decode(|_, _| Ok(true)),
            Err(VmError::MalformedParams { at: 0 })
        );
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Tag {
        A,
    }

    impl ParamTag for Tag {
        fn from_tag(tag: u8) -> Option<Self> {
            (tag == 0).then_some(Tag::A)
        }
        fn tag(self) -> u8 {
            0
        }
    }

    #[test]
    fn test_unknown_tag() {
        let mut buf = ParamBuffer::new();
        buf.add(Tag::A, &[]).unwrap().add(4u8, &[]).unwrap();
        let mut seen = Vec::new();
        let result = buf.decode_typed(|tag: Tag, _| {
            seen.push(tag);
            Ok(true)
        });
        assert_eq!(result, Err(VmError::UnknownParamTag { tag: 4 }));
        assert_eq!(seen, vec![Tag::A]);
    }
}
