//! Variable arena
//!
//! Stack-allocated frames for script-local variables. State scripts and
//! functions each get a frame on entry and give it back on exit, strictly
//! LIFO, so the arena is just a bump pointer over a reusable buffer.
//!
//! ```text
//! slots: ┌────────────┬───────────────┬──────────────────┐
//!        │  frame 0   │   frame 1     │  spare capacity  │
//!        └────────────┴───────────────┴──────────────────┘
//!                                     ↑ top
//! ```
//!
//! Allocation is grow-or-reuse: a frame that fits below `slots.len()` is
//! carved out in place (its slots reset to `None`); otherwise the buffer
//! grows (doubling, like the tagged stack) and the live prefix is kept.
//! Deep or recursive call chains therefore stop allocating once the arena
//! has seen its high-water mark.

use crate::value::Value;

/// Default arena capacity (number of variable slots)
pub const DEFAULT_ARENA_CAPACITY: usize = 256;

/// Handle to one allocated frame.
///
/// Frames are plain `(base, len)` pairs; they stay valid until released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    base: usize,
    len: usize,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone)]
pub struct VarArena {
    slots: Vec<Value>,
    top: usize,
}

impl Default for VarArena {
    fn default() -> Self {
        Self::new()
    }
}

impl VarArena {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ARENA_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        VarArena {
            slots: vec![Value::NONE; capacity],
            top: 0,
        }
    }

    /// Number of slots currently handed out
    #[inline]
    pub fn depth(&self) -> usize {
        self.top
    }

    /// Size of the backing buffer
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Allocate a frame of `n` slots, all `None`.
    pub fn alloc(&mut self, n: usize) -> Frame {
        let end = self.top + n;
        if end > self.slots.len() {
            let new_len = (self.slots.len() * 2).max(end);
            self.slots.resize(new_len, Value::NONE);
        }
        self.slots[self.top..end].fill(Value::NONE);
        let frame = Frame {
            base: self.top,
            len: n,
        };
        self.top = end;
        frame
    }

    /// Release `frame` and everything allocated after it.
    pub fn release(&mut self, frame: Frame) {
        debug_assert!(
            frame.base + frame.len <= self.top,
            "release: frame {:?} is not live (top {})",
            frame,
            self.top
        );
        self.top = frame.base.min(self.top);
    }

    /// Release every frame.
    pub fn reset(&mut self) {
        self.top = 0;
    }

    pub fn get(&self, frame: Frame, index: usize) -> Option<Value> {
        self.frame(frame).get(index).copied()
    }

    /// Write one slot; returns `false` if `index` is outside the frame.
    pub fn set(&mut self, frame: Frame, index: usize, v: Value) -> bool {
        match self.frame_mut(frame).get_mut(index) {
            Some(slot) => {
                *slot = v;
                true
            }
            None => false,
        }
    }

    pub fn frame(&self, frame: Frame) -> &[Value] {
        &self.slots[frame.base..frame.base + frame.len]
    }

    pub fn frame_mut(&mut self, frame: Frame) -> &mut [Value] {
        &mut self.slots[frame.base..frame.base + frame.len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_lifo() {
        let mut arena = VarArena::with_capacity(8);
        let outer = arena.alloc(3);
        let inner = arena.alloc(2);
        assert_eq!(arena.depth(), 5);

        assert!(arena.set(inner, 1, Value::int(9)));
        assert!(!arena.set(inner, 2, Value::int(9)));
        assert_eq!(arena.get(inner, 1), Some(Value::int(9)));
        assert_eq!(arena.get(outer, 1), Some(Value::NONE));

        arena.release(inner);
        assert_eq!(arena.depth(), 3);
        arena.release(outer);
        assert_eq!(arena.depth(), 0);
    }

    #[test]
    fn test_reuse_resets_slots() {
        let mut arena = VarArena::with_capacity(4);
        let f = arena.alloc(4);
        arena.frame_mut(f).fill(Value::int(1));
        arena.release(f);

        let again = arena.alloc(4);
        assert_eq!(arena.capacity(), 4);
        assert!(arena.frame(again).iter().all(Value::is_none));
    }

    #[test]
    fn test_grow_keeps_prefix() {
        let mut arena = VarArena::with_capacity(2);
        let a = arena.alloc(2);
        arena.set(a, 0, Value::int(5));
        let b = arena.alloc(3);
        assert!(arena.capacity() >= 5);
        assert_eq!(arena.get(a, 0), Some(Value::int(5)));
        assert!(arena.frame(b).iter().all(Value::is_none));
    }

    #[test]
    fn test_empty_frame() {
        let mut arena = VarArena::with_capacity(0);
        let f = arena.alloc(0);
        assert!(f.is_empty());
        assert_eq!(arena.get(f, 0), None);
        arena.release(f);
        assert_eq!(arena.depth(), 0);
    }
}
