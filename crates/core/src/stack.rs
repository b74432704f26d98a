//! Operand stack
//!
//! LIFO scratch space for expression evaluation. One stack lives in each
//! interpreter context and is reused across every expression of every tick,
//! so it never shrinks its allocation.
//!
//! ```text
//! ┌──────┬──────┬──────┬──────┬─────────┐
//! │  v0  │  v1  │  v2  │  v3  │  ...    │
//! └──────┴──────┴──────┴──────┴─────────┘
//!                             ↑ top
//! ```
//!
//! Underflow is reported as `None` rather than a panic: it can only happen
//! with malformed bytecode, and the interpreter turns it into a fatal error
//! for the current entity instead of taking the process down.

use crate::value::Value;

/// Default operand stack capacity (number of values)
pub const DEFAULT_STACK_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct OperandStack {
    values: Vec<Value>,
}

impl OperandStack {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STACK_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        OperandStack {
            values: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn push(&mut self, v: Value) {
        self.values.push(v);
    }

    #[inline]
    pub fn pop(&mut self) -> Option<Value> {
        self.values.pop()
    }

    #[inline]
    pub fn top(&self) -> Option<&Value> {
        self.values.last()
    }

    #[inline]
    pub fn top_mut(&mut self) -> Option<&mut Value> {
        self.values.last_mut()
    }

    /// Append `n` `None` slots and return them.
    pub fn alloc(&mut self, n: usize) -> &mut [Value] {
        let start = self.values.len();
        self.values.resize(start + n, Value::NONE);
        &mut self.values[start..]
    }

    /// Remove the top `n` values in push order.
    ///
    /// Returns `None` (and leaves the stack untouched) if fewer than `n`
    /// values are present.
    pub fn drain_top(&mut self, n: usize) -> Option<std::vec::Drain<'_, Value>> {
        let len = self.values.len();
        if n > len {
            return None;
        }
        Some(self.values.drain(len - n..))
    }

    /// Drop everything above `depth`.
    pub fn truncate(&mut self, depth: usize) {
        self.values.truncate(depth);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_top() {
        let mut stack = OperandStack::new();
        assert!(stack.is_empty());
        assert!(stack.pop().is_none());
        assert!(stack.top().is_none());

        stack.push(Value::int(1));
        stack.push(Value::int(2));
        assert_eq!(stack.top(), Some(&Value::int(2)));
        assert_eq!(stack.pop(), Some(Value::int(2)));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_top_mut_in_place() {
        let mut stack = OperandStack::new();
        stack.push(Value::int(4));
        let rhs = Value::int(5);
        stack.top_mut().unwrap().add(rhs);
        assert_eq!(stack.pop(), Some(Value::int(9)));
    }

    #[test]
    fn test_alloc_returns_none_slots() {
        let mut stack = OperandStack::new();
        stack.push(Value::int(7));
        let slots = stack.alloc(3);
        assert_eq!(slots.len(), 3);
        assert!(slots.iter().all(Value::is_none));
        slots[0] = Value::int(1);
        assert_eq!(stack.len(), 4);
        assert_eq!(stack.as_slice()[1], Value::int(1));
    }

    #[test]
    fn test_drain_top_keeps_order() {
        let mut stack = OperandStack::new();
        for i in 0..4 {
            stack.push(Value::int(i));
        }
        let taken: Vec<Value> = stack.drain_top(2).unwrap().collect();
        assert_eq!(taken, vec![Value::int(2), Value::int(3)]);
        assert_eq!(stack.len(), 2);
        assert!(stack.drain_top(3).is_none());
        assert_eq!(stack.len(), 2);
    }
}
