//! Value: the one type state scripts compute with
//!
//! Every script value is a tagged 64-bit float. The tag only decides how the
//! payload converts and which arithmetic path an operator takes:
//!
//! ```text
//! ┌──────────┬──────────────────────────────┐
//! │   kind   │   raw (f64)                  │
//! ├──────────┼──────────────────────────────┤
//! │ None     │ 0.0                          │
//! │ Float    │ the number                   │
//! │ Int      │ integral number              │
//! │ Bool     │ 0.0 / 1.0                    │
//! │ SFalse   │ NaN (never observable)       │
//! └──────────┴──────────────────────────────┘
//! ```
//!
//! `SFalse` means "could not evaluate". It converts to `0`/`false` under every
//! conversion, so a failed trigger can never make a script misbehave in a
//! way a zero would not.
//!
//! # Binary operator contract
//!
//! Operators mutate the left operand in place and take the right operand by
//! value, matching the interpreter's "pop right, combine into top" shape.
//! If either operand is `Float` the result is computed in floating point and
//! tagged `Float`; otherwise it is computed as a wrapping `i32` and tagged
//! `Int`. Comparisons follow the same promotion and produce `Bool`.
//!
//! Operators that can fail (division, modulo, roots, logarithms, powers)
//! return `Err(Fault)` after storing `SFalse` in the destination. The caller
//! decides how to report the fault; the value is already safe to keep using.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ValueType {
    #[default]
    None,
    Float,
    Int,
    Bool,
    SFalse,
}

/// Soft failure raised by a value operator.
///
/// The destination has already been overwritten with `SFalse` when one of
/// these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    DivisionByZero,
    ModuloByZero,
    /// A math function was given input outside its domain (name of the function)
    Domain(&'static str),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::DivisionByZero => write!(f, "division by zero"),
            Fault::ModuloByZero => write!(f, "modulo by zero"),
            Fault::Domain(op) => write!(f, "{}: argument out of domain", op),
        }
    }
}

/// A script value.
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct Value {
    kind: ValueType,
    raw: f64,
}

impl Default for Value {
    fn default() -> Self {
        Value::NONE
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && (self.kind == ValueType::SFalse || self.raw == other.raw)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ValueType::None => write!(f, "None"),
            ValueType::Float => write!(f, "Float({})", self.raw),
            ValueType::Int => write!(f, "Int({})", self.raw as i64),
            ValueType::Bool => write!(f, "Bool({})", self.raw != 0.0),
            ValueType::SFalse => write!(f, "SFalse"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ValueType::None => write!(f, "none"),
            ValueType::Float => write!(f, "{}", self.raw),
            ValueType::Int => write!(f, "{}", self.raw as i64),
            ValueType::Bool => write!(f, "{}", self.raw != 0.0),
            ValueType::SFalse => write!(f, "sfalse"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::bool(v)
    }
}

impl Value {
    pub const NONE: Value = Value {
        kind: ValueType::None,
        raw: 0.0,
    };

    pub const SFALSE: Value = Value {
        kind: ValueType::SFalse,
        raw: f64::NAN,
    };

    /// Float literal. NaN degrades to `SFalse`.
    pub fn float(v: f32) -> Value {
        Value::float64(v as f64)
    }

    /// Float from a double-precision result. NaN degrades to `SFalse`.
    pub fn float64(v: f64) -> Value {
        if v.is_nan() {
            Value::SFALSE
        } else {
            Value {
                kind: ValueType::Float,
                raw: v,
            }
        }
    }

    pub const fn int(v: i32) -> Value {
        Value {
            kind: ValueType::Int,
            raw: v as f64,
        }
    }

    /// 64-bit integer literal, tagged `Int`.
    ///
    /// Magnitudes above 2^53 lose precision in the float payload.
    pub fn int64(v: i64) -> Value {
        Value {
            kind: ValueType::Int,
            raw: v as f64,
        }
    }

    pub const fn bool(v: bool) -> Value {
        Value {
            kind: ValueType::Bool,
            raw: if v { 1.0 } else { 0.0 },
        }
    }

    #[inline]
    pub fn kind(&self) -> ValueType {
        self.kind
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.kind == ValueType::None
    }

    #[inline]
    pub fn is_sf(&self) -> bool {
        self.kind == ValueType::SFalse
    }

    #[inline]
    pub fn is_float(&self) -> bool {
        self.kind == ValueType::Float
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    pub fn to_f64(&self) -> f64 {
        if self.is_sf() { 0.0 } else { self.raw }
    }

    pub fn to_float(&self) -> f32 {
        self.to_f64() as f32
    }

    /// Truncating conversion; out-of-range payloads wrap through `i64`.
    pub fn to_int(&self) -> i32 {
        self.to_int64() as i32
    }

    pub fn to_int64(&self) -> i64 {
        if self.is_sf() { 0 } else { self.raw as i64 }
    }

    pub fn to_bool(&self) -> bool {
        !self.is_sf() && self.raw != 0.0
    }

    // =========================================================================
    // In-place setters
    // =========================================================================

    pub fn set_float(&mut self, v: f64) {
        *self = Value::float64(v);
    }

    pub fn set_int(&mut self, v: i32) {
        *self = Value::int(v);
    }

    pub fn set_bool(&mut self, v: bool) {
        *self = Value::bool(v);
    }

    pub fn set_sf(&mut self) {
        *self = Value::SFALSE;
    }

    /// Store a floating result, failing softly when it is NaN.
    fn set_checked(&mut self, v: f64, op: &'static str) -> Result<(), Fault> {
        self.set_float(v);
        if self.is_sf() {
            Err(Fault::Domain(op))
        } else {
            Ok(())
        }
    }

    #[inline]
    fn float_path(&self, rhs: &Value) -> bool {
        self.is_float() || rhs.is_float()
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    pub fn add(&mut self, rhs: Value) {
        if self.float_path(&rhs) {
            self.set_float(self.to_f64() + rhs.to_f64());
        } else {
            self.set_int(self.to_int().wrapping_add(rhs.to_int()));
        }
    }

    pub fn sub(&mut self, rhs: Value) {
        if self.float_path(&rhs) {
            self.set_float(self.to_f64() - rhs.to_f64());
        } else {
            self.set_int(self.to_int().wrapping_sub(rhs.to_int()));
        }
    }

    pub fn mul(&mut self, rhs: Value) {
        if self.float_path(&rhs) {
            self.set_float(self.to_f64() * rhs.to_f64());
        } else {
            self.set_int(self.to_int().wrapping_mul(rhs.to_int()));
        }
    }

    pub fn div(&mut self, rhs: Value) -> Result<(), Fault> {
        if self.float_path(&rhs) {
            if rhs.to_f64() == 0.0 {
                self.set_sf();
                return Err(Fault::DivisionByZero);
            }
            self.set_float(self.to_f64() / rhs.to_f64());
        } else {
            if rhs.to_int() == 0 {
                self.set_sf();
                return Err(Fault::DivisionByZero);
            }
            self.set_int(self.to_int().wrapping_div(rhs.to_int()));
        }
        Ok(())
    }

    pub fn rem(&mut self, rhs: Value) -> Result<(), Fault> {
        if self.float_path(&rhs) {
            if rhs.to_f64() == 0.0 {
                self.set_sf();
                return Err(Fault::ModuloByZero);
            }
            self.set_float(self.to_f64() % rhs.to_f64());
        } else {
            if rhs.to_int() == 0 {
                self.set_sf();
                return Err(Fault::ModuloByZero);
            }
            self.set_int(self.to_int().wrapping_rem(rhs.to_int()));
        }
        Ok(())
    }

    /// Exponentiation.
    ///
    /// Float operands and negative integer exponents take the floating path
    /// (`0 ** -1` is plain infinity). Non-negative integer exponents use a
    /// bit-scan / repeated-squaring loop. With `legacy_bit_order` every bit
    /// below the highest is visited from the top down, which reproduces the
    /// results older engines produced for exponents with three or more bits.
    pub fn pow(&mut self, rhs: Value, legacy_bit_order: bool) -> Result<(), Fault> {
        if self.float_path(&rhs) || rhs.to_f64() < 0.0 {
            return self.set_checked(self.to_f64().powf(rhs.to_f64()), "pow");
        }
        let base = self.to_int();
        let exp = rhs.to_int();
        let mut high: i32 = -1;
        while (exp as u32).checked_shr((high + 1) as u32).unwrap_or(0) != 0 {
            high += 1;
        }
        let mut acc: i32 = 1;
        let mut square = base;
        for bit in 0..=high {
            let shift = if bit == high || !legacy_bit_order {
                bit
            } else {
                (high - 1) - bit
            };
            if exp & (1 << shift) != 0 {
                acc = acc.wrapping_mul(square);
            }
            square = square.wrapping_mul(square);
        }
        self.set_int(acc);
        Ok(())
    }

    pub fn neg(&mut self) {
        if self.is_float() {
            self.set_float(-self.raw);
        } else {
            self.set_int(self.to_int().wrapping_neg());
        }
    }

    pub fn abs(&mut self) {
        if self.is_float() {
            self.set_float(self.raw.abs());
        } else {
            self.set_int(self.to_int().wrapping_abs());
        }
    }

    pub fn min(&mut self, rhs: Value) {
        if self.float_path(&rhs) {
            self.set_float(self.to_f64().min(rhs.to_f64()));
        } else {
            self.set_int(self.to_int().min(rhs.to_int()));
        }
    }

    pub fn max(&mut self, rhs: Value) {
        if self.float_path(&rhs) {
            self.set_float(self.to_f64().max(rhs.to_f64()));
        } else {
            self.set_int(self.to_int().max(rhs.to_int()));
        }
    }

    // =========================================================================
    // Comparison
    // =========================================================================

    fn compare(&mut self, rhs: Value, f: fn(f64, f64) -> bool, i: fn(i32, i32) -> bool) {
        let r = if self.float_path(&rhs) {
            f(self.to_f64(), rhs.to_f64())
        } else {
            i(self.to_int(), rhs.to_int())
        };
        self.set_bool(r);
    }

    pub fn equal(&mut self, rhs: Value) {
        self.compare(rhs, |a, b| a == b, |a, b| a == b);
    }

    pub fn not_equal(&mut self, rhs: Value) {
        self.compare(rhs, |a, b| a != b, |a, b| a != b);
    }

    pub fn less(&mut self, rhs: Value) {
        self.compare(rhs, |a, b| a < b, |a, b| a < b);
    }

    pub fn less_eq(&mut self, rhs: Value) {
        self.compare(rhs, |a, b| a <= b, |a, b| a <= b);
    }

    pub fn greater(&mut self, rhs: Value) {
        self.compare(rhs, |a, b| a > b, |a, b| a > b);
    }

    pub fn greater_eq(&mut self, rhs: Value) {
        self.compare(rhs, |a, b| a >= b, |a, b| a >= b);
    }

    // =========================================================================
    // Logical and bitwise
    // =========================================================================

    pub fn logical_and(&mut self, rhs: Value) {
        self.set_bool(self.to_bool() && rhs.to_bool());
    }

    pub fn logical_or(&mut self, rhs: Value) {
        self.set_bool(self.to_bool() || rhs.to_bool());
    }

    pub fn logical_xor(&mut self, rhs: Value) {
        self.set_bool(self.to_bool() != rhs.to_bool());
    }

    pub fn logical_not(&mut self) {
        self.set_bool(!self.to_bool());
    }

    pub fn bit_and(&mut self, rhs: Value) {
        self.set_int(self.to_int() & rhs.to_int());
    }

    pub fn bit_or(&mut self, rhs: Value) {
        self.set_int(self.to_int() | rhs.to_int());
    }

    pub fn bit_xor(&mut self, rhs: Value) {
        self.set_int(self.to_int() ^ rhs.to_int());
    }

    pub fn bit_not(&mut self) {
        self.set_int(!self.to_int());
    }

    // =========================================================================
    // Math functions
    // =========================================================================

    pub fn exp(&mut self) -> Result<(), Fault> {
        self.set_checked(self.to_f64().exp(), "exp")
    }

    pub fn ln(&mut self) -> Result<(), Fault> {
        let v = self.to_f64();
        if v <= 0.0 {
            self.set_sf();
            return Err(Fault::Domain("ln"));
        }
        self.set_checked(v.ln(), "ln")
    }

    /// `log(self, rhs)`: logarithm of `rhs` in base `self`.
    pub fn log(&mut self, rhs: Value) -> Result<(), Fault> {
        let (base, v) = (self.to_f64(), rhs.to_f64());
        if base <= 0.0 || v <= 0.0 {
            self.set_sf();
            return Err(Fault::Domain("log"));
        }
        self.set_checked(v.ln() / base.ln(), "log")
    }

    pub fn sqrt(&mut self) -> Result<(), Fault> {
        let v = self.to_f64();
        if v < 0.0 {
            self.set_sf();
            return Err(Fault::Domain("sqrt"));
        }
        self.set_checked(v.sqrt(), "sqrt")
    }

    pub fn sin(&mut self) -> Result<(), Fault> {
        self.set_checked(self.to_f64().sin(), "sin")
    }

    pub fn cos(&mut self) -> Result<(), Fault> {
        self.set_checked(self.to_f64().cos(), "cos")
    }

    pub fn tan(&mut self) -> Result<(), Fault> {
        self.set_checked(self.to_f64().tan(), "tan")
    }

    pub fn asin(&mut self) -> Result<(), Fault> {
        self.set_checked(self.to_f64().asin(), "asin")
    }

    pub fn acos(&mut self) -> Result<(), Fault> {
        self.set_checked(self.to_f64().acos(), "acos")
    }

    pub fn atan(&mut self) -> Result<(), Fault> {
        self.set_checked(self.to_f64().atan(), "atan")
    }

    /// Floats round down to `Int`; other kinds are left as they are.
    pub fn floor(&mut self) {
        if self.is_float() {
            self.set_int(self.raw.floor() as i32);
        }
    }

    /// Floats round up to `Int`; other kinds are left as they are.
    pub fn ceil(&mut self) {
        if self.is_float() {
            self.set_int(self.raw.ceil() as i32);
        }
    }
}
