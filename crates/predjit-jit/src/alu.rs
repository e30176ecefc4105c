//! ALU primitives with null-sentinel semantics.
//!
//! Null is `i32::MIN` for the 32-bit integer family, `i64::MIN` for `i64`
//! and NaN for floats. Booleans are 32-bit `0`/`1`.

use cranelift_codegen::ir::condcodes::{FloatCC, IntCC};
use cranelift_codegen::ir::{types, InstBuilder, Type, Value};

use crate::asm::Asm;

pub const INT_NULL: i32 = i32::MIN;
pub const LONG_NULL: i64 = i64::MIN;

/// Equality tolerance for `f32`. `1e-7` would sit below the spacing of
/// `f32` values near 1.0.
pub const FLOAT_EPSILON: f32 = 1e-6;
pub const DOUBLE_EPSILON: f64 = 1e-10;

fn null_of(ty: Type) -> i64 {
    if ty == types::I64 {
        LONG_NULL
    } else {
        i64::from(INT_NULL)
    }
}

/// Widens an `icmp`/`fcmp` flag to a 32-bit boolean.
fn bool32(asm: &mut Asm<'_, '_>, flag: Value) -> Value {
    asm.ins().uextend(types::I32, flag)
}

fn is_null(asm: &mut Asm<'_, '_>, v: Value) -> Value {
    let ty = asm.value_type(v);
    let null = asm.iconst(ty, null_of(ty));
    asm.ins().icmp(IntCC::Equal, v, null)
}

fn not_null(asm: &mut Asm<'_, '_>, v: Value) -> Value {
    let ty = asm.value_type(v);
    let null = asm.iconst(ty, null_of(ty));
    asm.ins().icmp(IntCC::NotEqual, v, null)
}

fn either_null(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    let a_null = is_null(asm, a);
    let b_null = is_null(asm, b);
    asm.ins().bor(a_null, b_null)
}

/// Replaces `r` with the null sentinel when either operand is null.
fn propagate_null(asm: &mut Asm<'_, '_>, a: Value, b: Value, r: Value) -> Value {
    let ty = asm.value_type(r);
    let null = asm.iconst(ty, null_of(ty));
    let any = either_null(asm, a, b);
    asm.ins().select(any, null, r)
}

// ---------------------------------------------------------------------------
// Integers
// ---------------------------------------------------------------------------

/// Two's-complement negation. The sentinel negates to itself.
pub fn int_neg(asm: &mut Asm<'_, '_>, v: Value) -> Value {
    asm.ins().ineg(v)
}

pub fn int_add(asm: &mut Asm<'_, '_>, a: Value, b: Value, null_check: bool) -> Value {
    let r = asm.ins().iadd(a, b);
    if null_check { propagate_null(asm, a, b, r) } else { r }
}

pub fn int_sub(asm: &mut Asm<'_, '_>, a: Value, b: Value, null_check: bool) -> Value {
    let r = asm.ins().isub(a, b);
    if null_check { propagate_null(asm, a, b, r) } else { r }
}

pub fn int_mul(asm: &mut Asm<'_, '_>, a: Value, b: Value, null_check: bool) -> Value {
    let r = asm.ins().imul(a, b);
    if null_check { propagate_null(asm, a, b, r) } else { r }
}

/// Signed division that never traps.
///
/// A zero divisor and `MIN / -1` yield the sentinel regardless of
/// `null_check`; with `null_check` a null operand does too.
pub fn int_div(asm: &mut Asm<'_, '_>, a: Value, b: Value, null_check: bool) -> Value {
    let ty = asm.value_type(a);
    let zero = asm.iconst(ty, 0);
    let min = asm.iconst(ty, null_of(ty));
    let minus_one = asm.iconst(ty, -1);

    let by_zero = asm.ins().icmp(IntCC::Equal, b, zero);
    let a_min = asm.ins().icmp(IntCC::Equal, a, min);
    let b_minus_one = asm.ins().icmp(IntCC::Equal, b, minus_one);
    let overflow = asm.ins().band(a_min, b_minus_one);
    let mut bad = asm.ins().bor(by_zero, overflow);
    if null_check {
        let any = either_null(asm, a, b);
        bad = asm.ins().bor(bad, any);
    }

    let one = asm.iconst(ty, 1);
    let divisor = asm.ins().select(bad, one, b);
    let q = asm.ins().sdiv(a, divisor);
    asm.ins().select(bad, min, q)
}

/// Exact equality. Two nulls compare equal. Works for `i128` too.
pub fn int_eq(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    let flag = asm.ins().icmp(IntCC::Equal, a, b);
    bool32(asm, flag)
}

pub fn int_ne(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    let flag = asm.ins().icmp(IntCC::NotEqual, a, b);
    bool32(asm, flag)
}

/// Signed ordering. With `null_check` the result is false when either
/// operand is null.
pub fn int_cmp(asm: &mut Asm<'_, '_>, cc: IntCC, a: Value, b: Value, null_check: bool) -> Value {
    let mut flag = asm.ins().icmp(cc, a, b);
    if null_check {
        let a_ok = not_null(asm, a);
        let b_ok = not_null(asm, b);
        let both = asm.ins().band(a_ok, b_ok);
        flag = asm.ins().band(flag, both);
    }
    bool32(asm, flag)
}

pub fn int32_and(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    asm.ins().band(a, b)
}

pub fn int32_or(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    asm.ins().bor(a, b)
}

/// Logical not of a `0`/`1` boolean.
pub fn int32_not(asm: &mut Asm<'_, '_>, v: Value) -> Value {
    asm.ins().bxor_imm(v, 1)
}

// ---------------------------------------------------------------------------
// Floats
// ---------------------------------------------------------------------------

pub fn float_neg(asm: &mut Asm<'_, '_>, v: Value) -> Value {
    asm.ins().fneg(v)
}

pub fn float_add(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    asm.ins().fadd(a, b)
}

pub fn float_sub(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    asm.ins().fsub(a, b)
}

pub fn float_mul(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    asm.ins().fmul(a, b)
}

pub fn float_div(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    asm.ins().fdiv(a, b)
}

fn epsilon(asm: &mut Asm<'_, '_>, ty: Type) -> Value {
    if ty == types::F32 {
        asm.ins().f32const(FLOAT_EPSILON)
    } else {
        asm.ins().f64const(DOUBLE_EPSILON)
    }
}

fn float_eq_flag(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    let ty = asm.value_type(a);
    let exact = asm.ins().fcmp(FloatCC::Equal, a, b);
    let diff = asm.ins().fsub(a, b);
    let dist = asm.ins().fabs(diff);
    let eps = epsilon(asm, ty);
    let close = asm.ins().fcmp(FloatCC::LessThan, dist, eps);
    let a_nan = asm.ins().fcmp(FloatCC::Unordered, a, a);
    let b_nan = asm.ins().fcmp(FloatCC::Unordered, b, b);
    let both_nan = asm.ins().band(a_nan, b_nan);
    let near = asm.ins().bor(exact, close);
    asm.ins().bor(near, both_nan)
}

/// `|a - b| < eps`, exact equality, or both NaN.
pub fn float_eq_epsilon(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    let flag = float_eq_flag(asm, a, b);
    bool32(asm, flag)
}

pub fn float_ne_epsilon(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    let eq = float_eq_epsilon(asm, a, b);
    int32_not(asm, eq)
}

/// 1 when neither side is NaN.
pub fn float_ordered(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    let flag = asm.ins().fcmp(FloatCC::Ordered, a, b);
    bool32(asm, flag)
}

/// Native strict comparison; false when either side is NaN.
pub fn float_cmp(asm: &mut Asm<'_, '_>, cc: FloatCC, a: Value, b: Value) -> Value {
    let flag = asm.ins().fcmp(cc, a, b);
    bool32(asm, flag)
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn int32_to_int64(asm: &mut Asm<'_, '_>, v: Value, null_check: bool) -> Value {
    let wide = asm.ins().sextend(types::I64, v);
    if !null_check {
        return wide;
    }
    let null = is_null(asm, v);
    let long_null = asm.iconst(types::I64, LONG_NULL);
    asm.ins().select(null, long_null, wide)
}

fn int_to_float(asm: &mut Asm<'_, '_>, ty: Type, v: Value, null_check: bool) -> Value {
    let f = asm.ins().fcvt_from_sint(ty, v);
    if !null_check {
        return f;
    }
    let null = is_null(asm, v);
    let nan = if ty == types::F32 {
        asm.ins().f32const(f32::NAN)
    } else {
        asm.ins().f64const(f64::NAN)
    };
    asm.ins().select(null, nan, f)
}

pub fn int32_to_float(asm: &mut Asm<'_, '_>, v: Value, null_check: bool) -> Value {
    int_to_float(asm, types::F32, v, null_check)
}

pub fn int32_to_double(asm: &mut Asm<'_, '_>, v: Value, null_check: bool) -> Value {
    int_to_float(asm, types::F64, v, null_check)
}

pub fn int64_to_double(asm: &mut Asm<'_, '_>, v: Value, null_check: bool) -> Value {
    int_to_float(asm, types::F64, v, null_check)
}

pub fn float_to_double(asm: &mut Asm<'_, '_>, v: Value) -> Value {
    asm.ins().fpromote(types::F64, v)
}
