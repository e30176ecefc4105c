//! Operator generators.
//!
//! Operands arrive materialized and promoted to a common rank. Each generator
//! dispatches on the operand type to a width-specific ALU primitive and
//! reports unsupported combinations as errors.

use cranelift_codegen::ir::condcodes::{FloatCC, IntCC};
use cranelift_codegen::ir::Value;
use predjit_common::{JitError, JitResult};
use predjit_types::{DataType, Opcode, Rank, ValueKind};

use crate::alu;
use crate::asm::Asm;
use crate::value::CompileValue;

fn unsupported(op: Opcode, dtype: DataType) -> JitError {
    JitError::UnsupportedOperation {
        op: op.to_string(),
        dtype: dtype.to_string(),
    }
}

fn is_int(dtype: DataType) -> bool {
    matches!(dtype.rank(), Some(Rank::Int32 | Rank::Int64))
}

fn is_int32(dtype: DataType) -> bool {
    dtype.rank() == Some(Rank::Int32)
}

/// Boolean result of a comparison or logic operator.
fn boolean(v: Value, lhs: &CompileValue, rhs: &CompileValue) -> CompileValue {
    CompileValue::reg(v, DataType::I32, ValueKind::dominant(lhs.kind, rhs.kind))
}

/// Arithmetic result type. The 32-bit family computes in 32-bit registers.
fn arith_type(lhs: &CompileValue) -> DataType {
    if is_int32(lhs.dtype) {
        DataType::I32
    } else {
        lhs.dtype
    }
}

pub fn neg(asm: &mut Asm<'_, '_>, v: CompileValue) -> JitResult<CompileValue> {
    let reg = v.as_reg()?;
    let out = match v.dtype {
        DataType::I8 | DataType::I16 | DataType::I32 | DataType::I64 => alu::int_neg(asm, reg),
        DataType::F32 | DataType::F64 => alu::float_neg(asm, reg),
        other => return Err(unsupported(Opcode::Neg, other)),
    };
    Ok(CompileValue::reg(out, v.dtype, v.kind))
}

pub fn bin_not(asm: &mut Asm<'_, '_>, v: CompileValue) -> JitResult<CompileValue> {
    if !is_int32(v.dtype) {
        return Err(unsupported(Opcode::Not, v.dtype));
    }
    let out = alu::int32_not(asm, v.as_reg()?);
    Ok(CompileValue::reg(out, v.dtype, v.kind))
}

fn logic(
    asm: &mut Asm<'_, '_>,
    op: Opcode,
    lhs: CompileValue,
    rhs: CompileValue,
) -> JitResult<CompileValue> {
    if !is_int32(lhs.dtype) {
        return Err(unsupported(op, lhs.dtype));
    }
    if !is_int32(rhs.dtype) {
        return Err(unsupported(op, rhs.dtype));
    }
    let (a, b) = (lhs.as_reg()?, rhs.as_reg()?);
    let out = match op {
        Opcode::And => alu::int32_and(asm, a, b),
        _ => alu::int32_or(asm, a, b),
    };
    Ok(CompileValue::reg(out, lhs.dtype, ValueKind::dominant(lhs.kind, rhs.kind)))
}

pub fn bin_and(asm: &mut Asm<'_, '_>, lhs: CompileValue, rhs: CompileValue) -> JitResult<CompileValue> {
    logic(asm, Opcode::And, lhs, rhs)
}

pub fn bin_or(asm: &mut Asm<'_, '_>, lhs: CompileValue, rhs: CompileValue) -> JitResult<CompileValue> {
    logic(asm, Opcode::Or, lhs, rhs)
}

/// Equality holds for every type: exact for integers, `i128` and headers,
/// epsilon-tolerant for floats.
pub fn cmp_eq(asm: &mut Asm<'_, '_>, lhs: CompileValue, rhs: CompileValue) -> JitResult<CompileValue> {
    let (a, b) = (lhs.as_reg()?, rhs.as_reg()?);
    let out = if lhs.dtype.is_float() {
        alu::float_eq_epsilon(asm, a, b)
    } else {
        alu::int_eq(asm, a, b)
    };
    Ok(boolean(out, &lhs, &rhs))
}

pub fn cmp_ne(asm: &mut Asm<'_, '_>, lhs: CompileValue, rhs: CompileValue) -> JitResult<CompileValue> {
    let (a, b) = (lhs.as_reg()?, rhs.as_reg()?);
    let out = if lhs.dtype.is_float() {
        alu::float_ne_epsilon(asm, a, b)
    } else {
        alu::int_ne(asm, a, b)
    };
    Ok(boolean(out, &lhs, &rhs))
}

// Float ordering composes epsilon equality with a native strict comparison
// so that values within epsilon are equal, `>=` and `<=`, and neither `>`
// nor `<`.

fn float_gt(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    let ne = alu::float_ne_epsilon(asm, a, b);
    let gt = alu::float_cmp(asm, FloatCC::GreaterThan, a, b);
    alu::int32_and(asm, ne, gt)
}

fn float_lt(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    let ne = alu::float_ne_epsilon(asm, a, b);
    let lt = alu::float_cmp(asm, FloatCC::LessThan, a, b);
    alu::int32_and(asm, ne, lt)
}

fn float_ge(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    let eq = alu::float_eq_epsilon(asm, a, b);
    let gt = alu::float_cmp(asm, FloatCC::GreaterThan, a, b);
    alu::int32_or(asm, eq, gt)
}

fn float_le(asm: &mut Asm<'_, '_>, a: Value, b: Value) -> Value {
    let eq = alu::float_eq_epsilon(asm, a, b);
    let lt = alu::float_cmp(asm, FloatCC::LessThan, a, b);
    alu::int32_or(asm, eq, lt)
}

fn ordering(
    asm: &mut Asm<'_, '_>,
    op: Opcode,
    lhs: CompileValue,
    rhs: CompileValue,
    null_check: bool,
) -> JitResult<CompileValue> {
    let (a, b) = (lhs.as_reg()?, rhs.as_reg()?);
    let out = if is_int(lhs.dtype) {
        let cc = match op {
            Opcode::Gt => IntCC::SignedGreaterThan,
            Opcode::Ge => IntCC::SignedGreaterThanOrEqual,
            Opcode::Lt => IntCC::SignedLessThan,
            _ => IntCC::SignedLessThanOrEqual,
        };
        alu::int_cmp(asm, cc, a, b, null_check)
    } else if lhs.dtype.is_float() {
        let flag = match op {
            Opcode::Gt => float_gt(asm, a, b),
            Opcode::Ge => float_ge(asm, a, b),
            Opcode::Lt => float_lt(asm, a, b),
            _ => float_le(asm, a, b),
        };
        // Epsilon equality holds for two NaNs, so `>=` and `<=` need the gate.
        if null_check {
            let ordered = alu::float_ordered(asm, a, b);
            alu::int32_and(asm, flag, ordered)
        } else {
            flag
        }
    } else {
        return Err(unsupported(op, lhs.dtype));
    };
    Ok(boolean(out, &lhs, &rhs))
}

pub fn cmp_gt(
    asm: &mut Asm<'_, '_>,
    lhs: CompileValue,
    rhs: CompileValue,
    null_check: bool,
) -> JitResult<CompileValue> {
    ordering(asm, Opcode::Gt, lhs, rhs, null_check)
}

pub fn cmp_ge(
    asm: &mut Asm<'_, '_>,
    lhs: CompileValue,
    rhs: CompileValue,
    null_check: bool,
) -> JitResult<CompileValue> {
    ordering(asm, Opcode::Ge, lhs, rhs, null_check)
}

pub fn cmp_lt(
    asm: &mut Asm<'_, '_>,
    lhs: CompileValue,
    rhs: CompileValue,
    null_check: bool,
) -> JitResult<CompileValue> {
    ordering(asm, Opcode::Lt, lhs, rhs, null_check)
}

pub fn cmp_le(
    asm: &mut Asm<'_, '_>,
    lhs: CompileValue,
    rhs: CompileValue,
    null_check: bool,
) -> JitResult<CompileValue> {
    ordering(asm, Opcode::Le, lhs, rhs, null_check)
}

fn arithmetic(
    asm: &mut Asm<'_, '_>,
    op: Opcode,
    lhs: CompileValue,
    rhs: CompileValue,
    null_check: bool,
) -> JitResult<CompileValue> {
    let (a, b) = (lhs.as_reg()?, rhs.as_reg()?);
    let out = if is_int(lhs.dtype) {
        match op {
            Opcode::Add => alu::int_add(asm, a, b, null_check),
            Opcode::Sub => alu::int_sub(asm, a, b, null_check),
            Opcode::Mul => alu::int_mul(asm, a, b, null_check),
            _ => alu::int_div(asm, a, b, null_check),
        }
    } else if lhs.dtype.is_float() {
        match op {
            Opcode::Add => alu::float_add(asm, a, b),
            Opcode::Sub => alu::float_sub(asm, a, b),
            Opcode::Mul => alu::float_mul(asm, a, b),
            _ => alu::float_div(asm, a, b),
        }
    } else {
        return Err(unsupported(op, lhs.dtype));
    };
    Ok(CompileValue::reg(
        out,
        arith_type(&lhs),
        ValueKind::dominant(lhs.kind, rhs.kind),
    ))
}

pub fn add(
    asm: &mut Asm<'_, '_>,
    lhs: CompileValue,
    rhs: CompileValue,
    null_check: bool,
) -> JitResult<CompileValue> {
    arithmetic(asm, Opcode::Add, lhs, rhs, null_check)
}

pub fn sub(
    asm: &mut Asm<'_, '_>,
    lhs: CompileValue,
    rhs: CompileValue,
    null_check: bool,
) -> JitResult<CompileValue> {
    arithmetic(asm, Opcode::Sub, lhs, rhs, null_check)
}

pub fn mul(
    asm: &mut Asm<'_, '_>,
    lhs: CompileValue,
    rhs: CompileValue,
    null_check: bool,
) -> JitResult<CompileValue> {
    arithmetic(asm, Opcode::Mul, lhs, rhs, null_check)
}

pub fn div(
    asm: &mut Asm<'_, '_>,
    lhs: CompileValue,
    rhs: CompileValue,
    null_check: bool,
) -> JitResult<CompileValue> {
    arithmetic(asm, Opcode::Div, lhs, rhs, null_check)
}
