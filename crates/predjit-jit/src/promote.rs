//! Numeric type promotion for binary operands.
//!
//! Lattice: `{i8, i16, i32} < i64 < f32 < f64`. The lower-ranked side moves
//! up to the higher one, except that `i64` against `f32` lands both sides on
//! `f64`. `i128` and the header tags never convert.

use predjit_common::{JitError, JitResult};
use predjit_types::{DataType, Rank};

use crate::alu;
use crate::asm::Asm;
use crate::value::CompileValue;

/// Null detection for a conversion out of `src`.
///
/// `i8` and `i16` have no sentinel, so detection is off for them whatever
/// the caller asks for.
pub fn conversion_null_check(src: DataType, null_check: bool) -> bool {
    null_check && src.has_null_sentinel()
}

/// Brings two materialized operands to a common type.
pub fn convert(
    asm: &mut Asm<'_, '_>,
    lhs: CompileValue,
    rhs: CompileValue,
    null_check: bool,
) -> JitResult<(CompileValue, CompileValue)> {
    match (lhs.dtype.rank(), rhs.dtype.rank()) {
        (Some(lr), Some(rr)) if lr == rr => Ok((lhs, rhs)),
        (Some(lr), Some(rr)) => {
            let target = match (lr, rr) {
                (Rank::Int64, Rank::Float32) | (Rank::Float32, Rank::Int64) => Rank::Float64,
                _ => lr.max(rr),
            };
            let l = promote_to(asm, lhs, lr, target, null_check)?;
            let r = promote_to(asm, rhs, rr, target, null_check)?;
            Ok((l, r))
        }
        _ if lhs.dtype == rhs.dtype => Ok((lhs, rhs)),
        _ => Err(JitError::TypeMismatch {
            lhs: lhs.dtype.to_string(),
            rhs: rhs.dtype.to_string(),
        }),
    }
}

fn promote_to(
    asm: &mut Asm<'_, '_>,
    v: CompileValue,
    from: Rank,
    to: Rank,
    null_check: bool,
) -> JitResult<CompileValue> {
    if from == to {
        return Ok(v);
    }
    let reg = v.as_reg()?;
    let nc = conversion_null_check(v.dtype, null_check);
    let (out, dtype) = match (from, to) {
        (Rank::Int32, Rank::Int64) => (alu::int32_to_int64(asm, reg, nc), DataType::I64),
        (Rank::Int32, Rank::Float32) => (alu::int32_to_float(asm, reg, nc), DataType::F32),
        (Rank::Int32, Rank::Float64) => (alu::int32_to_double(asm, reg, nc), DataType::F64),
        (Rank::Int64, Rank::Float64) => (alu::int64_to_double(asm, reg, nc), DataType::F64),
        (Rank::Float32, Rank::Float64) => (alu::float_to_double(asm, reg), DataType::F64),
        _ => {
            return Err(JitError::Codegen(format!(
                "no conversion from {from:?} to {to:?}"
            )));
        }
    };
    Ok(CompileValue::reg(out, dtype, v.kind))
}
