//! Loading compile-time values into registers.

use cranelift_codegen::ir::types;
use predjit_types::{DataType, ValueKind};

use crate::asm::Asm;
use crate::value::{CompileValue, Imm, Mem, Operand};

pub fn fits_i32(x: i64) -> bool {
    i32::try_from(x).is_ok()
}

/// Whether a literal's magnitude is within single-precision range.
/// NaN is not.
///
/// Only magnitude counts: zero, subnormals and negative literals stay `f32`,
/// so they compare against `f32` columns in single precision.
pub fn fits_f32(x: f64) -> bool {
    x.abs() <= f64::from(f32::MAX)
}

/// Loads `v` into a register suited to `dst`.
///
/// Only immediates consult `dst`; memory operands load at their own type
/// and registers pass through.
pub fn load_register(asm: &mut Asm<'_, '_>, dst: DataType, v: CompileValue) -> CompileValue {
    match v.op {
        Operand::Imm(Imm::Int(x)) => int_imm_to_reg(asm, dst, x),
        Operand::Imm(Imm::Float(x)) => float_imm_to_reg(asm, dst, x),
        Operand::Mem(mem) => mem_to_reg(asm, v.dtype, v.kind, &mem),
        Operand::Reg(_) => v,
    }
}

pub fn load_value(asm: &mut Asm<'_, '_>, v: CompileValue) -> CompileValue {
    load_register(asm, v.dtype, v)
}

/// Loads a binary operator's operands.
///
/// A lone immediate takes its peer's declared type, so `col_i64 == 5`
/// materializes `5` as a 64-bit value.
pub fn load_registers(
    asm: &mut Asm<'_, '_>,
    lhs: CompileValue,
    rhs: CompileValue,
) -> (CompileValue, CompileValue) {
    let (lt, rt) = match (lhs.is_imm(), rhs.is_imm()) {
        (true, false) => (rhs.dtype, rhs.dtype),
        (false, true) => (lhs.dtype, lhs.dtype),
        _ => (lhs.dtype, rhs.dtype),
    };
    let l = load_register(asm, lt, lhs);
    let r = load_register(asm, rt, rhs);
    (l, r)
}

fn int_imm_to_reg(asm: &mut Asm<'_, '_>, dst: DataType, x: i64) -> CompileValue {
    let (reg, dtype) = match dst {
        DataType::F32 => {
            let mem = asm.const_f32(x as f32);
            (asm.load(types::F32, &mem), DataType::F32)
        }
        DataType::F64 => {
            let mem = asm.const_f64(x as f64);
            (asm.load(types::F64, &mem), DataType::F64)
        }
        DataType::I128 => {
            let mem = asm.const_i128(i128::from(x));
            (asm.load(types::I128, &mem), DataType::I128)
        }
        _ if dst.is_header() => {
            let ty = if dst.register_bits() == 32 { types::I32 } else { types::I64 };
            (asm.iconst(ty, x), dst)
        }
        DataType::I64 => (asm.iconst(types::I64, x), DataType::I64),
        _ if !fits_i32(x) => (asm.iconst(types::I64, x), DataType::I64),
        _ => (asm.iconst(types::I32, x), dst),
    };
    CompileValue::reg(reg, dtype, ValueKind::Const)
}

fn float_imm_to_reg(asm: &mut Asm<'_, '_>, dst: DataType, x: f64) -> CompileValue {
    let (reg, dtype) = if matches!(dst, DataType::I64 | DataType::F64) || !fits_f32(x) {
        let mem = asm.const_f64(x);
        (asm.load(types::F64, &mem), DataType::F64)
    } else {
        let mem = asm.const_f32(x as f32);
        (asm.load(types::F32, &mem), DataType::F32)
    };
    CompileValue::reg(reg, dtype, ValueKind::Const)
}

fn mem_to_reg(asm: &mut Asm<'_, '_>, dtype: DataType, kind: ValueKind, mem: &Mem) -> CompileValue {
    let reg = match dtype {
        DataType::I8 => asm.sload8(mem),
        DataType::I16 => asm.sload16(mem),
        DataType::I32 | DataType::StringHeader => asm.load(types::I32, mem),
        DataType::I64 | DataType::BinaryHeader | DataType::VarcharHeader => {
            asm.load(types::I64, mem)
        }
        DataType::I128 => asm.load(types::I128, mem),
        DataType::F32 => asm.load(types::F32, mem),
        DataType::F64 => asm.load(types::F64, mem),
    };
    CompileValue::reg(reg, dtype, kind)
}
