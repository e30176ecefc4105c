//! Column and variable addressing.
//!
//! Fixed-width reads produce a memory operand; the load itself is left to the
//! materializer so it can pick the right extension. Variable-length reads
//! resolve to a register because they may branch.

use cranelift_codegen::ir::{types, InstBuilder, Value};
use predjit_common::{JitError, JitResult};
use predjit_types::{DataType, ValueKind};

use crate::asm::Asm;
use crate::value::{CompileValue, Mem, Operand};

/// Runtime values the emitted predicate is parameterized by.
#[derive(Clone, Copy, Debug)]
pub struct FrameRegisters {
    /// One data pointer per column.
    pub column_table: Value,
    /// One aux pointer per column: offsets or varchar headers.
    pub aux_table: Value,
    /// Flat array of 8-byte variable slots.
    pub vars: Value,
    /// Current row index, `i64`.
    pub row: Value,
}

/// Byte offset of entry `index` in a table of 8-byte slots.
fn slot_disp(index: i32) -> JitResult<i32> {
    if index < 0 {
        return Err(JitError::MalformedStream(format!(
            "negative slot index {index}"
        )));
    }
    index
        .checked_mul(8)
        .ok_or_else(|| JitError::MalformedStream(format!("slot index {index} out of range")))
}

pub fn read_var(dtype: DataType, slot: i32, regs: &FrameRegisters) -> JitResult<CompileValue> {
    let disp = slot_disp(slot)?;
    let mem = Mem::new(regs.vars, None, 0, disp, dtype.size());
    Ok(CompileValue::new(Operand::Mem(mem), dtype, ValueKind::Memory))
}

/// Reads column `column` at the current row, dispatching on layout.
pub fn read_column(
    asm: &mut Asm<'_, '_>,
    dtype: DataType,
    column: i32,
    regs: &FrameRegisters,
) -> JitResult<CompileValue> {
    let disp = slot_disp(column)?;
    Ok(match dtype {
        DataType::VarcharHeader => read_varchar_header(asm, disp, regs),
        DataType::StringHeader => read_varsize(asm, 4, disp, regs),
        DataType::BinaryHeader => read_varsize(asm, 8, disp, regs),
        _ => read_fixed(asm, dtype, disp, regs),
    })
}

fn read_fixed(
    asm: &mut Asm<'_, '_>,
    dtype: DataType,
    disp: i32,
    regs: &FrameRegisters,
) -> CompileValue {
    let column = asm.load_ptr(regs.column_table, disp);
    let shift = dtype.shift();
    let mem = if dtype.size() <= 8 {
        Mem::new(column, Some(regs.row), shift, 0, dtype.size())
    } else {
        // Scaled addressing stops at 8.
        let offset = asm.ins().ishl_imm(regs.row, i64::from(shift));
        Mem::new(column, Some(offset), 0, 0, dtype.size())
    };
    CompileValue::new(Operand::Mem(mem), dtype, ValueKind::Memory)
}

/// Length of a string (`header_size` 4) or binary (`header_size` 8) value.
///
/// `aux[k]` holds one 8-byte data offset per row plus a trailing one. The
/// offset difference minus the header is the length, except that zero is
/// ambiguous between empty and null, so on zero the stored header is read:
/// `0` for empty, `-1` for null.
fn read_varsize(
    asm: &mut Asm<'_, '_>,
    header_size: u8,
    disp: i32,
    regs: &FrameRegisters,
) -> CompileValue {
    let aux = asm.load_ptr(regs.aux_table, disp);
    let offset = asm.load(types::I64, &Mem::new(aux, Some(regs.row), 3, 0, 8));
    let next = asm.load(types::I64, &Mem::new(aux, Some(regs.row), 3, 8, 8));
    let span = asm.ins().isub(next, offset);
    let length = asm.ins().iadd_imm(span, -i64::from(header_size));

    let var = asm.new_var(types::I64);
    asm.def_var(var, length);
    let l_header = asm.new_label();
    let l_done = asm.new_label();
    asm.branch_nonzero(length, l_done, l_header);

    asm.bind(l_header);
    let data = asm.load_ptr(regs.column_table, disp);
    let header_mem = Mem::new(data, Some(offset), 0, 0, header_size);
    let header = if header_size == 4 {
        let h = asm.load(types::I32, &header_mem);
        asm.ins().sextend(types::I64, h)
    } else {
        asm.load(types::I64, &header_mem)
    };
    asm.def_var(var, header);
    asm.jump(l_done);

    asm.bind(l_done);
    let length = asm.use_var(var);
    if header_size == 4 {
        let narrow = asm.ins().ireduce(types::I32, length);
        CompileValue::reg(narrow, DataType::I32, ValueKind::Memory)
    } else {
        CompileValue::reg(length, DataType::I64, ValueKind::Memory)
    }
}

/// Low 8 bytes of the 16-byte varchar aux entry for the current row.
///
/// Only meaningful for null detection, never as a length.
fn read_varchar_header(asm: &mut Asm<'_, '_>, disp: i32, regs: &FrameRegisters) -> CompileValue {
    let aux = asm.load_ptr(regs.aux_table, disp);
    let offset = asm.ins().ishl_imm(regs.row, i64::from(DataType::I128.shift()));
    let header = asm.load(types::I64, &Mem::new(aux, Some(offset), 0, 0, 8));
    CompileValue::reg(header, DataType::VarcharHeader, ValueKind::Memory)
}
