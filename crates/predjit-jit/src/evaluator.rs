//! Single-pass driver over the postfix instruction stream.

use predjit_common::{JitError, JitResult};
use predjit_types::{Instruction, Opcode};

use crate::addressor::{read_column, read_var, FrameRegisters};
use crate::asm::Asm;
use crate::materialize::{load_registers, load_value};
use crate::ops;
use crate::promote::convert;
use crate::value::{read_imm, CompileValue, OperandStack};

/// Emits code for `stream` and returns the value left on top of the stack.
///
/// Stops at `Ret` or the end of the stream. `Inv` fails the compilation.
pub fn emit_code(
    asm: &mut Asm<'_, '_>,
    stream: &[Instruction],
    stack: &mut OperandStack,
    null_check: bool,
    regs: &FrameRegisters,
) -> JitResult<Option<CompileValue>> {
    for (position, instr) in stream.iter().enumerate() {
        tracing::trace!(position, opcode = %instr.opcode, depth = stack.len(), "emit");
        match instr.opcode {
            Opcode::Inv => return Err(JitError::InvalidInstruction { position }),
            Opcode::Ret => break,
            Opcode::Var => {
                let v = read_var(instr.data_type()?, instr.index(), regs)?;
                stack.push(v);
            }
            Opcode::Mem => {
                let v = read_column(asm, instr.data_type()?, instr.index(), regs)?;
                stack.push(v);
            }
            Opcode::Imm => {
                let v = read_imm(asm, instr)?;
                stack.push(v);
            }
            op if op.is_unary() => {
                let v = emit_unary(asm, op, stack, position)?;
                stack.push(v);
            }
            op if op.is_binary() => {
                let v = emit_binary(asm, op, stack, position, null_check)?;
                stack.push(v);
            }
            other => return Err(JitError::Codegen(format!("unhandled opcode {other}"))),
        }
    }
    Ok(stack.peek().copied())
}

fn emit_unary(
    asm: &mut Asm<'_, '_>,
    op: Opcode,
    stack: &mut OperandStack,
    position: usize,
) -> JitResult<CompileValue> {
    let arg = load_value(asm, stack.pop(position)?);
    match op {
        Opcode::Neg => ops::neg(asm, arg),
        Opcode::Not => ops::bin_not(asm, arg),
        other => Err(JitError::Codegen(format!("{other} is not a unary operator"))),
    }
}

fn emit_binary(
    asm: &mut Asm<'_, '_>,
    op: Opcode,
    stack: &mut OperandStack,
    position: usize,
    null_check: bool,
) -> JitResult<CompileValue> {
    let rhs = stack.pop(position)?;
    let lhs = stack.pop(position)?;
    let (lhs, rhs) = load_registers(asm, lhs, rhs);
    let (lhs, rhs) = convert(asm, lhs, rhs, null_check)?;
    match op {
        Opcode::And => ops::bin_and(asm, lhs, rhs),
        Opcode::Or => ops::bin_or(asm, lhs, rhs),
        Opcode::Eq => ops::cmp_eq(asm, lhs, rhs),
        Opcode::Ne => ops::cmp_ne(asm, lhs, rhs),
        Opcode::Gt => ops::cmp_gt(asm, lhs, rhs, null_check),
        Opcode::Ge => ops::cmp_ge(asm, lhs, rhs, null_check),
        Opcode::Lt => ops::cmp_lt(asm, lhs, rhs, null_check),
        Opcode::Le => ops::cmp_le(asm, lhs, rhs, null_check),
        Opcode::Add => ops::add(asm, lhs, rhs, null_check),
        Opcode::Sub => ops::sub(asm, lhs, rhs, null_check),
        Opcode::Mul => ops::mul(asm, lhs, rhs, null_check),
        Opcode::Div => ops::div(asm, lhs, rhs, null_check),
        other => Err(JitError::Codegen(format!("{other} is not a binary operator"))),
    }
}
