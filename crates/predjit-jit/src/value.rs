//! Compile-time values and the operand stack.

use cranelift_codegen::ir::Value;
use predjit_common::{JitError, JitResult};
use predjit_types::{DataType, Instruction, ValueKind};

use crate::asm::Asm;

/// Inline literal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Imm {
    Int(i64),
    Float(f64),
}

/// Memory operand: `base + (index << shift) + disp`, read `size` bytes wide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mem {
    pub base: Value,
    pub index: Option<Value>,
    pub shift: u8,
    pub disp: i32,
    pub size: u8,
}

impl Mem {
    pub fn new(base: Value, index: Option<Value>, shift: u8, disp: i32, size: u8) -> Self {
        Self {
            base,
            index,
            shift,
            disp,
            size,
        }
    }
}

/// Where a compile-time value lives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    Imm(Imm),
    Mem(Mem),
    /// SSA value; its Cranelift type is the register class.
    Reg(Value),
}

/// A value on the operand stack during code generation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompileValue {
    pub op: Operand,
    pub dtype: DataType,
    pub kind: ValueKind,
}

impl CompileValue {
    pub fn new(op: Operand, dtype: DataType, kind: ValueKind) -> Self {
        Self { op, dtype, kind }
    }

    pub fn reg(v: Value, dtype: DataType, kind: ValueKind) -> Self {
        Self::new(Operand::Reg(v), dtype, kind)
    }

    pub fn is_imm(&self) -> bool {
        matches!(self.op, Operand::Imm(_))
    }

    /// The register holding this value. Callers materialize first.
    pub fn as_reg(&self) -> JitResult<Value> {
        match self.op {
            Operand::Reg(v) => Ok(v),
            other => Err(JitError::Codegen(format!(
                "expected a register operand, found {other:?}"
            ))),
        }
    }
}

/// Operand stack owned by one compilation.
#[derive(Debug, Default)]
pub struct OperandStack {
    values: Vec<CompileValue>,
}

impl OperandStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: CompileValue) {
        self.values.push(value);
    }

    /// Pops the top value; `position` is the instruction being compiled.
    pub fn pop(&mut self, position: usize) -> JitResult<CompileValue> {
        self.values
            .pop()
            .ok_or(JitError::StackUnderflow { position })
    }

    pub fn peek(&self) -> Option<&CompileValue> {
        self.values.last()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Decodes an `Imm` instruction into a constant operand.
///
/// `i128` literals go to the constant pool and come back as a 16-byte memory
/// operand; everything else stays inline.
pub fn read_imm(asm: &mut Asm<'_, '_>, instr: &Instruction) -> JitResult<CompileValue> {
    let dtype = instr.data_type()?;
    let op = match dtype {
        DataType::I128 => Operand::Mem(asm.const_i128(instr.int_payload())),
        DataType::F32 | DataType::F64 => Operand::Imm(Imm::Float(instr.float_payload())),
        _ => Operand::Imm(Imm::Int(instr.payload_lo())),
    };
    Ok(CompileValue::new(op, dtype, ValueKind::Const))
}
