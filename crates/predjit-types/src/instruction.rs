//! Predicate instructions and their 32-byte wire encoding.

use predjit_common::{JitError, JitResult};

use crate::data_type::DataType;
use crate::opcode::Opcode;

/// Size of one encoded instruction record in bytes.
pub const RECORD_SIZE: usize = 32;

/// Immediate payload of an instruction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Payload {
    Int(i128),
    Float(f64),
}

/// One postfix bytecode instruction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Data-type tag for `Var`, `Mem` and `Imm`; opcode-specific otherwise.
    pub options: u32,
    pub payload: Payload,
}

impl Instruction {
    pub fn new(opcode: Opcode, options: u32, payload: Payload) -> Self {
        Self {
            opcode,
            options,
            payload,
        }
    }

    /// Operator or terminator instruction with no operands.
    pub fn op(opcode: Opcode) -> Self {
        Self::new(opcode, 0, Payload::Int(0))
    }

    pub fn ret() -> Self {
        Self::op(Opcode::Ret)
    }

    /// Read of variable slot `slot`.
    pub fn var(dtype: DataType, slot: i32) -> Self {
        Self::new(Opcode::Var, dtype.tag(), Payload::Int(i128::from(slot)))
    }

    /// Read of column `column` at the current row.
    pub fn mem(dtype: DataType, column: i32) -> Self {
        Self::new(Opcode::Mem, dtype.tag(), Payload::Int(i128::from(column)))
    }

    /// Integer literal. Header tags are accepted for null-probe comparisons.
    pub fn imm_int(dtype: DataType, value: i64) -> Self {
        Self::new(Opcode::Imm, dtype.tag(), Payload::Int(i128::from(value)))
    }

    pub fn imm_i128(value: i128) -> Self {
        Self::new(Opcode::Imm, DataType::I128.tag(), Payload::Int(value))
    }

    pub fn imm_float(dtype: DataType, value: f64) -> Self {
        Self::new(Opcode::Imm, dtype.tag(), Payload::Float(value))
    }

    /// Decodes `options` as a data-type tag.
    pub fn data_type(&self) -> JitResult<DataType> {
        DataType::from_tag(self.options)
    }

    /// Full integer payload. Float payloads yield their bit pattern.
    pub fn int_payload(&self) -> i128 {
        match self.payload {
            Payload::Int(v) => v,
            Payload::Float(f) => i128::from(f.to_bits() as i64),
        }
    }

    /// Low 64 bits of the payload, as the front end's `ipayload.lo`.
    pub fn payload_lo(&self) -> i64 {
        self.int_payload() as i64
    }

    /// Slot or column index of a leaf read.
    pub fn index(&self) -> i32 {
        self.payload_lo() as i32
    }

    pub fn float_payload(&self) -> f64 {
        match self.payload {
            Payload::Float(f) => f,
            Payload::Int(v) => v as f64,
        }
    }

    /// Decodes one wire record.
    pub fn decode(record: &[u8; RECORD_SIZE]) -> JitResult<Self> {
        let opcode = Opcode::from_code(i32::from_le_bytes(word4(record, 0)))?;
        let options = u32::from_le_bytes(word4(record, 4));
        let lo = i64::from_le_bytes(word8(record, 8));
        let hi = i64::from_le_bytes(word8(record, 16));

        let payload = if opcode.is_leaf() {
            let dtype = DataType::from_tag(options)?;
            if opcode == Opcode::Imm && dtype.is_float() {
                Payload::Float(f64::from_bits(lo as u64))
            } else {
                Payload::Int((i128::from(hi) << 64) | i128::from(lo as u64))
            }
        } else {
            Payload::Int((i128::from(hi) << 64) | i128::from(lo as u64))
        };

        Ok(Self::new(opcode, options, payload))
    }

    /// Decodes a packed buffer of wire records.
    pub fn decode_stream(bytes: &[u8]) -> JitResult<Vec<Self>> {
        if bytes.len() % RECORD_SIZE != 0 {
            return Err(JitError::MalformedStream(format!(
                "length {} is not a multiple of {RECORD_SIZE}",
                bytes.len()
            )));
        }
        bytes
            .chunks_exact(RECORD_SIZE)
            .map(|chunk| {
                let record: &[u8; RECORD_SIZE] = chunk
                    .try_into()
                    .map_err(|_| JitError::MalformedStream("short record".into()))?;
                Self::decode(record)
            })
            .collect()
    }

    /// Encodes this instruction as a wire record.
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        out[0..4].copy_from_slice(&self.opcode.code().to_le_bytes());
        out[4..8].copy_from_slice(&self.options.to_le_bytes());
        let (lo, hi) = match self.payload {
            Payload::Int(v) => (v as i64, (v >> 64) as i64),
            Payload::Float(f) => (f.to_bits() as i64, 0),
        };
        out[8..16].copy_from_slice(&lo.to_le_bytes());
        out[16..24].copy_from_slice(&hi.to_le_bytes());
        out
    }
}

fn word4(record: &[u8; RECORD_SIZE], at: usize) -> [u8; 4] {
    let mut w = [0u8; 4];
    w.copy_from_slice(&record[at..at + 4]);
    w
}

fn word8(record: &[u8; RECORD_SIZE], at: usize) -> [u8; 8] {
    let mut w = [0u8; 8];
    w.copy_from_slice(&record[at..at + 8]);
    w
}
