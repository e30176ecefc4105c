//! predjit-types: bytecode, opcode and data-type model for filter predicates.

pub mod data_type;
pub mod instruction;
pub mod opcode;
pub mod value_kind;

pub use data_type::{DataType, Rank};
pub use instruction::{Instruction, Payload, RECORD_SIZE};
pub use opcode::Opcode;
pub use value_kind::ValueKind;
