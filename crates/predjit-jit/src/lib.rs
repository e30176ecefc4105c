//! predjit-jit: Cranelift code generation for postfix filter predicates.
//!
//! A predicate stream is evaluated once, at compile time, over an operand
//! stack of [`CompileValue`]s. Each instruction emits native operations;
//! [`compile_filter`] wraps the result in a row loop that writes the indices
//! of passing rows to an output buffer.

pub mod addressor;
pub mod alu;
pub mod asm;
pub mod cache;
pub mod const_pool;
pub mod evaluator;
pub mod filter;
pub mod materialize;
pub mod ops;
pub mod promote;
pub mod value;

#[cfg(test)]
mod testing;

pub use addressor::FrameRegisters;
pub use cache::{FilterCache, stream_hash};
pub use const_pool::ConstPool;
pub use evaluator::emit_code;
pub use filter::{CompiledFilter, compile_filter, compile_filter_records};
pub use value::{CompileValue, Imm, Mem, Operand, OperandStack};
