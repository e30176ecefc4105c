use thiserror::Error;

/// Errors raised while decoding or compiling a predicate instruction stream.
///
/// Every variant is a compile-time failure. Generated code has no error
/// paths of its own; null propagation and division semantics are baked into
/// the emitted ALU primitives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JitError {
    #[error("invalid instruction at position {position}")]
    InvalidInstruction { position: usize },

    #[error("unknown opcode {0}")]
    UnknownOpcode(i32),

    #[error("unknown data type tag {0}")]
    UnknownDataType(u32),

    #[error("malformed instruction stream: {0}")]
    MalformedStream(String),

    #[error("operand stack underflow at position {position}")]
    StackUnderflow { position: usize },

    #[error("unsupported operation: {op} on {dtype}")]
    UnsupportedOperation { op: String, dtype: String },

    #[error("type mismatch: {lhs} vs {rhs}")]
    TypeMismatch { lhs: String, rhs: String },

    #[error("predicate left no result on the operand stack")]
    EmptyPredicate,

    #[error("predicate result of type {0} is not boolean")]
    NonBooleanResult(String),

    #[error("codegen: {0}")]
    Codegen(String),

    #[error("setup: {0}")]
    Setup(String),
}

pub type JitResult<T> = Result<T, JitError>;
