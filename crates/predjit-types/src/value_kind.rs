/// Provenance of a compile-time value.
///
/// Forwarded through code generation for downstream consumers; the code
/// generator itself never branches on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Produced from an immediate literal.
    Const,
    /// Produced from a column or variable read.
    Memory,
}

impl ValueKind {
    /// Kind of a binary operator's result: `Memory` dominates `Const`.
    pub fn dominant(lhs: ValueKind, rhs: ValueKind) -> ValueKind {
        if lhs == ValueKind::Memory || rhs == ValueKind::Memory {
            ValueKind::Memory
        } else {
            ValueKind::Const
        }
    }
}
