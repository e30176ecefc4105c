use predjit_common::{JitError, JitResult};

/// Predicate bytecode opcodes. Discriminants are the wire values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Opcode {
    Inv = -1,
    Ret = 0,
    Var = 1,
    Mem = 2,
    Imm = 3,
    Neg = 4,
    Not = 5,
    And = 6,
    Or = 7,
    Eq = 8,
    Ne = 9,
    Lt = 10,
    Le = 11,
    Gt = 12,
    Ge = 13,
    Add = 14,
    Sub = 15,
    Mul = 16,
    Div = 17,
}

impl Opcode {
    pub fn from_code(code: i32) -> JitResult<Self> {
        Ok(match code {
            -1 => Self::Inv,
            0 => Self::Ret,
            1 => Self::Var,
            2 => Self::Mem,
            3 => Self::Imm,
            4 => Self::Neg,
            5 => Self::Not,
            6 => Self::And,
            7 => Self::Or,
            8 => Self::Eq,
            9 => Self::Ne,
            10 => Self::Lt,
            11 => Self::Le,
            12 => Self::Gt,
            13 => Self::Ge,
            14 => Self::Add,
            15 => Self::Sub,
            16 => Self::Mul,
            17 => Self::Div,
            other => return Err(JitError::UnknownOpcode(other)),
        })
    }

    pub const fn code(&self) -> i32 {
        *self as i32
    }

    /// Leaf opcodes push a value without consuming any.
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Self::Var | Self::Mem | Self::Imm)
    }

    pub const fn is_unary(&self) -> bool {
        matches!(self, Self::Neg | Self::Not)
    }

    pub const fn is_binary(&self) -> bool {
        matches!(
            self,
            Self::And
                | Self::Or
                | Self::Eq
                | Self::Ne
                | Self::Lt
                | Self::Le
                | Self::Gt
                | Self::Ge
                | Self::Add
                | Self::Sub
                | Self::Mul
                | Self::Div
        )
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
