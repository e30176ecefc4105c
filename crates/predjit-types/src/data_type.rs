use predjit_common::{JitError, JitResult};

/// Operand data type carried in an instruction's `options` field.
///
/// Discriminant values match the front end's wire tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DataType {
    I8 = 0,
    I16 = 1,
    I32 = 2,
    F32 = 3,
    I64 = 4,
    F64 = 5,
    I128 = 6,
    /// Length/null probe of a string column (4-byte header).
    StringHeader = 7,
    /// Length/null probe of a binary column (8-byte header).
    BinaryHeader = 8,
    /// Null probe of a varchar column (aux-vector header).
    VarcharHeader = 9,
}

/// Position of a numeric type in the promotion lattice.
///
/// `i8`, `i16` and `i32` share a rank: they live in 32-bit registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    Int32,
    Int64,
    Float32,
    Float64,
}

impl DataType {
    pub fn from_tag(tag: u32) -> JitResult<Self> {
        Ok(match tag {
            0 => Self::I8,
            1 => Self::I16,
            2 => Self::I32,
            3 => Self::F32,
            4 => Self::I64,
            5 => Self::F64,
            6 => Self::I128,
            7 => Self::StringHeader,
            8 => Self::BinaryHeader,
            9 => Self::VarcharHeader,
            other => return Err(JitError::UnknownDataType(other)),
        })
    }

    pub const fn tag(&self) -> u32 {
        *self as u32
    }

    /// log2 of the element width in bytes.
    pub const fn shift(&self) -> u8 {
        match self {
            Self::I8 => 0,
            Self::I16 => 1,
            Self::I32 | Self::F32 | Self::StringHeader => 2,
            Self::I64 | Self::F64 | Self::BinaryHeader => 3,
            Self::I128 | Self::VarcharHeader => 4,
        }
    }

    /// Element width in bytes.
    pub const fn size(&self) -> u8 {
        1 << self.shift()
    }

    /// Lattice rank, or `None` for tag types that never convert.
    pub const fn rank(&self) -> Option<Rank> {
        match self {
            Self::I8 | Self::I16 | Self::I32 => Some(Rank::Int32),
            Self::I64 => Some(Rank::Int64),
            Self::F32 => Some(Rank::Float32),
            Self::F64 => Some(Rank::Float64),
            Self::I128 | Self::StringHeader | Self::BinaryHeader | Self::VarcharHeader => None,
        }
    }

    pub const fn is_header(&self) -> bool {
        matches!(
            self,
            Self::StringHeader | Self::BinaryHeader | Self::VarcharHeader
        )
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Integer family that carries a reserved null sentinel.
    ///
    /// `i8` and `i16` use their full range for values.
    pub const fn has_null_sentinel(&self) -> bool {
        !matches!(self, Self::I8 | Self::I16)
    }

    /// Width of the register a value of this type occupies once loaded.
    pub const fn register_bits(&self) -> u16 {
        match self {
            Self::I8 | Self::I16 | Self::I32 | Self::F32 | Self::StringHeader => 32,
            Self::I64 | Self::F64 | Self::BinaryHeader | Self::VarcharHeader => 64,
            Self::I128 => 128,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::F32 => "f32",
            Self::I64 => "i64",
            Self::F64 => "f64",
            Self::I128 => "i128",
            Self::StringHeader => "string_header",
            Self::BinaryHeader => "binary_header",
            Self::VarcharHeader => "varchar_header",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for tag in 0..=9 {
            assert_eq!(DataType::from_tag(tag).unwrap().tag(), tag);
        }
        assert_eq!(DataType::from_tag(10), Err(JitError::UnknownDataType(10)));
    }

    #[test]
    fn widths() {
        assert_eq!(DataType::I8.size(), 1);
        assert_eq!(DataType::I16.size(), 2);
        assert_eq!(DataType::F32.size(), 4);
        assert_eq!(DataType::I64.size(), 8);
        assert_eq!(DataType::I128.size(), 16);
        assert_eq!(DataType::I128.shift(), 4);
    }

    #[test]
    fn small_ints_share_rank() {
        assert_eq!(DataType::I8.rank(), DataType::I32.rank());
        assert_eq!(DataType::I16.rank(), Some(Rank::Int32));
        assert!(Rank::Int64 < Rank::Float32);
        assert!(Rank::Float32 < Rank::Float64);
        assert_eq!(DataType::I128.rank(), None);
        assert_eq!(DataType::VarcharHeader.rank(), None);
    }

    #[test]
    fn sentinel_families() {
        assert!(!DataType::I8.has_null_sentinel());
        assert!(!DataType::I16.has_null_sentinel());
        assert!(DataType::I32.has_null_sentinel());
        assert!(DataType::I64.has_null_sentinel());
    }

    #[test]
    fn display() {
        assert_eq!(DataType::StringHeader.to_string(), "string_header");
        assert_eq!(DataType::F64.to_string(), "f64");
    }
}
