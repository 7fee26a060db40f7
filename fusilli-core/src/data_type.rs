//! The tensor element-type tag used throughout attributes, emission, and
//! the runtime buffer layer.

use std::fmt;

/// Element type of a tensor. `NotSet` marks a tensor whose dtype has not
/// yet been assigned a default from a `Context` (see
/// `TensorAttr::fill_from_context`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    NotSet,
    Float,
    Half,
    BFloat16,
    Double,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Boolean,
    Fp8E5M2,
}

impl DataType {
    /// Byte width of one element. `NotSet` has no width.
    pub fn size_in_bytes(self) -> Option<usize> {
        match self {
            DataType::NotSet => None,
            DataType::Boolean | DataType::Int8 | DataType::Uint8 | DataType::Fp8E5M2 => Some(1),
            DataType::Half | DataType::BFloat16 | DataType::Int16 => Some(2),
            DataType::Float | DataType::Int32 => Some(4),
            DataType::Double | DataType::Int64 => Some(8),
        }
    }

    /// Textual MLIR element type, e.g. `f32`, `i64`, `i1`.
    pub fn mlir_asm(self) -> &'static str {
        match self {
            DataType::NotSet => "none",
            DataType::Float => "f32",
            DataType::Half => "f16",
            DataType::BFloat16 => "bf16",
            DataType::Double => "f64",
            DataType::Int8 => "si8",
            DataType::Int16 => "si16",
            DataType::Int32 => "si32",
            DataType::Int64 => "si64",
            DataType::Uint8 => "ui8",
            DataType::Boolean => "i1",
            DataType::Fp8E5M2 => "f8E5M2",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mlir_asm())
    }
}
