//! Element types and the same-kind casting rule.
//!
//! All arithmetic happens in `f64`. Inputs are converted to `f64` on access and
//! the quotient is converted to the output's element type on store; the planner
//! checks both conversions against [`can_cast_same_kind`] before any element is
//! touched.

use std::fmt;

use num_complex::{Complex32, Complex64};
use num_traits::AsPrimitive;

/// Broad category of a [`DType`], ordered from least to most general.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Bool,
    Unsigned,
    Signed,
    Float,
    Complex,
}

/// Runtime tag for an array's element type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Complex64,
    Complex128,
}

impl DType {
    pub fn kind(self) -> Kind {
        match self {
            DType::Bool => Kind::Bool,
            DType::U8 | DType::U16 | DType::U32 | DType::U64 => Kind::Unsigned,
            DType::I8 | DType::I16 | DType::I32 | DType::I64 => Kind::Signed,
            DType::F32 | DType::F64 => Kind::Float,
            DType::Complex64 | DType::Complex128 => Kind::Complex,
        }
    }

    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            DType::Bool | DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::I64 | DType::U64 | DType::F64 | DType::Complex64 => 8,
            DType::Complex128 => 16,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Same-kind casting: a value may move to a type of the same kind (possibly
/// narrower, e.g. `float64 -> float32`) or of a more general kind
/// (`int64 -> float64`), but never to a less general kind
/// (`float64 -> int32`, `complex128 -> float64`).
pub fn can_cast_same_kind(from: DType, to: DType) -> bool {
    from.kind() <= to.kind()
}

/// An element type that can take part in the division.
pub trait Element: Copy + Default + 'static {
    const DTYPE: DType;

    /// Convert to the common arithmetic type.
    fn to_f64(self) -> f64;

    /// Convert a quotient back to this type.
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_element_primitive {
    ($($t:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $t {
                const DTYPE: DType = DType::$dtype;

                #[inline(always)]
                fn to_f64(self) -> f64 {
                    self.as_()
                }

                #[inline(always)]
                fn from_f64(value: f64) -> Self {
                    value.as_()
                }
            }
        )*
    };
}

impl_element_primitive!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    #[inline(always)]
    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value != 0.0
    }
}

// Complex inputs never reach `to_f64`: the planner rejects them.
impl Element for Complex32 {
    const DTYPE: DType = DType::Complex64;

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self.re as f64
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        Complex32::new(value as f32, 0.0)
    }
}

impl Element for Complex64 {
    const DTYPE: DType = DType::Complex128;

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self.re
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        Complex64::new(value, 0.0)
    }
}
