//! Masked, broadcasting "safe division" over strided N-dimensional arrays.
//!
//! Every operand carries a validity mask next to its data. [`spdiv`] computes
//! `a / b` elementwise with three rules:
//!
//! - if either input element is hidden, the output element is hidden;
//! - if the divisor is exactly zero, the output element is hidden;
//! - otherwise the quotient is stored and the output element is exposed.
//!
//! Hidden output elements keep whatever data they had. Division by zero is a
//! missing result, never an error, `inf` or `NaN`.
//!
//! # Core Types
//!
//! - [`MaskedView`] / [`MaskedViewMut`]: zero-copy strided views over data + mask
//! - [`MaskedArray`]: owned data + mask
//! - [`Validity`]: the per-element `Exposed` / `Hidden` code
//! - [`Element`] / [`DType`]: element types and the same-kind casting rule
//!
//! # Entry Points
//!
//! - [`spdiv`]: allocate the output
//! - [`spdiv_into`]: write into a caller-supplied output of the exact broadcast shape
//! - [`special_divide`]: one call for both, with an optional owned output
//!
//! The lower-level [`plan()`] / [`execute()`] pair exposes the two phases: planning
//! validates shapes and types, orders and blocks the loop and allocates; the
//! loop then runs without failing.
//!
//! # Example
//!
//! ```rust
//! use strided_spdiv::{spdiv, MaskedArray, Validity::{Exposed, Hidden}};
//!
//! let a = MaskedArray::from_vec(vec![10.0, 5.0, 3.0], vec![Exposed, Exposed, Hidden], &[3]).unwrap();
//! let b = MaskedArray::from_vec(vec![2.0, 0.0, 3.0], vec![Exposed; 3], &[3]).unwrap();
//!
//! let out = spdiv(&a.view(), &b.view()).unwrap();
//! assert_eq!(out.values(), vec![Some(5.0), None, None]);
//! ```
//!
//! # Broadcasting Example
//!
//! ```rust
//! use strided_spdiv::{spdiv, MaskedArray};
//!
//! let col = MaskedArray::from_fn_row_major(&[3, 1], |i| Some((i[0] + 1) as f64));
//! let row = MaskedArray::from_fn_row_major(&[1, 4], |i| Some(i[1] as f64));
//!
//! let out = spdiv(&col.view(), &row.view()).unwrap();
//! assert_eq!(out.dims(), &[3, 4]);
//! assert_eq!(out.value(&[2, 0]), None); // 3 / 0
//! assert_eq!(out.value(&[2, 3]), Some(1.0));
//! ```
//!
//! # Cache Optimization
//!
//! The loop follows Strided.jl's blocking strategy over six streams (three data
//! buffers and three masks):
//! - axes are ordered by stride importance, weighting the output double
//! - axes contiguous in every stream are fused, extent-1 axes dropped
//! - the loop is tiled to fit [`BLOCK_MEMORY_SIZE`]
//! - inputs that are not `f64` are converted through a buffer of at most
//!   [`BUFFER_SIZE`] elements per run

mod block;
pub mod broadcast;
mod divide;
pub mod dtype;
mod execute;
mod fuse;
mod kernel;
mod order;
pub mod plan;
pub mod validity;
pub mod view;

pub use divide::{
    special_divide, special_divide_with_options, spdiv, spdiv_into, spdiv_into_with_options,
    spdiv_with_options, DivideOptions,
};
pub use dtype::{can_cast_same_kind, DType, Element, Kind};
pub use execute::{decide, execute};
pub use plan::{plan, plan_allocated, IterationPlan, OperandRole, OutputTarget};
pub use validity::Validity;
pub use view::{MaskedArray, MaskedView, MaskedViewMut, MemoryOrder};

// ============================================================================
// Constants
// ============================================================================

/// Block memory size for cache-optimized iteration (L1 cache target).
pub const BLOCK_MEMORY_SIZE: usize = 32 * 1024;

/// Cache line size in bytes.
pub const CACHE_LINE_SIZE: usize = 64;

/// Default length, in elements, of the conversion buffer used for non-`f64` inputs.
pub const BUFFER_SIZE: usize = 8192;

// ============================================================================
// Error types
// ============================================================================

/// Shape contract violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    /// Input shapes cannot be broadcast together.
    #[error("operands could not be broadcast together with shapes {a:?} {b:?}")]
    Incompatible { a: Vec<usize>, b: Vec<usize> },

    /// A supplied output does not have the broadcast shape.
    #[error("output shape {got:?} does not match broadcast shape {expected:?} (no broadcast of output)")]
    OutputMismatch { expected: Vec<usize>, got: Vec<usize> },
}

/// An operand's element type cannot take part in `f64` arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot cast operand '{operand}' from {from} to {to} under same-kind casting")]
pub struct TypeError {
    pub operand: OperandRole,
    pub from: DType,
    pub to: DType,
}

/// Errors that can occur while building views or planning a division.
///
/// Every variant is raised before any element is read or written.
#[derive(Debug, thiserror::Error)]
pub enum SpdivError {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Type(#[from] TypeError),

    /// The output buffer could not be allocated.
    #[error("cannot allocate output of shape {dims:?}")]
    Allocation { dims: Vec<usize> },

    /// Stride array length doesn't match dimensions.
    #[error("stride and dims length mismatch")]
    StrideLengthMismatch,

    /// A view would address memory outside its buffer.
    #[error("offset overflow while computing pointer")]
    OffsetOverflow,

    /// Data and mask buffers of different lengths were paired.
    #[error("data has {data} elements but mask has {mask}")]
    MaskShapeMismatch { data: usize, mask: usize },

    /// A dense buffer does not hold exactly one element per position.
    #[error("shape needs {expected} elements but buffer has {got}")]
    DataLengthMismatch { expected: usize, got: usize },

    /// Permutation length doesn't match the rank.
    #[error("rank mismatch: {0} vs {1}")]
    RankMismatch(usize, usize),

    /// Invalid or repeated axis index.
    #[error("invalid axis {axis} for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },
}

/// Result type for masked division.
pub type Result<T> = std::result::Result<T, SpdivError>;
