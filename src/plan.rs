//! Iteration planning.
//!
//! Planning does every check and every allocation up front: broadcast shape,
//! output shape, element types, output buffer, conversion buffers, loop order
//! and cache blocks. Once a plan exists, [`execute`](crate::execute) cannot fail.

use std::fmt;

use tracing::{debug, trace};

use crate::broadcast::{broadcast_shape, broadcast_strides};
use crate::dtype::{can_cast_same_kind, DType, Element};
use crate::execute::CastBuffers;
use crate::kernel::{build_plan, is_contiguous_in, ContiguousLayout, KernelPlan};
use crate::validity::Validity;
use crate::view::{checked_len, MaskedArray, MaskedView, MaskedViewMut, MemoryOrder};
use crate::{DivideOptions, Result, ShapeError, SpdivError, TypeError};

/// Stream indices inside a [`KernelPlan`]. The output data stream comes first
/// so that ordering weighs it double.
pub(crate) const OUT_DATA: usize = 0;
pub(crate) const A_DATA: usize = 1;
pub(crate) const B_DATA: usize = 2;
pub(crate) const OUT_MASK: usize = 3;
pub(crate) const A_MASK: usize = 4;
pub(crate) const B_MASK: usize = 5;

/// Which operand an error refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OperandRole {
    A,
    B,
    Out,
}

impl fmt::Display for OperandRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperandRole::A => "a",
            OperandRole::B => "b",
            OperandRole::Out => "out",
        })
    }
}

mod sealed {
    pub trait Sealed {}
    impl<T> Sealed for crate::view::MaskedArray<T> {}
    impl<T> Sealed for crate::view::MaskedViewMut<'_, T> {}
}

/// Where the loop writes: an owned [`MaskedArray`] allocated by the planner or
/// a caller-supplied [`MaskedViewMut`].
pub trait OutputTarget: sealed::Sealed {
    type Elem: Element;

    fn shape(&self) -> &[usize];
    fn data_strides(&self) -> &[isize];
    fn validity_strides(&self) -> &[isize];

    #[doc(hidden)]
    fn data_base(&mut self) -> *mut Self::Elem;
    #[doc(hidden)]
    fn validity_base(&mut self) -> *mut Validity;
}

impl<O: Element> OutputTarget for MaskedArray<O> {
    type Elem = O;

    fn shape(&self) -> &[usize] {
        self.dims()
    }

    fn data_strides(&self) -> &[isize] {
        self.strides()
    }

    fn validity_strides(&self) -> &[isize] {
        self.mask_strides()
    }

    fn data_base(&mut self) -> *mut O {
        self.data_ptr_mut()
    }

    fn validity_base(&mut self) -> *mut Validity {
        self.mask_ptr_mut()
    }
}

impl<O: Element> OutputTarget for MaskedViewMut<'_, O> {
    type Elem = O;

    fn shape(&self) -> &[usize] {
        self.dims()
    }

    fn data_strides(&self) -> &[isize] {
        self.strides()
    }

    fn validity_strides(&self) -> &[isize] {
        self.mask_strides()
    }

    fn data_base(&mut self) -> *mut O {
        self.data_ptr_mut()
    }

    fn validity_base(&mut self) -> *mut Validity {
        self.mask_ptr_mut()
    }
}

/// A fully validated division, ready to run.
pub struct IterationPlan<'a, A, B, T> {
    shape: Vec<usize>,
    len: usize,
    pub(crate) kernel: KernelPlan,
    pub(crate) a: MaskedView<'a, A>,
    pub(crate) b: MaskedView<'a, B>,
    pub(crate) out: T,
    pub(crate) cast: Option<CastBuffers>,
}

impl<A, B, T> fmt::Debug for IterationPlan<'_, A, B, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterationPlan")
            .field("shape", &self.shape)
            .field("loop_dims", &self.kernel.dims)
            .field("blocks", &self.kernel.blocks)
            .field("buffered", &self.cast.is_some())
            .finish()
    }
}

impl<A, B, T> IterationPlan<'_, A, B, T> {
    /// Broadcast shape of the operation.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of positions the loop will visit.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Loop extents after ordering, fusion and compression (innermost first).
    pub fn loop_dims(&self) -> &[usize] {
        &self.kernel.dims
    }

    /// Whether inputs are converted to `f64` through a scratch buffer.
    pub fn is_buffered(&self) -> bool {
        self.cast.is_some()
    }

    /// Release the plan, returning the output target.
    pub fn into_output(self) -> T {
        self.out
    }
}

/// Plan a division into a caller-supplied output.
///
/// `out` must have exactly the broadcast shape of `a` and `b`.
pub fn plan<'a, 'o, A, B, O>(
    a: &MaskedView<'a, A>,
    b: &MaskedView<'a, B>,
    out: MaskedViewMut<'o, O>,
    options: &DivideOptions,
) -> Result<IterationPlan<'a, A, B, MaskedViewMut<'o, O>>>
where
    A: Element,
    B: Element,
    O: Element,
{
    let shape = broadcast_shape(a.dims(), b.dims())?;
    if out.dims() != shape.as_slice() {
        return Err(ShapeError::OutputMismatch {
            expected: shape,
            got: out.dims().to_vec(),
        }
        .into());
    }
    check_types::<A, B, O>()?;
    build(a, b, shape, out, options)
}

/// Plan a division whose output the planner allocates.
///
/// The output has the broadcast shape, its mask starts hidden, and its memory
/// order follows [`DivideOptions::order`].
pub fn plan_allocated<'a, A, B, O>(
    a: &MaskedView<'a, A>,
    b: &MaskedView<'a, B>,
    options: &DivideOptions,
) -> Result<IterationPlan<'a, A, B, MaskedArray<O>>>
where
    A: Element,
    B: Element,
    O: Element,
{
    let shape = broadcast_shape(a.dims(), b.dims())?;
    check_types::<A, B, O>()?;
    let order = resolve_order(options.order, a, b);
    let out = MaskedArray::<O>::try_alloc(&shape, order)?;
    trace!(dims = ?shape, ?order, "allocated output");
    build(a, b, shape, out, options)
}

fn check_types<A: Element, B: Element, O: Element>() -> std::result::Result<(), TypeError> {
    for (operand, from) in [(OperandRole::A, A::DTYPE), (OperandRole::B, B::DTYPE)] {
        if !can_cast_same_kind(from, DType::F64) {
            return Err(TypeError {
                operand,
                from,
                to: DType::F64,
            });
        }
    }
    if !can_cast_same_kind(DType::F64, O::DTYPE) {
        return Err(TypeError {
            operand: OperandRole::Out,
            from: DType::F64,
            to: O::DTYPE,
        });
    }
    Ok(())
}

/// Concrete layout for an allocated output.
///
/// `Keep` picks column-major only when some input is column-major (and not
/// also row-major) and no input is row-major only.
fn resolve_order<A, B>(order: MemoryOrder, a: &MaskedView<'_, A>, b: &MaskedView<'_, B>) -> MemoryOrder {
    if order != MemoryOrder::Keep {
        return order;
    }
    let mut col_only = false;
    let mut row_only = false;
    for (dims, strides) in [(a.dims(), a.strides()), (b.dims(), b.strides())] {
        // overflowing counts only come from stride-0 views, which are neither layout
        if checked_len(dims).map_or(true, |n| n <= 1) {
            continue;
        }
        let row = is_contiguous_in(dims, strides, ContiguousLayout::RowMajor);
        let col = is_contiguous_in(dims, strides, ContiguousLayout::ColMajor);
        col_only |= col && !row;
        row_only |= row && !col;
    }
    if col_only && !row_only {
        MemoryOrder::ColMajor
    } else {
        MemoryOrder::RowMajor
    }
}

fn build<'a, A, B, T>(
    a: &MaskedView<'a, A>,
    b: &MaskedView<'a, B>,
    shape: Vec<usize>,
    out: T,
    options: &DivideOptions,
) -> Result<IterationPlan<'a, A, B, T>>
where
    A: Element,
    B: Element,
    T: OutputTarget,
{
    let a_data = broadcast_strides(&shape, a.dims(), a.strides())?;
    let a_mask = broadcast_strides(&shape, a.dims(), a.mask_strides())?;
    let b_data = broadcast_strides(&shape, b.dims(), b.strides())?;
    let b_mask = broadcast_strides(&shape, b.dims(), b.mask_strides())?;

    let mut streams: [&[isize]; 6] = [&[]; 6];
    streams[OUT_DATA] = out.data_strides();
    streams[A_DATA] = &a_data;
    streams[B_DATA] = &b_data;
    streams[OUT_MASK] = out.validity_strides();
    streams[A_MASK] = &a_mask;
    streams[B_MASK] = &b_mask;

    let mut elem_sizes = [1usize; 6];
    elem_sizes[OUT_DATA] = <T::Elem as Element>::DTYPE.size();
    elem_sizes[A_DATA] = A::DTYPE.size();
    elem_sizes[B_DATA] = B::DTYPE.size();

    let len = checked_len(&shape).ok_or_else(|| SpdivError::Allocation {
        dims: shape.clone(),
    })?;
    let kernel = if len == 0 {
        KernelPlan::empty(streams.len())
    } else {
        build_plan(&shape, &streams, &elem_sizes, Some(OUT_DATA))
    };

    let needs_cast = A::DTYPE != DType::F64 || B::DTYPE != DType::F64;
    let cast = if needs_cast && len > 0 {
        let run = kernel.blocks.first().copied().unwrap_or(1);
        let cap = options.buffer_size.max(1).min(run.max(1));
        Some(CastBuffers::try_new(cap).map_err(|_| SpdivError::Allocation {
            dims: shape.clone(),
        })?)
    } else {
        None
    };

    debug!(
        shape = ?shape,
        loop_dims = ?kernel.dims,
        blocks = ?kernel.blocks,
        len,
        buffered = cast.is_some(),
        "planned masked division"
    );

    Ok(IterationPlan {
        shape,
        len,
        kernel,
        a: a.clone(),
        b: b.clone(),
        out,
        cast,
    })
}
