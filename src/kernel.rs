//! Blocked strided iteration engine.
//!
//! Follows the Strided.jl `_mapreduce_kernel!` structure: dimensions are
//! ordered, fused and compressed once, then walked block by block while a
//! callback receives each innermost run as `(offsets, len, inner_strides)`.

use crate::fuse::{compress_dims, fuse_dims};
use crate::{block, order};

/// Loop structure in iteration order: axis 0 is innermost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KernelPlan {
    pub(crate) dims: Vec<usize>,
    pub(crate) strides: Vec<Vec<isize>>,
    pub(crate) blocks: Vec<usize>,
}

impl KernelPlan {
    pub(crate) fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Plan for a zero-element iteration space; it must never be walked.
    pub(crate) fn empty(streams: usize) -> Self {
        Self {
            dims: Vec::new(),
            strides: vec![Vec::new(); streams],
            blocks: Vec::new(),
        }
    }
}

/// Build a fused, compressed and blocked plan.
///
/// Pipeline: order → reorder → fuse → compress → block. Ordering first lets
/// fusion catch contiguity in any memory layout (row-major, column-major or
/// permuted). Extent-1 axes are dropped, so a plan for a single element has
/// rank 0.
pub(crate) fn build_plan(
    dims: &[usize],
    strides_list: &[&[isize]],
    elem_sizes: &[usize],
    dest_index: Option<usize>,
) -> KernelPlan {
    let order = order::compute_order(dims, strides_list, dest_index);

    let ordered_dims: Vec<usize> = order.iter().map(|&d| dims[d]).collect();
    let ordered_strides: Vec<Vec<isize>> = strides_list
        .iter()
        .map(|strides| order.iter().map(|&d| strides[d]).collect())
        .collect();
    let ordered_refs: Vec<&[isize]> = ordered_strides.iter().map(|s| s.as_slice()).collect();

    let fused_dims = fuse_dims(&ordered_dims, &ordered_refs);
    let (dims, strides) = compress_dims(&fused_dims, &ordered_strides);

    let refs: Vec<&[isize]> = strides.iter().map(|s| s.as_slice()).collect();
    let blocks = block::compute_block_sizes(&dims, &refs, elem_sizes);

    KernelPlan {
        dims,
        strides,
        blocks,
    }
}

/// Walk every position of `plan` once, calling `f(offsets, len, inner_strides)`
/// for each innermost run. Offsets and strides are in elements, one per stream.
///
/// The caller must skip plans with zero elements.
pub(crate) fn for_each_inner_block<F>(plan: &KernelPlan, mut f: F)
where
    F: FnMut(&[isize], usize, &[isize]),
{
    let streams = plan.strides.len();
    let mut offsets = vec![0isize; streams];
    match plan.rank() {
        0 => {
            let zeros = vec![0isize; streams];
            f(&offsets, 1, &zeros);
        }
        1 => kernel_1d_inner(plan, &mut offsets, &mut f),
        2 => kernel_2d_inner(plan, &mut offsets, &mut f),
        _ => kernel_nd_inner(plan, &mut offsets, &mut f),
    }
}

#[inline]
fn advance(offsets: &mut [isize], strides: &[Vec<isize>], axis: usize, times: isize) {
    for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
        *offset += times * s[axis];
    }
}

fn kernel_1d_inner<F>(plan: &KernelPlan, offsets: &mut [isize], f: &mut F)
where
    F: FnMut(&[isize], usize, &[isize]),
{
    let d0 = plan.dims[0];
    let b0 = plan.blocks[0].max(1).min(d0);
    let inner: Vec<isize> = plan.strides.iter().map(|s| s[0]).collect();

    let mut j0 = 0usize;
    while j0 < d0 {
        let blen = b0.min(d0 - j0);
        f(offsets, blen, &inner);
        advance(offsets, &plan.strides, 0, blen as isize);
        j0 += blen;
    }
}

/// Outer loop over axis 1 in blocks, callback over axis 0.
fn kernel_2d_inner<F>(plan: &KernelPlan, offsets: &mut [isize], f: &mut F)
where
    F: FnMut(&[isize], usize, &[isize]),
{
    let (d0, d1) = (plan.dims[0], plan.dims[1]);
    let b0 = plan.blocks[0].max(1).min(d0);
    let b1 = plan.blocks[1].max(1).min(d1);
    let strides = &plan.strides;
    let inner: Vec<isize> = strides.iter().map(|s| s[0]).collect();

    let mut j1 = 0usize;
    while j1 < d1 {
        let blen1 = b1.min(d1 - j1);
        let mut j0 = 0usize;
        while j0 < d0 {
            let blen0 = b0.min(d0 - j0);
            for _ in 0..blen1 {
                f(offsets, blen0, &inner);
                advance(offsets, strides, 1, 1);
            }
            advance(offsets, strides, 1, -(blen1 as isize));
            advance(offsets, strides, 0, blen0 as isize);
            j0 += blen0;
        }
        advance(offsets, strides, 0, -(d0 as isize));
        advance(offsets, strides, 1, blen1 as isize);
        j1 += blen1;
    }
}

/// Rank >= 3: blocked innermost axis, odometer-style carry over the outer axes.
///
/// Only the innermost axis is blocked here; outer axes are walked in full.
fn kernel_nd_inner<F>(plan: &KernelPlan, offsets: &mut [isize], f: &mut F)
where
    F: FnMut(&[isize], usize, &[isize]),
{
    let rank = plan.rank();
    let dims = &plan.dims;
    let strides = &plan.strides;
    let d0 = dims[0];
    let b0 = plan.blocks[0].max(1).min(d0);
    let inner: Vec<isize> = strides.iter().map(|s| s[0]).collect();

    let mut idx = vec![0usize; rank];
    loop {
        let mut j0 = 0usize;
        while j0 < d0 {
            let blen0 = b0.min(d0 - j0);
            f(offsets, blen0, &inner);
            advance(offsets, strides, 0, blen0 as isize);
            j0 += blen0;
        }
        advance(offsets, strides, 0, -(d0 as isize));

        let mut level = 1usize;
        loop {
            advance(offsets, strides, level, 1);
            idx[level] += 1;
            if idx[level] < dims[level] {
                break;
            }
            idx[level] = 0;
            advance(offsets, strides, level, -(dims[level] as isize));
            level += 1;
            if level == rank {
                return;
            }
        }
    }
}

// ============================================================================
// Layout helpers
// ============================================================================

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ContiguousLayout {
    /// Last axis varies fastest.
    RowMajor,
    /// First axis varies fastest.
    ColMajor,
}

/// Whether `(dims, strides)` is densely packed in `layout`. Extent-1 axes are ignored.
pub(crate) fn is_contiguous_in(dims: &[usize], strides: &[isize], layout: ContiguousLayout) -> bool {
    if dims.len() != strides.len() {
        return false;
    }
    let mut expected = 1isize;
    let mut check = |dim: usize, stride: isize| {
        if dim <= 1 {
            return true;
        }
        if stride != expected {
            return false;
        }
        expected = expected.saturating_mul(dim as isize);
        true
    };
    match layout {
        ContiguousLayout::RowMajor => dims
            .iter()
            .rev()
            .zip(strides.iter().rev())
            .all(|(&d, &s)| check(d, s)),
        ContiguousLayout::ColMajor => dims
            .iter()
            .zip(strides.iter())
            .all(|(&d, &s)| check(d, s)),
    }
}
