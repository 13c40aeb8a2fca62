//! Cache blocking, after Strided.jl's `_computeblocks` and `totalmemoryregion`.
//!
//! Streams have different element widths (8-byte `f64` data, 1-byte validity
//! codes, narrower input types), so the memory-region estimate works on byte
//! strides computed per stream rather than on one shared element size.

use crate::fuse::{compute_costs, index_order};
use crate::{BLOCK_MEMORY_SIZE, CACHE_LINE_SIZE};

/// Block sizes for `dims`, which must already be in iteration order.
///
/// Steps:
/// 1. byte strides and stride orders per stream
/// 2. the whole iteration space if it fits in [`BLOCK_MEMORY_SIZE`]
/// 3. otherwise cost-weighted halving, then decrementing, of the block extents
///
/// # Arguments
/// * `dims` - extents in iteration order (innermost first)
/// * `strides_list` - element strides, one slice per stream
/// * `elem_sizes` - byte width of each stream, parallel to `strides_list`
///
/// # Returns
/// One block extent per axis, each in `1..=dims[i]`.
pub(crate) fn compute_block_sizes(
    dims: &[usize],
    strides_list: &[&[isize]],
    elem_sizes: &[usize],
) -> Vec<usize> {
    if dims.is_empty() {
        return Vec::new();
    }
    debug_assert_eq!(strides_list.len(), elem_sizes.len());

    let byte_strides: Vec<Vec<isize>> = strides_list
        .iter()
        .zip(elem_sizes.iter())
        .map(|(strides, &size)| {
            strides
                .iter()
                .map(|&s| s.saturating_mul(size as isize))
                .collect()
        })
        .collect();
    let stride_orders: Vec<Vec<usize>> = byte_strides.iter().map(|bs| index_order(bs)).collect();
    let costs = compute_costs(strides_list);

    let byte_stride_refs: Vec<&[isize]> = byte_strides.iter().map(|s| s.as_slice()).collect();
    let stride_order_refs: Vec<&[usize]> = stride_orders.iter().map(|s| s.as_slice()).collect();

    compute_blocks(
        dims,
        &costs,
        &byte_stride_refs,
        &stride_order_refs,
        BLOCK_MEMORY_SIZE,
    )
}

/// Recursive block reduction.
///
/// # Julia equivalent
/// ```julia
/// function _computeblocks(dims, costs, bytestrides, strideorders, blocksize)
///     if totalmemoryregion(dims, bytestrides) <= blocksize
///         return dims
///     end
///     if all(equalto(1), map(first, strideorders))
///         return (dims[1], _computeblocks(tail(dims), tail(costs), ...)...)
///     end
///     if minimum(minimum, bytestrides) > blocksize
///         return map(_ -> 1, dims)
///     end
///     # halve the costliest block until within 2x, then decrement
/// end
/// ```
fn compute_blocks(
    dims: &[usize],
    costs: &[isize],
    byte_strides: &[&[isize]],
    stride_orders: &[&[usize]],
    block_size: usize,
) -> Vec<usize> {
    let n = dims.len();
    if n == 0 {
        return vec![];
    }

    if total_memory_region(dims, byte_strides) <= block_size {
        return dims.to_vec();
    }

    // Innermost axis already has the smallest stride everywhere: keep it whole.
    let min_order = stride_orders
        .iter()
        .filter_map(|orders| orders.iter().min().copied())
        .min()
        .unwrap_or(1);
    if stride_orders
        .iter()
        .all(|orders| !orders.is_empty() && orders[0] == min_order)
    {
        let tail_strides: Vec<&[isize]> = byte_strides.iter().map(|s| &s[1..]).collect();
        let tail_orders: Vec<&[usize]> = stride_orders.iter().map(|s| &s[1..]).collect();
        let mut result = vec![dims[0]];
        result.extend(compute_blocks(
            &dims[1..],
            &costs[1..],
            &tail_strides,
            &tail_orders,
            block_size,
        ));
        return result;
    }

    let min_stride = byte_strides
        .iter()
        .filter_map(|s| s.iter().map(|x| x.unsigned_abs()).min())
        .min()
        .unwrap_or(0);
    if min_stride > block_size {
        return vec![1; n];
    }

    let mut blocks = dims.to_vec();

    // Halve until within 2x of the target, then decrement.
    while total_memory_region(&blocks, byte_strides) >= 2 * block_size {
        match last_argmax_weighted(&blocks, costs) {
            Some(i) => blocks[i] = (blocks[i] + 1) / 2,
            None => break,
        }
    }
    while total_memory_region(&blocks, byte_strides) > block_size {
        match last_argmax_weighted(&blocks, costs) {
            Some(i) => blocks[i] -= 1,
            None => break,
        }
    }

    blocks
}

/// Bytes touched by one block, counted in whole cache lines per stream.
///
/// Strides below a cache line add to a contiguous run; larger strides multiply
/// the number of separate line blocks. Saturates instead of overflowing.
///
/// # Julia equivalent
/// ```julia
/// function totalmemoryregion(dims, bytestrides)
///     memoryregion = 0
///     for strides in bytestrides
///         numcontigeouscachelines = 0
///         numcachelineblocks = 1
///         for (d, s) in zip(dims, strides)
///             if s < _cachelinelength
///                 numcontigeouscachelines += (d - 1) * s
///             else
///                 numcachelineblocks *= d
///             end
///         end
///         numcontigeouscachelines = div(numcontigeouscachelines, _cachelinelength) + 1
///         memoryregion += _cachelinelength * numcontigeouscachelines * numcachelineblocks
///     end
///     return memoryregion
/// end
/// ```
fn total_memory_region(dims: &[usize], byte_strides: &[&[isize]]) -> usize {
    let mut region = 0usize;
    for strides in byte_strides {
        let mut contiguous_bytes = 0usize;
        let mut line_blocks = 1usize;
        for (&d, &s) in dims.iter().zip(strides.iter()) {
            let s = s.unsigned_abs();
            if s < CACHE_LINE_SIZE {
                contiguous_bytes =
                    contiguous_bytes.saturating_add(d.saturating_sub(1).saturating_mul(s));
            } else {
                line_blocks = line_blocks.saturating_mul(d);
            }
        }
        let lines = contiguous_bytes / CACHE_LINE_SIZE + 1;
        region = region.saturating_add(
            CACHE_LINE_SIZE
                .saturating_mul(lines)
                .saturating_mul(line_blocks),
        );
    }
    region
}

/// Last index maximizing `(blocks[i] - 1) * costs[i]` among blocks > 1.
///
/// Ties go to the outermost axis, so inner extents shrink last. `None` once
/// every block is down to 1.
fn last_argmax_weighted(blocks: &[usize], costs: &[isize]) -> Option<usize> {
    let mut best = 0isize;
    let mut best_idx = None;
    for (i, (&b, &c)) in blocks.iter().zip(costs.iter()).enumerate() {
        if b <= 1 {
            continue;
        }
        let score = (b as isize - 1).saturating_mul(c);
        if score >= best {
            best = score;
            best_idx = Some(i);
        }
    }
    best_idx
}
