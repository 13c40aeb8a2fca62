//! Dimension fusion and stride bookkeeping for the six-stream loop.
//!
//! Follows the Strided.jl `_mapreduce_fuse!` / `_mapreduce_order!` scheme:
//! adjacent axes that are contiguous in *every* stream collapse into one, and
//! axes are ranked by how small their strides are across streams.

/// Fuse axis `i` into axis `i - 1` whenever every stream satisfies
/// `strides[i] == dims[i - 1] * strides[i - 1]`.
///
/// Fused-away axes are left in place with extent 1; [`compress_dims`] drops them.
pub(crate) fn fuse_dims(dims: &[usize], all_strides: &[&[isize]]) -> Vec<usize> {
    let n = dims.len();
    let mut result = dims.to_vec();
    if n <= 1 || all_strides.is_empty() {
        return result;
    }

    for i in (1..n).rev() {
        let mergeable = all_strides
            .iter()
            .all(|s| (result[i - 1] as isize).checked_mul(s[i - 1]) == Some(s[i]));
        if mergeable {
            result[i - 1] *= result[i];
            result[i] = 1;
        }
    }
    result
}

/// Remove extent-1 axes from `dims` and from each stride vector.
pub(crate) fn compress_dims(
    dims: &[usize],
    all_strides: &[Vec<isize>],
) -> (Vec<usize>, Vec<Vec<isize>>) {
    let keep: Vec<usize> = (0..dims.len()).filter(|&i| dims[i] != 1).collect();
    let out_dims = keep.iter().map(|&i| dims[i]).collect();
    let out_strides = all_strides
        .iter()
        .map(|s| keep.iter().map(|&i| s[i]).collect())
        .collect();
    (out_dims, out_strides)
}

/// Relative rank of each stride among the non-zero strides; zero strides rank 1.
pub(crate) fn index_order(strides: &[isize]) -> Vec<usize> {
    strides
        .iter()
        .map(|&si| {
            let si = si.unsigned_abs();
            if si == 0 {
                return 1;
            }
            1 + strides
                .iter()
                .filter(|&&s| s != 0 && s.unsigned_abs() < si)
                .count()
        })
        .collect()
}

/// Bit-packed importance per axis. The first stream counts twice; extent-1
/// axes get importance 0 so they sort last.
pub(crate) fn compute_importance(dims: &[usize], index_orders: &[Vec<usize>]) -> Vec<u64> {
    let n = dims.len();
    let m = index_orders.len();
    if n == 0 || m == 0 {
        return vec![];
    }

    // bits needed to sum m weighted contributions without carrying into the next field
    let g = (64 - (m as u64 + 1).leading_zeros()) as u64;

    let mut importance = vec![0u64; n];
    for (k, orders) in index_orders.iter().enumerate() {
        let weight = if k == 0 { 2 } else { 1 };
        for i in 0..n {
            let shift = g * (n - orders[i]) as u64;
            importance[i] = importance[i].saturating_add(weight * (1u64 << shift.min(62)));
        }
    }
    for i in 0..n {
        if dims[i] <= 1 {
            importance[i] = 0;
        }
    }
    importance
}

/// Indices sorting `importance` in descending order (stable).
pub(crate) fn sort_by_importance(importance: &[u64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..importance.len()).collect();
    indices.sort_by(|&a, &b| importance[b].cmp(&importance[a]));
    indices
}

/// Per-axis blocking cost: `2 * min |stride|`, or 1 for an all-broadcast axis.
pub(crate) fn compute_costs(all_strides: &[&[isize]]) -> Vec<isize> {
    let Some(first) = all_strides.first() else {
        return vec![];
    };
    let mut costs = vec![isize::MAX; first.len()];
    for strides in all_strides {
        for (c, &s) in costs.iter_mut().zip(strides.iter()) {
            *c = (*c).min(s.checked_abs().unwrap_or(isize::MAX));
        }
    }
    for c in &mut costs {
        *c = if *c == 0 { 1 } else { c.saturating_mul(2) };
    }
    costs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuse_dims_contiguous() {
        let s1 = [1isize, 3];
        let s2 = [1isize, 3];
        assert_eq!(fuse_dims(&[3, 4], &[&s1, &s2]), vec![12, 1]);
    }

    #[test]
    fn test_fuse_dims_needs_every_stream() {
        let data = [1isize, 3];
        let mask = [1isize, 10];
        assert_eq!(fuse_dims(&[3, 4], &[&data, &mask]), vec![3, 4]);
    }

    #[test]
    fn test_fuse_dims_broadcast_axes() {
        // both streams broadcast along the first two axes
        let a = [0isize, 0, 1];
        let b = [0isize, 0, 1];
        assert_eq!(fuse_dims(&[2, 3, 5], &[&a, &b]), vec![6, 1, 5]);
    }

    #[test]
    fn test_fuse_dims_partial() {
        let s = [1isize, 2, 100];
        assert_eq!(fuse_dims(&[2, 3, 4], &[&s]), vec![6, 1, 4]);
    }

    #[test]
    fn test_compress_dims() {
        let strides = vec![vec![1isize, 6, 0], vec![2isize, 12, 7]];
        let (dims, strides) = compress_dims(&[6, 1, 4], &strides);
        assert_eq!(dims, vec![6, 4]);
        assert_eq!(strides, vec![vec![1, 0], vec![2, 7]]);
    }

    #[test]
    fn test_index_order() {
        assert_eq!(index_order(&[4, 1, 2]), vec![3, 1, 2]);
        assert_eq!(index_order(&[4, 0, 2]), vec![2, 1, 1]);
        assert_eq!(index_order(&[-4, 1, -2]), vec![3, 1, 2]);
        assert_eq!(index_order(&[2, 2, 1]), vec![2, 2, 1]);
    }

    #[test]
    fn test_importance_prefers_first_stream() {
        // first stream column-major, second row-major
        let orders = vec![index_order(&[1, 4]), index_order(&[5, 1])];
        let importance = compute_importance(&[4, 5], &orders);
        assert!(importance[0] > importance[1]);
    }

    #[test]
    fn test_importance_zero_for_unit_axes() {
        let orders = vec![index_order(&[1, 4])];
        let importance = compute_importance(&[4, 1], &orders);
        assert_eq!(importance[1], 0);
    }

    #[test]
    fn test_sort_by_importance() {
        assert_eq!(sort_by_importance(&[100, 50, 200, 10]), vec![2, 0, 1, 3]);
    }

    #[test]
    fn test_compute_costs() {
        let s1 = [1isize, 4, 0];
        let s2 = [2isize, 1, 0];
        assert_eq!(compute_costs(&[&s1, &s2]), vec![2, 2, 1]);
    }
}
