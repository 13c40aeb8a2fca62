//! Loop ordering.
//!
//! Axes are sorted by importance so that the axis with the smallest strides
//! (weighted towards the output stream) becomes the innermost loop.

use crate::fuse::{compute_importance, index_order, sort_by_importance};

/// Iteration order for `dims`, innermost axis first.
///
/// `dest_index` names the stream whose strides weigh double (the output data).
pub(crate) fn compute_order(
    dims: &[usize],
    strides_list: &[&[isize]],
    dest_index: Option<usize>,
) -> Vec<usize> {
    let rank = dims.len();
    if rank == 0 {
        return Vec::new();
    }
    if strides_list.is_empty() {
        return (0..rank).collect();
    }

    let mut orders: Vec<Vec<usize>> = strides_list.iter().map(|s| index_order(s)).collect();
    if let Some(dest) = dest_index.filter(|&d| d != 0 && d < orders.len()) {
        let dest_order = orders.remove(dest);
        orders.insert(0, dest_order);
    }

    sort_by_importance(&compute_importance(dims, &orders))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_order_column_major() {
        let strides = [1isize, 4];
        let order = compute_order(&[4, 5], &[&strides], Some(0));
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_compute_order_row_major() {
        let strides = [5isize, 1];
        let order = compute_order(&[4, 5], &[&strides], Some(0));
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn test_output_wins_tie() {
        // output row-major, one input column-major
        let out = [5isize, 1];
        let input = [1isize, 4];
        let order = compute_order(&[4, 5], &[&out, &input], Some(0));
        assert_eq!(order[0], 1);

        // same streams with the output listed second
        let order = compute_order(&[4, 5], &[&input, &out], Some(1));
        assert_eq!(order[0], 1);
    }

    #[test]
    fn test_broadcast_axis_goes_outside() {
        // input broadcast along axis 0, output row-major
        let out = [4isize, 1];
        let input = [0isize, 1];
        let order = compute_order(&[3, 4], &[&out, &input], Some(0));
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn test_rank_zero() {
        assert!(compute_order(&[], &[], Some(0)).is_empty());
    }
}
