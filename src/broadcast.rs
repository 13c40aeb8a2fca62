//! Shape broadcasting with trailing-axis alignment.
//!
//! Shapes are aligned from the last axis. A pair of extents is compatible when
//! they are equal or one of them is 1; axes missing on the left count as 1.
//! Broadcast axes are iterated with stride 0.

use crate::ShapeError;

/// Common broadcast shape of two operands.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>, ShapeError> {
    let rank = a.len().max(b.len());
    let mut out = vec![1usize; rank];
    for (k, slot) in out.iter_mut().enumerate() {
        let da = extent_at(a, rank, k);
        let db = extent_at(b, rank, k);
        *slot = if da == db || db == 1 {
            da
        } else if da == 1 {
            db
        } else {
            return Err(ShapeError::Incompatible {
                a: a.to_vec(),
                b: b.to_vec(),
            });
        };
    }
    Ok(out)
}

/// Extent of `dims` on axis `k` of a rank-`rank` target, padding on the left with 1.
#[inline]
fn extent_at(dims: &[usize], rank: usize, k: usize) -> usize {
    let pad = rank - dims.len();
    if k < pad {
        1
    } else {
        dims[k - pad]
    }
}

/// Strides that walk `src_dims` over the `target` shape.
///
/// Missing leading axes and extent-1 axes get stride 0. The caller must have
/// obtained `target` from [`broadcast_shape`]; an extent that is neither equal
/// nor 1 is reported as incompatible.
pub(crate) fn broadcast_strides(
    target: &[usize],
    src_dims: &[usize],
    src_strides: &[isize],
) -> Result<Vec<isize>, ShapeError> {
    debug_assert_eq!(src_dims.len(), src_strides.len());
    let rank = target.len();
    let incompatible = || ShapeError::Incompatible {
        a: src_dims.to_vec(),
        b: target.to_vec(),
    };
    if src_dims.len() > rank {
        return Err(incompatible());
    }
    let pad = rank - src_dims.len();
    let mut out = vec![0isize; rank];
    for k in pad..rank {
        let sdim = src_dims[k - pad];
        let tdim = target[k];
        if sdim == 1 {
            out[k] = 0;
        } else if sdim == tdim {
            out[k] = src_strides[k - pad];
        } else {
            return Err(incompatible());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_shape_basic() {
        assert_eq!(broadcast_shape(&[2, 3], &[1, 3]).unwrap(), vec![2, 3]);
        assert_eq!(broadcast_shape(&[3, 1], &[1, 4]).unwrap(), vec![3, 4]);
    }

    #[test]
    fn test_broadcast_shape_rank_padding() {
        assert_eq!(broadcast_shape(&[4], &[2, 3, 4]).unwrap(), vec![2, 3, 4]);
        assert_eq!(broadcast_shape(&[], &[5]).unwrap(), vec![5]);
        assert!(broadcast_shape(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn test_broadcast_shape_zero_extent() {
        assert_eq!(broadcast_shape(&[0], &[1]).unwrap(), vec![0]);
        assert_eq!(broadcast_shape(&[2, 0], &[2, 1]).unwrap(), vec![2, 0]);
        assert!(broadcast_shape(&[0], &[3]).is_err());
    }

    #[test]
    fn test_broadcast_shape_incompatible() {
        let err = broadcast_shape(&[2], &[3]).unwrap_err();
        assert_eq!(
            err,
            ShapeError::Incompatible {
                a: vec![2],
                b: vec![3]
            }
        );
    }

    #[test]
    fn test_broadcast_strides() {
        let promoted = broadcast_strides(&[3, 4], &[3, 1], &[1, 1]).unwrap();
        assert_eq!(promoted, vec![1, 0]);

        let promoted = broadcast_strides(&[2, 3, 4], &[4], &[2]).unwrap();
        assert_eq!(promoted, vec![0, 0, 2]);

        assert!(broadcast_strides(&[3], &[2, 3], &[3, 1]).is_err());
        assert!(broadcast_strides(&[4], &[3], &[1]).is_err());
    }
}
