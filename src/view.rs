//! Strided arrays paired with a validity mask.
//!
//! - [`MaskedView`]: borrowed, read-only data + mask
//! - [`MaskedViewMut`]: borrowed, writable data + mask
//! - [`MaskedArray`]: owned data + mask
//!
//! Data and mask share `dims` but keep their own strides and offsets, so a
//! mask can be laid out independently of its data (for example a single mask
//! row reused with stride 0).

use std::sync::Arc;

use crate::validity::Validity;
use crate::{Result, SpdivError};

// ============================================================================
// Layout helpers
// ============================================================================

/// Validate that every offset reachable from `(dims, strides, offset)` lies in `[0, len)`.
fn validate_bounds(len: usize, dims: &[usize], strides: &[isize], offset: isize) -> Result<()> {
    if dims.len() != strides.len() {
        return Err(SpdivError::StrideLengthMismatch);
    }
    if dims.iter().any(|&d| d == 0) {
        return Ok(());
    }
    let mut min_offset = offset;
    let mut max_offset = offset;
    for (&dim, &stride) in dims.iter().zip(strides.iter()) {
        if dim > 1 {
            let end = stride
                .checked_mul(dim as isize - 1)
                .ok_or(SpdivError::OffsetOverflow)?;
            if end >= 0 {
                max_offset = max_offset
                    .checked_add(end)
                    .ok_or(SpdivError::OffsetOverflow)?;
            } else {
                min_offset = min_offset
                    .checked_add(end)
                    .ok_or(SpdivError::OffsetOverflow)?;
            }
        }
    }
    if min_offset < 0 || max_offset as usize >= len {
        return Err(SpdivError::OffsetOverflow);
    }
    Ok(())
}

/// Column-major strides: first index varies fastest.
pub fn col_major_strides(dims: &[usize]) -> Vec<isize> {
    let mut strides = vec![1isize; dims.len()];
    for i in 1..dims.len() {
        strides[i] = strides[i - 1] * dims[i - 1].max(1) as isize;
    }
    strides
}

/// Row-major strides: last index varies fastest.
pub fn row_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    let mut strides = vec![1isize; rank];
    for i in (0..rank.saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1].max(1) as isize;
    }
    strides
}

/// Memory order of a freshly allocated array.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MemoryOrder {
    /// Follow the memory order of the input operands.
    #[default]
    Keep,
    RowMajor,
    ColMajor,
}

#[inline]
fn linear_offset(indices: &[usize], dims: &[usize], strides: &[isize], offset: isize) -> isize {
    assert_eq!(indices.len(), dims.len(), "wrong number of indices");
    let mut idx = offset;
    for (i, &index) in indices.iter().enumerate() {
        assert!(
            index < dims[i],
            "index {} out of bounds for dim {}",
            index,
            dims[i]
        );
        idx += index as isize * strides[i];
    }
    idx
}

fn checked_perm(perm: &[usize], rank: usize) -> Result<()> {
    if perm.len() != rank {
        return Err(SpdivError::RankMismatch(perm.len(), rank));
    }
    let mut seen = vec![false; rank];
    for &p in perm {
        if p >= rank || seen[p] {
            return Err(SpdivError::InvalidAxis { axis: p, rank });
        }
        seen[p] = true;
    }
    Ok(())
}

/// Element count of `dims`, or `None` on overflow.
pub(crate) fn checked_len(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// Data and mask buffers must both hold exactly one element per position of `dims`.
fn check_dense_lens(data: usize, mask: usize, dims: &[usize]) -> Result<()> {
    if data != mask {
        return Err(SpdivError::MaskShapeMismatch { data, mask });
    }
    let expected = checked_len(dims).ok_or(SpdivError::OffsetOverflow)?;
    if data != expected {
        return Err(SpdivError::DataLengthMismatch {
            expected,
            got: data,
        });
    }
    Ok(())
}

// ============================================================================
// MaskedView
// ============================================================================

/// Read-only strided view over data and its validity mask.
pub struct MaskedView<'a, T> {
    data: &'a [T],
    mask: &'a [Validity],
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
    mask_strides: Arc<[isize]>,
    mask_offset: isize,
}

impl<T> Clone for MaskedView<'_, T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            mask: self.mask,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            mask_strides: self.mask_strides.clone(),
            mask_offset: self.mask_offset,
        }
    }
}

impl<T> std::fmt::Debug for MaskedView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskedView")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .field("mask_strides", &self.mask_strides)
            .field("mask_offset", &self.mask_offset)
            .finish()
    }
}

impl<'a, T> MaskedView<'a, T> {
    /// Create a view whose mask uses the same strides and offset as the data.
    pub fn new(
        data: &'a [T],
        mask: &'a [Validity],
        dims: &[usize],
        strides: &[isize],
        offset: isize,
    ) -> Result<Self> {
        Self::with_mask_layout(data, mask, dims, strides, offset, strides, offset)
    }

    /// Create a view with an independent mask layout.
    pub fn with_mask_layout(
        data: &'a [T],
        mask: &'a [Validity],
        dims: &[usize],
        strides: &[isize],
        offset: isize,
        mask_strides: &[isize],
        mask_offset: isize,
    ) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        validate_bounds(mask.len(), dims, mask_strides, mask_offset)?;
        Ok(Self {
            data,
            mask,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
            mask_strides: Arc::from(mask_strides),
            mask_offset,
        })
    }

    /// Row-major contiguous view over `data` and `mask`.
    pub fn contiguous(data: &'a [T], mask: &'a [Validity], dims: &[usize]) -> Result<Self> {
        check_dense_lens(data.len(), mask.len(), dims)?;
        Self::new(data, mask, dims, &row_major_strides(dims), 0)
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn mask_strides(&self) -> &[isize] {
        &self.mask_strides
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    /// Pointer to the element at the view's base offset.
    #[inline]
    pub(crate) fn data_ptr(&self) -> *const T {
        self.data.as_ptr().wrapping_offset(self.offset)
    }

    /// Pointer to the mask code at the view's base mask offset.
    #[inline]
    pub(crate) fn mask_ptr(&self) -> *const Validity {
        self.mask.as_ptr().wrapping_offset(self.mask_offset)
    }

    /// Permute axes without copying.
    pub fn permute(&self, perm: &[usize]) -> Result<MaskedView<'a, T>> {
        checked_perm(perm, self.ndim())?;
        let dims: Vec<usize> = perm.iter().map(|&p| self.dims[p]).collect();
        let strides: Vec<isize> = perm.iter().map(|&p| self.strides[p]).collect();
        let mask_strides: Vec<isize> = perm.iter().map(|&p| self.mask_strides[p]).collect();
        Ok(MaskedView {
            data: self.data,
            mask: self.mask,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset: self.offset,
            mask_strides: Arc::from(mask_strides),
            mask_offset: self.mask_offset,
        })
    }

    /// Reverse the traversal direction of `axis` (negative stride), without copying.
    pub fn reversed(&self, axis: usize) -> Result<MaskedView<'a, T>> {
        let rank = self.ndim();
        if axis >= rank {
            return Err(SpdivError::InvalidAxis { axis, rank });
        }
        let extent = self.dims[axis];
        if extent == 0 {
            return Ok(self.clone());
        }
        let last = extent as isize - 1;
        let mut strides = self.strides.to_vec();
        let mut mask_strides = self.mask_strides.to_vec();
        let offset = self.offset + last * strides[axis];
        let mask_offset = self.mask_offset + last * mask_strides[axis];
        strides[axis] = -strides[axis];
        mask_strides[axis] = -mask_strides[axis];
        Ok(MaskedView {
            data: self.data,
            mask: self.mask,
            dims: self.dims.clone(),
            strides: Arc::from(strides),
            offset,
            mask_strides: Arc::from(mask_strides),
            mask_offset,
        })
    }
}

impl<T: Copy> MaskedView<'_, T> {
    /// Data at `indices`, regardless of validity.
    pub fn get(&self, indices: &[usize]) -> T {
        let idx = linear_offset(indices, &self.dims, &self.strides, self.offset);
        self.data[idx as usize]
    }

    pub fn validity(&self, indices: &[usize]) -> Validity {
        let idx = linear_offset(indices, &self.dims, &self.mask_strides, self.mask_offset);
        self.mask[idx as usize]
    }

    /// `Some(data)` when exposed, `None` when hidden.
    pub fn value(&self, indices: &[usize]) -> Option<T> {
        self.validity(indices).is_exposed().then(|| self.get(indices))
    }
}

// ============================================================================
// MaskedViewMut
// ============================================================================

/// Writable strided view over data and its validity mask.
pub struct MaskedViewMut<'a, T> {
    data: &'a mut [T],
    mask: &'a mut [Validity],
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
    mask_strides: Arc<[isize]>,
    mask_offset: isize,
}

impl<T> std::fmt::Debug for MaskedViewMut<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskedViewMut")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .field("mask_strides", &self.mask_strides)
            .field("mask_offset", &self.mask_offset)
            .finish()
    }
}

impl<'a, T> MaskedViewMut<'a, T> {
    /// Create a writable view whose mask uses the same strides and offset as the data.
    pub fn new(
        data: &'a mut [T],
        mask: &'a mut [Validity],
        dims: &[usize],
        strides: &[isize],
        offset: isize,
    ) -> Result<Self> {
        Self::with_mask_layout(data, mask, dims, strides, offset, strides, offset)
    }

    /// Create a writable view with an independent mask layout.
    pub fn with_mask_layout(
        data: &'a mut [T],
        mask: &'a mut [Validity],
        dims: &[usize],
        strides: &[isize],
        offset: isize,
        mask_strides: &[isize],
        mask_offset: isize,
    ) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        validate_bounds(mask.len(), dims, mask_strides, mask_offset)?;
        Ok(Self {
            data,
            mask,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
            mask_strides: Arc::from(mask_strides),
            mask_offset,
        })
    }

    /// Row-major contiguous writable view.
    pub fn contiguous(data: &'a mut [T], mask: &'a mut [Validity], dims: &[usize]) -> Result<Self> {
        check_dense_lens(data.len(), mask.len(), dims)?;
        let strides = row_major_strides(dims);
        Self::new(data, mask, dims, &strides, 0)
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn mask_strides(&self) -> &[isize] {
        &self.mask_strides
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    #[inline]
    pub(crate) fn data_ptr_mut(&mut self) -> *mut T {
        self.data.as_mut_ptr().wrapping_offset(self.offset)
    }

    #[inline]
    pub(crate) fn mask_ptr_mut(&mut self) -> *mut Validity {
        self.mask.as_mut_ptr().wrapping_offset(self.mask_offset)
    }

    /// Shorter-lived writable view over the same memory.
    pub fn reborrow(&mut self) -> MaskedViewMut<'_, T> {
        MaskedViewMut {
            data: &mut *self.data,
            mask: &mut *self.mask,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            mask_strides: self.mask_strides.clone(),
            mask_offset: self.mask_offset,
        }
    }

    /// Read-only view over the same memory.
    pub fn as_view(&self) -> MaskedView<'_, T> {
        MaskedView {
            data: &*self.data,
            mask: &*self.mask,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            mask_strides: self.mask_strides.clone(),
            mask_offset: self.mask_offset,
        }
    }

    /// Permute axes, consuming the view.
    pub fn permute(self, perm: &[usize]) -> Result<MaskedViewMut<'a, T>> {
        checked_perm(perm, self.ndim())?;
        let dims: Vec<usize> = perm.iter().map(|&p| self.dims[p]).collect();
        let strides: Vec<isize> = perm.iter().map(|&p| self.strides[p]).collect();
        let mask_strides: Vec<isize> = perm.iter().map(|&p| self.mask_strides[p]).collect();
        Ok(MaskedViewMut {
            data: self.data,
            mask: self.mask,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset: self.offset,
            mask_strides: Arc::from(mask_strides),
            mask_offset: self.mask_offset,
        })
    }
}

impl<T: Copy> MaskedViewMut<'_, T> {
    pub fn get(&self, indices: &[usize]) -> T {
        let idx = linear_offset(indices, &self.dims, &self.strides, self.offset);
        self.data[idx as usize]
    }

    pub fn validity(&self, indices: &[usize]) -> Validity {
        let idx = linear_offset(indices, &self.dims, &self.mask_strides, self.mask_offset);
        self.mask[idx as usize]
    }

    /// Store an exposed value.
    pub fn set(&mut self, indices: &[usize], value: T) {
        let idx = linear_offset(indices, &self.dims, &self.strides, self.offset);
        let midx = linear_offset(indices, &self.dims, &self.mask_strides, self.mask_offset);
        self.data[idx as usize] = value;
        self.mask[midx as usize] = Validity::Exposed;
    }

    /// Mark an element hidden, leaving its data untouched.
    pub fn set_hidden(&mut self, indices: &[usize]) {
        let midx = linear_offset(indices, &self.dims, &self.mask_strides, self.mask_offset);
        self.mask[midx as usize] = Validity::Hidden;
    }
}

// ============================================================================
// MaskedArray
// ============================================================================

/// Owned strided array with a validity mask.
pub struct MaskedArray<T> {
    data: Vec<T>,
    mask: Vec<Validity>,
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
    mask_strides: Arc<[isize]>,
    mask_offset: isize,
}

impl<T: Clone> Clone for MaskedArray<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            mask: self.mask.clone(),
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            mask_strides: self.mask_strides.clone(),
            mask_offset: self.mask_offset,
        }
    }
}

impl<T> std::fmt::Debug for MaskedArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskedArray")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("mask_strides", &self.mask_strides)
            .finish()
    }
}

impl<T: Clone + Default> MaskedArray<T> {
    /// Row-major array of default values, all hidden.
    pub fn row_major(dims: &[usize]) -> Self {
        Self::filled(dims, row_major_strides(dims))
    }

    /// Column-major array of default values, all hidden.
    pub fn col_major(dims: &[usize]) -> Self {
        Self::filled(dims, col_major_strides(dims))
    }

    fn filled(dims: &[usize], strides: Vec<isize>) -> Self {
        let total: usize = dims.iter().product();
        let strides: Arc<[isize]> = Arc::from(strides);
        Self {
            data: vec![T::default(); total],
            mask: vec![Validity::Hidden; total],
            dims: Arc::from(dims),
            strides: strides.clone(),
            offset: 0,
            mask_strides: strides,
            mask_offset: 0,
        }
    }

    /// Allocate an output array without aborting on allocation failure.
    ///
    /// The mask starts hidden; data is filled with `T::default()`.
    pub(crate) fn try_alloc(dims: &[usize], order: MemoryOrder) -> Result<Self> {
        let alloc_err = || SpdivError::Allocation {
            dims: dims.to_vec(),
        };
        let total = checked_len(dims).ok_or_else(alloc_err)?;
        let mut data: Vec<T> = Vec::new();
        data.try_reserve_exact(total).map_err(|_| alloc_err())?;
        let mut mask: Vec<Validity> = Vec::new();
        mask.try_reserve_exact(total).map_err(|_| alloc_err())?;
        data.resize(total, T::default());
        mask.resize(total, Validity::Hidden);

        let strides: Arc<[isize]> = match order {
            MemoryOrder::ColMajor => Arc::from(col_major_strides(dims)),
            MemoryOrder::RowMajor | MemoryOrder::Keep => Arc::from(row_major_strides(dims)),
        };
        Ok(Self {
            data,
            mask,
            dims: Arc::from(dims),
            strides: strides.clone(),
            offset: 0,
            mask_strides: strides,
            mask_offset: 0,
        })
    }

    /// Row-major array whose element values come from `f`.
    ///
    /// `f` returns `None` for hidden elements.
    pub fn from_fn_row_major(dims: &[usize], mut f: impl FnMut(&[usize]) -> Option<T>) -> Self {
        let total: usize = dims.iter().product();
        let rank = dims.len();
        let mut data = Vec::with_capacity(total);
        let mut mask = Vec::with_capacity(total);
        let mut idx = vec![0usize; rank];
        for _ in 0..total {
            match f(&idx) {
                Some(v) => {
                    data.push(v);
                    mask.push(Validity::Exposed);
                }
                None => {
                    data.push(T::default());
                    mask.push(Validity::Hidden);
                }
            }
            for d in (0..rank).rev() {
                idx[d] += 1;
                if idx[d] < dims[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
        let strides: Arc<[isize]> = Arc::from(row_major_strides(dims));
        Self {
            data,
            mask,
            dims: Arc::from(dims),
            strides: strides.clone(),
            offset: 0,
            mask_strides: strides,
            mask_offset: 0,
        }
    }
}

impl<T> MaskedArray<T> {
    /// Row-major array from data and mask buffers of equal length.
    pub fn from_vec(data: Vec<T>, mask: Vec<Validity>, dims: &[usize]) -> Result<Self> {
        check_dense_lens(data.len(), mask.len(), dims)?;
        let strides = row_major_strides(dims);
        Self::from_parts(data, mask, dims, &strides, 0, &strides, 0)
    }

    /// Create from raw parts with explicit data and mask layouts.
    pub fn from_parts(
        data: Vec<T>,
        mask: Vec<Validity>,
        dims: &[usize],
        strides: &[isize],
        offset: isize,
        mask_strides: &[isize],
        mask_offset: isize,
    ) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        validate_bounds(mask.len(), dims, mask_strides, mask_offset)?;
        Ok(Self {
            data,
            mask,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
            mask_strides: Arc::from(mask_strides),
            mask_offset,
        })
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn mask_strides(&self) -> &[isize] {
        &self.mask_strides
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn mask(&self) -> &[Validity] {
        &self.mask
    }

    #[inline]
    pub(crate) fn data_ptr_mut(&mut self) -> *mut T {
        self.data.as_mut_ptr().wrapping_offset(self.offset)
    }

    #[inline]
    pub(crate) fn mask_ptr_mut(&mut self) -> *mut Validity {
        self.mask.as_mut_ptr().wrapping_offset(self.mask_offset)
    }

    /// Split into `(data, mask)` buffers.
    pub fn into_parts(self) -> (Vec<T>, Vec<Validity>) {
        (self.data, self.mask)
    }

    pub fn view(&self) -> MaskedView<'_, T> {
        MaskedView {
            data: &self.data,
            mask: &self.mask,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            mask_strides: self.mask_strides.clone(),
            mask_offset: self.mask_offset,
        }
    }

    pub fn view_mut(&mut self) -> MaskedViewMut<'_, T> {
        MaskedViewMut {
            data: &mut self.data,
            mask: &mut self.mask,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            mask_strides: self.mask_strides.clone(),
            mask_offset: self.mask_offset,
        }
    }
}

impl<T: Copy> MaskedArray<T> {
    pub fn get(&self, indices: &[usize]) -> T {
        self.view().get(indices)
    }

    pub fn validity(&self, indices: &[usize]) -> Validity {
        self.view().validity(indices)
    }

    /// `Some(data)` when exposed, `None` when hidden.
    pub fn value(&self, indices: &[usize]) -> Option<T> {
        self.view().value(indices)
    }

    pub fn set(&mut self, indices: &[usize], value: T) {
        self.view_mut().set(indices, value);
    }

    pub fn set_hidden(&mut self, indices: &[usize]) {
        self.view_mut().set_hidden(indices);
    }

    /// Snapshot of all elements in row-major index order.
    pub fn values(&self) -> Vec<Option<T>> {
        let total = self.len();
        let rank = self.ndim();
        let view = self.view();
        let mut out = Vec::with_capacity(total);
        let mut idx = vec![0usize; rank];
        for _ in 0..total {
            out.push(view.value(&idx));
            for d in (0..rank).rev() {
                idx[d] += 1;
                if idx[d] < self.dims[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
        out
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validity::Validity::{Exposed, Hidden};

    #[test]
    fn test_col_major_strides() {
        assert_eq!(col_major_strides(&[3, 4]), vec![1, 3]);
        assert_eq!(col_major_strides(&[2, 3, 4]), vec![1, 2, 6]);
    }

    #[test]
    fn test_row_major_strides() {
        assert_eq!(row_major_strides(&[3, 4]), vec![4, 1]);
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert!(row_major_strides(&[]).is_empty());
    }

    #[test]
    fn test_view_get_and_validity() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mask = vec![Exposed, Hidden, Exposed, Exposed, Exposed, Hidden];
        let view = MaskedView::contiguous(&data, &mask, &[2, 3]).unwrap();
        assert_eq!(view.get(&[1, 0]), 4.0);
        assert_eq!(view.validity(&[0, 1]), Hidden);
        assert_eq!(view.value(&[0, 2]), Some(3.0));
        assert_eq!(view.value(&[1, 2]), None);
    }

    #[test]
    fn test_independent_mask_layout() {
        // one mask row shared by both data rows
        let data = vec![1.0, 2.0, 3.0, 4.0];
        let mask = vec![Exposed, Hidden];
        let view =
            MaskedView::with_mask_layout(&data, &mask, &[2, 2], &[2, 1], 0, &[0, 1], 0).unwrap();
        assert_eq!(view.value(&[0, 0]), Some(1.0));
        assert_eq!(view.value(&[1, 0]), Some(3.0));
        assert_eq!(view.value(&[1, 1]), None);
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let data = vec![0.0; 5];
        let mask = vec![Exposed; 6];
        let err = MaskedView::new(&data, &mask, &[2, 3], &[3, 1], 0).unwrap_err();
        assert!(matches!(err, SpdivError::OffsetOverflow));

        let err = MaskedView::new(&data, &mask, &[5], &[1, 1], 0).unwrap_err();
        assert!(matches!(err, SpdivError::StrideLengthMismatch));
    }

    #[test]
    fn test_from_vec_rejects_extra_elements() {
        let err = MaskedArray::from_vec(vec![1.0; 5], vec![Exposed; 5], &[2]).unwrap_err();
        assert!(matches!(
            err,
            SpdivError::DataLengthMismatch {
                expected: 2,
                got: 5
            }
        ));

        let data = [1.0, 2.0, 3.0];
        let mask = [Exposed; 3];
        let err = MaskedView::contiguous(&data, &mask, &[2]).unwrap_err();
        assert!(matches!(err, SpdivError::DataLengthMismatch { .. }));
    }

    #[test]
    fn test_mask_length_mismatch() {
        let err = MaskedArray::from_vec(vec![1.0, 2.0], vec![Exposed], &[2]).unwrap_err();
        assert!(matches!(
            err,
            SpdivError::MaskShapeMismatch { data: 2, mask: 1 }
        ));
    }

    #[test]
    fn test_permute_and_reverse() {
        let arr = MaskedArray::from_fn_row_major(&[2, 3], |idx| {
            (idx[1] != 1).then(|| (idx[0] * 3 + idx[1]) as f64)
        });
        let v = arr.view();
        let t = v.permute(&[1, 0]).unwrap();
        assert_eq!(t.dims(), &[3, 2]);
        assert_eq!(t.value(&[2, 1]), Some(5.0));
        assert_eq!(t.value(&[1, 0]), None);

        let r = v.reversed(1).unwrap();
        assert_eq!(r.strides(), &[3, -1]);
        assert_eq!(r.value(&[0, 0]), Some(2.0));
        assert_eq!(r.value(&[1, 2]), Some(3.0));
        assert_eq!(r.value(&[1, 1]), None);

        assert!(matches!(
            v.permute(&[0, 0]),
            Err(SpdivError::InvalidAxis { axis: 0, rank: 2 })
        ));
    }

    #[test]
    fn test_set_and_set_hidden() {
        let mut arr = MaskedArray::<f64>::col_major(&[2, 2]);
        arr.set(&[1, 0], 7.5);
        assert_eq!(arr.value(&[1, 0]), Some(7.5));
        arr.set_hidden(&[1, 0]);
        assert_eq!(arr.value(&[1, 0]), None);
        // hiding keeps the payload
        assert_eq!(arr.get(&[1, 0]), 7.5);
    }

    #[test]
    fn test_try_alloc_orders() {
        let a = MaskedArray::<f64>::try_alloc(&[2, 3], MemoryOrder::ColMajor).unwrap();
        assert_eq!(a.strides(), &[1, 2]);
        assert!(a.mask().iter().all(|v| v.is_hidden()));
        let b = MaskedArray::<f64>::try_alloc(&[2, 3], MemoryOrder::RowMajor).unwrap();
        assert_eq!(b.strides(), &[3, 1]);
        let z = MaskedArray::<f64>::try_alloc(&[0, 3], MemoryOrder::RowMajor).unwrap();
        assert!(z.is_empty());
        assert_eq!(z.data().len(), 0);
    }

    #[test]
    fn test_try_alloc_overflow() {
        let err = MaskedArray::<f64>::try_alloc(&[usize::MAX, 2], MemoryOrder::RowMajor)
            .unwrap_err();
        assert!(matches!(err, SpdivError::Allocation { .. }));
    }

    #[test]
    fn test_values_snapshot() {
        let arr = MaskedArray::from_vec(vec![1, 2, 3], vec![Exposed, Hidden, Exposed], &[3])
            .unwrap();
        assert_eq!(arr.values(), vec![Some(1), None, Some(3)]);
    }
}
