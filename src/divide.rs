//! High-level entry points.

use crate::dtype::Element;
use crate::execute::execute;
use crate::plan::{plan, plan_allocated};
use crate::view::{MaskedArray, MaskedView, MaskedViewMut, MemoryOrder};
use crate::{Result, BUFFER_SIZE};

/// Per-call knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivideOptions {
    /// Layout of an allocated output.
    pub order: MemoryOrder,
    /// Length of the `f64` conversion buffer for non-`f64` inputs. Clamped to at least 1.
    pub buffer_size: usize,
}

impl Default for DivideOptions {
    fn default() -> Self {
        Self {
            order: MemoryOrder::Keep,
            buffer_size: BUFFER_SIZE,
        }
    }
}

/// Masked division into a newly allocated `f64` array of the broadcast shape.
///
/// # Example
///
/// ```rust
/// use strided_spdiv::{spdiv, MaskedArray, Validity::Exposed};
///
/// let a = MaskedArray::from_vec(vec![10.0, 5.0], vec![Exposed; 2], &[2]).unwrap();
/// let b = MaskedArray::from_vec(vec![2.0, 0.0], vec![Exposed; 2], &[2]).unwrap();
/// let out = spdiv(&a.view(), &b.view()).unwrap();
/// assert_eq!(out.values(), vec![Some(5.0), None]);
/// ```
pub fn spdiv<A: Element, B: Element>(
    a: &MaskedView<'_, A>,
    b: &MaskedView<'_, B>,
) -> Result<MaskedArray<f64>> {
    spdiv_with_options(a, b, &DivideOptions::default())
}

pub fn spdiv_with_options<A: Element, B: Element>(
    a: &MaskedView<'_, A>,
    b: &MaskedView<'_, B>,
    options: &DivideOptions,
) -> Result<MaskedArray<f64>> {
    let mut p = plan_allocated::<A, B, f64>(a, b, options)?;
    execute(&mut p);
    Ok(p.into_output())
}

/// Masked division into `out`, which must have exactly the broadcast shape.
///
/// Positions whose result is hidden keep their previous data.
pub fn spdiv_into<A, B, O>(
    a: &MaskedView<'_, A>,
    b: &MaskedView<'_, B>,
    out: &mut MaskedViewMut<'_, O>,
) -> Result<()>
where
    A: Element,
    B: Element,
    O: Element,
{
    spdiv_into_with_options(a, b, out, &DivideOptions::default())
}

pub fn spdiv_into_with_options<A, B, O>(
    a: &MaskedView<'_, A>,
    b: &MaskedView<'_, B>,
    out: &mut MaskedViewMut<'_, O>,
    options: &DivideOptions,
) -> Result<()>
where
    A: Element,
    B: Element,
    O: Element,
{
    let mut p = plan(a, b, out.reborrow(), options)?;
    execute(&mut p);
    Ok(())
}

/// Single entry point with an optional owned output.
///
/// With `Some(out)` the array is populated in place and handed back; with
/// `None` a new array of the broadcast shape is allocated. On error a supplied
/// output is dropped.
pub fn special_divide<A, B, O>(
    a: &MaskedView<'_, A>,
    b: &MaskedView<'_, B>,
    out: Option<MaskedArray<O>>,
) -> Result<MaskedArray<O>>
where
    A: Element,
    B: Element,
    O: Element,
{
    special_divide_with_options(a, b, out, &DivideOptions::default())
}

pub fn special_divide_with_options<A, B, O>(
    a: &MaskedView<'_, A>,
    b: &MaskedView<'_, B>,
    out: Option<MaskedArray<O>>,
    options: &DivideOptions,
) -> Result<MaskedArray<O>>
where
    A: Element,
    B: Element,
    O: Element,
{
    match out {
        Some(mut out) => {
            spdiv_into_with_options(a, b, &mut out.view_mut(), options)?;
            Ok(out)
        }
        None => {
            let mut p = plan_allocated::<A, B, O>(a, b, options)?;
            execute(&mut p);
            Ok(p.into_output())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validity::Validity::{Exposed, Hidden};
    use crate::{ShapeError, SpdivError};

    #[test]
    fn test_spdiv_basic() {
        let a = MaskedArray::from_vec(vec![10.0, 5.0], vec![Exposed; 2], &[2]).unwrap();
        let b = MaskedArray::from_vec(vec![2.0, 0.0], vec![Exposed; 2], &[2]).unwrap();
        let out = spdiv(&a.view(), &b.view()).unwrap();
        assert_eq!(out.values(), vec![Some(5.0), None]);
    }

    #[test]
    fn test_spdiv_hidden_input() {
        let a = MaskedArray::from_vec(vec![10.0, 5.0], vec![Hidden, Exposed], &[2]).unwrap();
        let b = MaskedArray::from_vec(vec![2.0, 5.0], vec![Exposed; 2], &[2]).unwrap();
        let out = spdiv(&a.view(), &b.view()).unwrap();
        assert_eq!(out.values(), vec![None, Some(1.0)]);
    }

    #[test]
    fn test_spdiv_into_rejects_wrong_shape() {
        let a = MaskedArray::<f64>::row_major(&[2, 3]);
        let b = MaskedArray::<f64>::row_major(&[3]);
        let mut out = MaskedArray::<f64>::row_major(&[3, 2]);
        let err = spdiv_into(&a.view(), &b.view(), &mut out.view_mut()).unwrap_err();
        assert!(matches!(
            err,
            SpdivError::Shape(ShapeError::OutputMismatch { .. })
        ));
    }

    #[test]
    fn test_special_divide_reuses_output() {
        let a = MaskedArray::from_vec(vec![9.0, 4.0], vec![Exposed; 2], &[2]).unwrap();
        let b = MaskedArray::from_vec(vec![3.0, 0.0], vec![Exposed; 2], &[2]).unwrap();
        let out = MaskedArray::from_vec(vec![1.5f32, 2.5], vec![Hidden, Exposed], &[2]).unwrap();
        let out = special_divide(&a.view(), &b.view(), Some(out)).unwrap();
        assert_eq!(out.data(), &[3.0f32, 2.5]);
        assert_eq!(out.mask(), &[Exposed, Hidden]);
    }

    #[test]
    fn test_special_divide_allocates() {
        let a = MaskedArray::from_vec(vec![1i32, 2, 3], vec![Exposed; 3], &[3]).unwrap();
        let b = MaskedArray::from_vec(vec![2.0f32], vec![Exposed], &[1]).unwrap();
        let out: MaskedArray<f32> = special_divide(&a.view(), &b.view(), None).unwrap();
        assert_eq!(out.values(), vec![Some(0.5), Some(1.0), Some(1.5)]);
    }

    #[test]
    fn test_default_options() {
        let options = DivideOptions::default();
        assert_eq!(options.order, MemoryOrder::Keep);
        assert_eq!(options.buffer_size, BUFFER_SIZE);
    }
}
