//! The division loop.
//!
//! Each innermost run from the blocked kernel covers `len` positions across
//! six streams. Runs where both inputs are `f64` read them in place; other
//! input types are first converted chunk by chunk into `f64` scratch buffers.

use std::collections::TryReserveError;

use tracing::trace;

use crate::dtype::Element;
use crate::kernel::for_each_inner_block;
use crate::plan::{IterationPlan, OutputTarget, A_DATA, A_MASK, B_DATA, B_MASK, OUT_DATA, OUT_MASK};
use crate::validity::Validity;

/// The per-element rule.
///
/// Returns `None` (hidden output) when either input is hidden or the divisor is
/// zero (including `-0.0`), otherwise `Some(a / b)`. A NaN divisor is not zero,
/// so it yields an exposed NaN.
#[inline]
pub fn decide(a_validity: Validity, b_validity: Validity, a: f64, b: f64) -> Option<f64> {
    if a_validity.is_hidden() || b_validity.is_hidden() || b == 0.0 {
        None
    } else {
        Some(a / b)
    }
}

/// Run a plan to completion.
///
/// Every output position is visited once. Positions the rule hides get a
/// hidden mask code and keep their previous data.
pub fn execute<A, B, T>(plan: &mut IterationPlan<'_, A, B, T>)
where
    A: Element,
    B: Element,
    T: OutputTarget,
{
    if plan.is_empty() {
        return;
    }

    let base = Streams {
        out_data: plan.out.data_base(),
        a_data: plan.a.data_ptr(),
        b_data: plan.b.data_ptr(),
        out_mask: plan.out.validity_base(),
        a_mask: plan.a.mask_ptr(),
        b_mask: plan.b.mask_ptr(),
    };
    let kernel = &plan.kernel;

    match plan.cast.as_mut() {
        None => for_each_inner_block(kernel, |offsets, len, strides| {
            // SAFETY: the plan was built from bounds-checked views over the
            // same shape, and the output is exclusively borrowed by the plan.
            unsafe { direct_run(base.at(offsets), len, strides) };
        }),
        Some(buffers) => for_each_inner_block(kernel, |offsets, len, strides| {
            let mut at = base.at(offsets);
            let mut done = 0usize;
            while done < len {
                let n = buffers.capacity().min(len - done);
                // SAFETY: as above; `n` never exceeds the buffer capacity.
                at = unsafe { buffered_run(at, n, strides, buffers) };
                done += n;
            }
        }),
    }

    trace!(len = plan.len(), "executed masked division");
}

/// Scratch space for converting non-`f64` inputs.
#[derive(Debug)]
pub(crate) struct CastBuffers {
    a: Vec<f64>,
    b: Vec<f64>,
}

impl CastBuffers {
    pub(crate) fn try_new(capacity: usize) -> Result<Self, TryReserveError> {
        let mut a = Vec::new();
        a.try_reserve_exact(capacity)?;
        a.resize(capacity, 0.0);
        let mut b = Vec::new();
        b.try_reserve_exact(capacity)?;
        b.resize(capacity, 0.0);
        Ok(Self { a, b })
    }

    fn capacity(&self) -> usize {
        self.a.len()
    }
}

/// Current position in all six streams.
struct Streams<A, B, O> {
    out_data: *mut O,
    a_data: *const A,
    b_data: *const B,
    out_mask: *mut Validity,
    a_mask: *const Validity,
    b_mask: *const Validity,
}

impl<A, B, O> Clone for Streams<A, B, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, B, O> Copy for Streams<A, B, O> {}

impl<A, B, O> Streams<A, B, O> {
    #[inline]
    fn at(&self, offsets: &[isize]) -> Self {
        self.stepped(offsets, 1)
    }

    #[inline]
    fn stepped(&self, strides: &[isize], times: isize) -> Self {
        Self {
            out_data: self.out_data.wrapping_offset(strides[OUT_DATA] * times),
            a_data: self.a_data.wrapping_offset(strides[A_DATA] * times),
            b_data: self.b_data.wrapping_offset(strides[B_DATA] * times),
            out_mask: self.out_mask.wrapping_offset(strides[OUT_MASK] * times),
            a_mask: self.a_mask.wrapping_offset(strides[A_MASK] * times),
            b_mask: self.b_mask.wrapping_offset(strides[B_MASK] * times),
        }
    }
}

#[inline]
unsafe fn store<O: Element>(data: *mut O, mask: *mut Validity, quotient: Option<f64>) {
    match quotient {
        Some(q) => {
            *data = O::from_f64(q);
            *mask = Validity::Exposed;
        }
        None => *mask = Validity::Hidden,
    }
}

unsafe fn direct_run<A, B, O>(at: Streams<A, B, O>, len: usize, strides: &[isize])
where
    A: Element,
    B: Element,
    O: Element,
{
    if strides.iter().all(|&s| s == 1) {
        let a = std::slice::from_raw_parts(at.a_data, len);
        let b = std::slice::from_raw_parts(at.b_data, len);
        let a_mask = std::slice::from_raw_parts(at.a_mask, len);
        let b_mask = std::slice::from_raw_parts(at.b_mask, len);
        let out = std::slice::from_raw_parts_mut(at.out_data, len);
        let out_mask = std::slice::from_raw_parts_mut(at.out_mask, len);
        for i in 0..len {
            match decide(a_mask[i], b_mask[i], a[i].to_f64(), b[i].to_f64()) {
                Some(q) => {
                    out[i] = O::from_f64(q);
                    out_mask[i] = Validity::Exposed;
                }
                None => out_mask[i] = Validity::Hidden,
            }
        }
        return;
    }

    let mut p = at;
    for _ in 0..len {
        let q = decide(*p.a_mask, *p.b_mask, (*p.a_data).to_f64(), (*p.b_data).to_f64());
        store(p.out_data, p.out_mask, q);
        p = p.stepped(strides, 1);
    }
}

/// Convert `n` input elements into the buffers, then apply the rule.
/// Returns the position after the chunk.
unsafe fn buffered_run<A, B, O>(
    at: Streams<A, B, O>,
    n: usize,
    strides: &[isize],
    buffers: &mut CastBuffers,
) -> Streams<A, B, O>
where
    A: Element,
    B: Element,
    O: Element,
{
    let (a_buf, b_buf) = (&mut buffers.a[..n], &mut buffers.b[..n]);

    fill(a_buf, at.a_data, strides[A_DATA]);
    fill(b_buf, at.b_data, strides[B_DATA]);

    let mut p = at;
    for i in 0..n {
        let q = decide(*p.a_mask, *p.b_mask, a_buf[i], b_buf[i]);
        store(p.out_data, p.out_mask, q);
        p = p.stepped(strides, 1);
    }
    p
}

#[inline]
unsafe fn fill<T: Element>(buf: &mut [f64], mut src: *const T, stride: isize) {
    for slot in buf.iter_mut() {
        *slot = (*src).to_f64();
        src = src.wrapping_offset(stride);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{plan, plan_allocated};
    use crate::validity::Validity::{Exposed, Hidden};
    use crate::view::{MaskedArray, MaskedViewMut};
    use crate::DivideOptions;

    #[test]
    fn test_decide() {
        assert_eq!(decide(Exposed, Exposed, 6.0, 3.0), Some(2.0));
        assert_eq!(decide(Hidden, Exposed, 6.0, 3.0), None);
        assert_eq!(decide(Exposed, Hidden, 6.0, 3.0), None);
        assert_eq!(decide(Exposed, Exposed, 6.0, 0.0), None);
        assert_eq!(decide(Exposed, Exposed, 6.0, -0.0), None);
        assert_eq!(decide(Exposed, Exposed, 0.0, 2.0), Some(0.0));
        assert!(decide(Exposed, Exposed, 1.0, f64::NAN).unwrap().is_nan());
    }

    #[test]
    fn test_execute_contiguous() {
        let a = MaskedArray::from_vec(vec![10.0, 5.0, 3.0, 8.0], vec![Exposed; 4], &[4]).unwrap();
        let b = MaskedArray::from_vec(
            vec![2.0, 0.0, 3.0, 4.0],
            vec![Exposed, Exposed, Exposed, Hidden],
            &[4],
        )
        .unwrap();
        let mut p =
            plan_allocated::<f64, f64, f64>(&a.view(), &b.view(), &DivideOptions::default())
                .unwrap();
        execute(&mut p);
        let out = p.into_output();
        assert_eq!(out.values(), vec![Some(5.0), None, Some(1.0), None]);
    }

    #[test]
    fn test_execute_keeps_hidden_output_data() {
        let a = MaskedArray::from_vec(vec![1.0, 1.0], vec![Exposed; 2], &[2]).unwrap();
        let b = MaskedArray::from_vec(vec![0.0, 2.0], vec![Exposed; 2], &[2]).unwrap();
        let mut data = vec![-7.0, -7.0];
        let mut mask = vec![Exposed, Hidden];
        {
            let out = MaskedViewMut::contiguous(&mut data, &mut mask, &[2]).unwrap();
            let mut p = plan(&a.view(), &b.view(), out, &DivideOptions::default()).unwrap();
            execute(&mut p);
        }
        assert_eq!(data, vec![-7.0, 0.5]);
        assert_eq!(mask, vec![Hidden, Exposed]);
    }

    #[test]
    fn test_execute_buffered_in_small_chunks() {
        let a = MaskedArray::from_fn_row_major(&[5, 7], |i| Some((i[0] * 7 + i[1]) as i16));
        let b = MaskedArray::from_fn_row_major(&[7], |i| {
            if i[0] == 3 {
                None
            } else {
                Some(i[0] as u8)
            }
        });
        let options = DivideOptions {
            buffer_size: 3,
            ..DivideOptions::default()
        };
        let mut p = plan_allocated::<i16, u8, f64>(&a.view(), &b.view(), &options).unwrap();
        assert!(p.is_buffered());
        execute(&mut p);
        let out = p.into_output();
        for i in 0..5 {
            for j in 0..7 {
                let expected = if j == 0 || j == 3 {
                    None
                } else {
                    Some((i * 7 + j) as f64 / j as f64)
                };
                assert_eq!(out.value(&[i, j]), expected, "at [{i}, {j}]");
            }
        }
    }

    #[test]
    fn test_execute_empty_plan_is_noop() {
        let a = MaskedArray::<f64>::row_major(&[0]);
        let b = MaskedArray::<f64>::row_major(&[1]);
        let mut p =
            plan_allocated::<f64, f64, f64>(&a.view(), &b.view(), &DivideOptions::default())
                .unwrap();
        execute(&mut p);
        assert_eq!(p.into_output().dims(), &[0]);
    }
}
