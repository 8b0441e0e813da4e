//! Naive dot-general on caller layouts.
//!
//! Walks batch, lhs cross, rhs cross and contracting indices with odometers
//! and reads operands through their original strides. Slow, layout-agnostic
//! and exact for integer dtypes; used as the oracle for every other path.

use crate::buffer::{Buffer, Shape};
use crate::element::{DType, Element};
use crate::plan::{DotGeneralAxes, DotGeneralPlan};
use crate::util::MultiIndex;
use crate::Result;

/// Contract `lhs` and `rhs` over `axes` into a freshly allocated buffer.
pub fn dot_general_naive(lhs: &Buffer, rhs: &Buffer, axes: &DotGeneralAxes) -> Result<Buffer> {
    let plan = DotGeneralPlan::new(lhs.shape(), rhs.shape(), axes)?;
    let mut out = Buffer::zeros(Shape::new(&plan.output_dims(), lhs.dtype()));
    match lhs.dtype() {
        DType::F32 => naive_into::<f32>(lhs, rhs, &plan, &mut out)?,
        DType::F64 => naive_into::<f64>(lhs, rhs, &plan, &mut out)?,
        DType::I32 => naive_into::<i32>(lhs, rhs, &plan, &mut out)?,
        DType::I64 => naive_into::<i64>(lhs, rhs, &plan, &mut out)?,
    }
    Ok(out)
}

fn naive_into<T: Element>(
    lhs: &Buffer,
    rhs: &Buffer,
    plan: &DotGeneralPlan,
    out: &mut Buffer,
) -> Result<()> {
    let a = lhs.typed::<T>()?;
    let b = rhs.typed::<T>()?;
    let c = out.typed_mut::<T>()?;

    let a_strides = lhs.shape().strides();
    let b_strides = rhs.shape().strides();
    let pick = |strides: &[usize], axes: &[usize]| -> Vec<usize> {
        axes.iter().map(|&ax| strides[ax]).collect()
    };
    let a_batch_strides = pick(&a_strides, &plan.lhs_batch);
    let a_cross_strides = pick(&a_strides, &plan.lhs_cross);
    let a_sum_strides = pick(&a_strides, &plan.lhs_contracting);
    let b_batch_strides = pick(&b_strides, &plan.rhs_batch);
    let b_cross_strides = pick(&b_strides, &plan.rhs_cross);
    let b_sum_strides = pick(&b_strides, &plan.rhs_contracting);

    let mut batch_iter = MultiIndex::new(&plan.batch_dims);
    let mut lo_iter = MultiIndex::new(&plan.lhs_cross_dims);
    let mut ro_iter = MultiIndex::new(&plan.rhs_cross_dims);
    let mut sum_iter = MultiIndex::new(&plan.contracting_dims);

    let mut c_off = 0usize;
    while batch_iter.next().is_some() {
        let a_batch_off = batch_iter.offset(&a_batch_strides);
        let b_batch_off = batch_iter.offset(&b_batch_strides);

        lo_iter.reset();
        while lo_iter.next().is_some() {
            let a_lo_off = lo_iter.offset(&a_cross_strides);

            ro_iter.reset();
            while ro_iter.next().is_some() {
                let b_ro_off = ro_iter.offset(&b_cross_strides);

                let mut acc = T::zero();
                sum_iter.reset();
                while sum_iter.next().is_some() {
                    let a_val = a[a_batch_off + a_lo_off + sum_iter.offset(&a_sum_strides)];
                    let b_val = b[b_batch_off + b_ro_off + sum_iter.offset(&b_sum_strides)];
                    acc = acc + a_val * b_val;
                }
                c[c_off] = acc;
                c_off += 1;
            }
        }
    }
    Ok(())
}
