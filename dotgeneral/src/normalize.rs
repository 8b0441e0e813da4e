//! Normalization between caller layouts and the blocked layout.
//!
//! Operands of any axis order are permuted into `[batch, cross, contracting]`,
//! flattened to `[batch, rows, k]` and scattered into zero-padded blocks.
//! The blocked output is gathered back into `[batch, M, N]`, which is the
//! row-major order of the dot-general output shape.

use crate::blocked::BlockLayout;
use crate::element::Element;
use crate::plan::DotGeneralPlan;
use crate::util::MultiIndex;
use crate::{DotGeneralError, Operand, Result};

/// Pack the lhs (`dims` in caller order) into blocked
/// `[batch][row_blocks][k_blocks][d][d]` form.
///
/// `dims` must be the lhs shape `plan` was built from, `data` must hold
/// exactly that many elements and `layout` must describe the plan's sizes.
pub fn pack_lhs<T: Element>(
    data: &[T],
    dims: &[usize],
    plan: &DotGeneralPlan,
    layout: &BlockLayout,
) -> Result<Vec<T>> {
    check_layout(plan, layout)?;
    let planned = planned_dims(&plan.lhs_perm, &plan.lhs_cross_dims, plan);
    check_operand(Operand::Lhs, data.len(), dims, planned)?;
    let mut out = vec![T::zero(); layout.lhs_len()];
    pack_operand(data, dims, &plan.lhs_perm, plan.m, layout, layout.row_blocks(), &mut out);
    Ok(out)
}

/// Pack the rhs (`dims` in caller order) into blocked
/// `[batch][col_blocks][k_blocks][d][d]` form. Each block row is one output
/// column, so the block kernel reads contiguous columns.
pub fn pack_rhs<T: Element>(
    data: &[T],
    dims: &[usize],
    plan: &DotGeneralPlan,
    layout: &BlockLayout,
) -> Result<Vec<T>> {
    check_layout(plan, layout)?;
    let planned = planned_dims(&plan.rhs_perm, &plan.rhs_cross_dims, plan);
    check_operand(Operand::Rhs, data.len(), dims, planned)?;
    let mut out = vec![T::zero(); layout.rhs_len()];
    pack_operand(data, dims, &plan.rhs_perm, plan.n, layout, layout.col_blocks(), &mut out);
    Ok(out)
}

fn check_layout(plan: &DotGeneralPlan, layout: &BlockLayout) -> Result<()> {
    let expected = [plan.batch, plan.m, plan.n, plan.k];
    let actual = [layout.batch, layout.m, layout.n, layout.k];
    if expected != actual {
        return Err(DotGeneralError::LayoutMismatch { expected, actual });
    }
    Ok(())
}

/// Caller-order dims of an operand as recorded by the plan.
fn planned_dims(perm: &[usize], cross_dims: &[usize], plan: &DotGeneralPlan) -> Vec<usize> {
    let grouped = plan
        .batch_dims
        .iter()
        .chain(cross_dims)
        .chain(plan.contracting_dims.iter());
    let mut dims = vec![0; perm.len()];
    for (&axis, &dim) in perm.iter().zip(grouped) {
        dims[axis] = dim;
    }
    dims
}

fn check_operand(operand: Operand, len: usize, dims: &[usize], planned: Vec<usize>) -> Result<()> {
    if dims != planned.as_slice() {
        return Err(DotGeneralError::OperandShape {
            operand,
            expected: planned,
            actual: dims.to_vec(),
        });
    }
    let expected: usize = dims.iter().product();
    if len != expected {
        return Err(DotGeneralError::BufferLength {
            expected,
            actual: len,
        });
    }
    Ok(())
}

/// Gather the blocked output into `out`, shaped `[batch, M, N]` row-major.
pub fn unpack_output<T: Element>(blocked: &[T], layout: &BlockLayout, out: &mut [T]) -> Result<()> {
    if blocked.len() != layout.output_len() {
        return Err(DotGeneralError::BlockedLength {
            operand: Operand::Output,
            expected: layout.output_len(),
            actual: blocked.len(),
        });
    }
    let expected = layout.batch * layout.m * layout.n;
    if out.len() != expected {
        return Err(DotGeneralError::BufferLength {
            expected,
            actual: out.len(),
        });
    }

    let d = layout.block_dim;
    let bs = layout.block_size();
    let (row_blocks, col_blocks) = (layout.row_blocks(), layout.col_blocks());
    let (m, n) = (layout.m, layout.n);
    if m == 0 || n == 0 {
        return Ok(());
    }
    for (flat, dst) in out.iter_mut().enumerate() {
        let j = flat % n;
        let i = (flat / n) % m;
        let b = flat / (m * n);
        let tile = (b * row_blocks + i / d) * col_blocks + j / d;
        *dst = blocked[tile * bs + (i % d) * d + j % d];
    }
    Ok(())
}

/// Scatter one operand into its blocked buffer.
///
/// Walks the source in permuted `[batch, rows, k]` order, so the running
/// count is the flat `(b, r, kk)` index and the source offset comes from the
/// permuted strides.
fn pack_operand<T: Element>(
    data: &[T],
    dims: &[usize],
    perm: &[usize],
    rows: usize,
    layout: &BlockLayout,
    row_blocks: usize,
    out: &mut [T],
) {
    let rank = dims.len();
    let mut strides = vec![1usize; rank];
    for i in (0..rank.saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    let perm_dims: Vec<usize> = perm.iter().map(|&p| dims[p]).collect();
    let perm_strides: Vec<usize> = perm.iter().map(|&p| strides[p]).collect();

    let d = layout.block_dim;
    let k = layout.k;
    let k_blocks = layout.k_blocks();
    let bs = layout.block_size();

    let mut index = MultiIndex::new(&perm_dims);
    let mut flat = 0usize;
    while index.next().is_some() {
        let kk = flat % k;
        let r = (flat / k) % rows;
        let b = flat / (rows * k);
        let block = (b * row_blocks + r / d) * k_blocks + kk / d;
        out[block * bs + (r % d) * d + kk % d] = data[index.offset(&perm_strides)];
        flat += 1;
    }
}
