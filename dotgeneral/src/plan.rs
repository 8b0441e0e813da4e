//! Dot-general plan: axis validation, classification and permutations.

use crate::buffer::Shape;
use crate::element::DType;
use crate::{DotGeneralError, Operand, Result};

/// Contracting and batch axes of both operands. Every other axis is a
/// cross axis. Pairs are matched by position: `lhs_contracting[i]` is
/// contracted against `rhs_contracting[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DotGeneralAxes {
    pub lhs_contracting: Vec<usize>,
    pub rhs_contracting: Vec<usize>,
    pub lhs_batch: Vec<usize>,
    pub rhs_batch: Vec<usize>,
}

impl DotGeneralAxes {
    /// Axes with no batch dimensions.
    pub fn new(lhs_contracting: &[usize], rhs_contracting: &[usize]) -> Self {
        DotGeneralAxes {
            lhs_contracting: lhs_contracting.to_vec(),
            rhs_contracting: rhs_contracting.to_vec(),
            lhs_batch: Vec::new(),
            rhs_batch: Vec::new(),
        }
    }

    pub fn with_batch(mut self, lhs_batch: &[usize], rhs_batch: &[usize]) -> Self {
        self.lhs_batch = lhs_batch.to_vec();
        self.rhs_batch = rhs_batch.to_vec();
        self
    }

    /// `[M, K] x [K, N]`.
    pub fn matmul() -> Self {
        Self::new(&[1], &[0])
    }

    /// `[B, M, K] x [B, K, N]`.
    pub fn batched_matmul() -> Self {
        Self::new(&[2], &[1]).with_batch(&[0], &[0])
    }
}

/// Pre-computed execution plan for one dot-general.
///
/// Operands are viewed in the internal order `[batch, cross, contracting]`;
/// `lhs_perm` / `rhs_perm` map internal positions to original axes.
/// Grouped sizes are products of the group's dims (`1` for an empty group).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotGeneralPlan {
    pub lhs_batch: Vec<usize>,
    pub rhs_batch: Vec<usize>,
    pub lhs_contracting: Vec<usize>,
    pub rhs_contracting: Vec<usize>,
    /// Cross axes of lhs, in original order.
    pub lhs_cross: Vec<usize>,
    /// Cross axes of rhs, in original order.
    pub rhs_cross: Vec<usize>,

    pub batch_dims: Vec<usize>,
    pub lhs_cross_dims: Vec<usize>,
    pub rhs_cross_dims: Vec<usize>,
    pub contracting_dims: Vec<usize>,

    /// lhs axes in `[batch, cross, contracting]` order.
    pub lhs_perm: Vec<usize>,
    /// rhs axes in `[batch, cross, contracting]` order.
    pub rhs_perm: Vec<usize>,

    /// Product of batch dims.
    pub batch: usize,
    /// Product of lhs cross dims.
    pub m: usize,
    /// Product of rhs cross dims.
    pub n: usize,
    /// Product of contracting dims.
    pub k: usize,
}

impl DotGeneralPlan {
    pub fn new(lhs: &Shape, rhs: &Shape, axes: &DotGeneralAxes) -> Result<Self> {
        if lhs.dtype() != rhs.dtype() {
            return Err(DotGeneralError::DTypeMismatch {
                expected: lhs.dtype(),
                actual: rhs.dtype(),
            });
        }
        if axes.lhs_contracting.len() != axes.rhs_contracting.len() {
            return Err(DotGeneralError::ContractingCountMismatch {
                lhs: axes.lhs_contracting.len(),
                rhs: axes.rhs_contracting.len(),
            });
        }
        if axes.lhs_batch.len() != axes.rhs_batch.len() {
            return Err(DotGeneralError::BatchCountMismatch {
                lhs: axes.lhs_batch.len(),
                rhs: axes.rhs_batch.len(),
            });
        }

        let lhs_cross = cross_axes(
            Operand::Lhs,
            lhs.rank(),
            &axes.lhs_batch,
            &axes.lhs_contracting,
        )?;
        let rhs_cross = cross_axes(
            Operand::Rhs,
            rhs.rank(),
            &axes.rhs_batch,
            &axes.rhs_contracting,
        )?;

        let batch_dims = paired_dims("batch", lhs, rhs, &axes.lhs_batch, &axes.rhs_batch)?;
        let contracting_dims = paired_dims(
            "contracting",
            lhs,
            rhs,
            &axes.lhs_contracting,
            &axes.rhs_contracting,
        )?;
        let lhs_cross_dims: Vec<usize> = lhs_cross.iter().map(|&a| lhs.dims()[a]).collect();
        let rhs_cross_dims: Vec<usize> = rhs_cross.iter().map(|&a| rhs.dims()[a]).collect();

        let lhs_perm: Vec<usize> = axes
            .lhs_batch
            .iter()
            .chain(lhs_cross.iter())
            .chain(axes.lhs_contracting.iter())
            .copied()
            .collect();
        let rhs_perm: Vec<usize> = axes
            .rhs_batch
            .iter()
            .chain(rhs_cross.iter())
            .chain(axes.rhs_contracting.iter())
            .copied()
            .collect();

        Ok(DotGeneralPlan {
            batch: batch_dims.iter().product(),
            m: lhs_cross_dims.iter().product(),
            n: rhs_cross_dims.iter().product(),
            k: contracting_dims.iter().product(),
            lhs_batch: axes.lhs_batch.clone(),
            rhs_batch: axes.rhs_batch.clone(),
            lhs_contracting: axes.lhs_contracting.clone(),
            rhs_contracting: axes.rhs_contracting.clone(),
            lhs_cross,
            rhs_cross,
            batch_dims,
            lhs_cross_dims,
            rhs_cross_dims,
            contracting_dims,
            lhs_perm,
            rhs_perm,
        })
    }

    /// Output dims: `[batch dims..., lhs cross dims..., rhs cross dims...]`.
    pub fn output_dims(&self) -> Vec<usize> {
        self.batch_dims
            .iter()
            .chain(self.lhs_cross_dims.iter())
            .chain(self.rhs_cross_dims.iter())
            .copied()
            .collect()
    }

    /// Check that `output` can receive this contraction's result.
    pub fn check_output(&self, output: &Shape, dtype: DType) -> Result<()> {
        let expected = self.output_dims();
        if output.dims() != expected.as_slice() {
            return Err(DotGeneralError::OutputShape {
                expected,
                actual: output.dims().to_vec(),
            });
        }
        if output.dtype() != dtype {
            return Err(DotGeneralError::DTypeMismatch {
                expected: dtype,
                actual: output.dtype(),
            });
        }
        Ok(())
    }

    /// Number of scalar multiply-adds the contraction performs.
    pub fn multiply_adds(&self) -> usize {
        self.batch
            .saturating_mul(self.m)
            .saturating_mul(self.n)
            .saturating_mul(self.k)
    }
}

/// Validate one operand's axis sets and return its cross axes.
fn cross_axes(
    operand: Operand,
    rank: usize,
    batch: &[usize],
    contracting: &[usize],
) -> Result<Vec<usize>> {
    let mut seen = vec![false; rank];
    for &axis in batch.iter().chain(contracting.iter()) {
        if axis >= rank {
            return Err(DotGeneralError::InvalidAxis {
                operand,
                axis,
                rank,
            });
        }
        if seen[axis] {
            return Err(DotGeneralError::DuplicateAxis { operand, axis });
        }
        seen[axis] = true;
    }
    Ok((0..rank).filter(|&a| !seen[a]).collect())
}

fn paired_dims(
    role: &'static str,
    lhs: &Shape,
    rhs: &Shape,
    lhs_axes: &[usize],
    rhs_axes: &[usize],
) -> Result<Vec<usize>> {
    lhs_axes
        .iter()
        .zip(rhs_axes.iter())
        .map(|(&la, &ra)| {
            let (ld, rd) = (lhs.dims()[la], rhs.dims()[ra]);
            if ld != rd {
                return Err(DotGeneralError::DimensionMismatch {
                    role,
                    lhs_axis: la,
                    rhs_axis: ra,
                    lhs_dim: ld,
                    rhs_dim: rd,
                });
            }
            Ok(ld)
        })
        .collect()
}
