//! Shape classification for the fast path.
//!
//! Classification is purely positional: it looks at ranks and axis indices,
//! never at dtypes or dimension sizes. Those are checked by the caller.

use std::fmt;

use crate::buffer::Shape;
use crate::plan::DotGeneralAxes;
use crate::util::is_identity;

/// Canonical shapes the fast path handles directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FastPathKind {
    /// `[M, K] x [K, N] -> [M, N]`
    MatMul,
    /// `[M, K] x [K] -> [M]`
    MatVec,
    /// `[B, M, K] x [B, K, N] -> [B, M, N]`
    BatchedMatMul,
    /// `[B0, B1, M, K] x [B0, B1, K, N] -> [B0, B1, M, N]`
    DoubleBatchedMatMul,
}

impl FastPathKind {
    pub const fn batch_rank(self) -> usize {
        match self {
            FastPathKind::MatMul | FastPathKind::MatVec => 0,
            FastPathKind::BatchedMatMul => 1,
            FastPathKind::DoubleBatchedMatMul => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            FastPathKind::MatMul => "matmul",
            FastPathKind::MatVec => "matvec",
            FastPathKind::BatchedMatMul => "batched-matmul",
            FastPathKind::DoubleBatchedMatMul => "double-batched-matmul",
        }
    }
}

impl fmt::Display for FastPathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognize a canonical fast-path shape.
///
/// Returns `None` for anything else, including transposed layouts such as
/// `[M, K] x [N, K]`; those take the general path.
pub fn classify(lhs: &Shape, rhs: &Shape, axes: &DotGeneralAxes) -> Option<FastPathKind> {
    let kind = match_pattern(lhs.rank(), rhs.rank(), axes)?;
    is_canonical_layout(lhs.rank(), rhs.rank(), axes).then_some(kind)
}

fn match_pattern(lhs_rank: usize, rhs_rank: usize, axes: &DotGeneralAxes) -> Option<FastPathKind> {
    let lc = axes.lhs_contracting.as_slice();
    let rc = axes.rhs_contracting.as_slice();
    let lb = axes.lhs_batch.as_slice();
    let rb = axes.rhs_batch.as_slice();

    match (lhs_rank, rhs_rank) {
        (2, 2) if lc == [1] && rc == [0] && lb.is_empty() && rb.is_empty() => {
            Some(FastPathKind::MatMul)
        }
        (2, 1) if lc == [1] && rc == [0] && lb.is_empty() && rb.is_empty() => {
            Some(FastPathKind::MatVec)
        }
        (3, 3) if lc == [2] && rc == [1] && lb == [0] && rb == [0] => {
            Some(FastPathKind::BatchedMatMul)
        }
        (4, 4) if lc == [3] && rc == [2] && lb == [0, 1] && rb == [0, 1] => {
            Some(FastPathKind::DoubleBatchedMatMul)
        }
        _ => None,
    }
}

/// Whether both operands are already in canonical memory order: lhs as
/// `[batch, cross, contracting]`, rhs as `[batch, contracting, cross]`.
pub fn is_canonical_layout(lhs_rank: usize, rhs_rank: usize, axes: &DotGeneralAxes) -> bool {
    let lhs_order = ordered(lhs_rank, &axes.lhs_batch, &axes.lhs_contracting, false);
    let rhs_order = ordered(rhs_rank, &axes.rhs_batch, &axes.rhs_contracting, true);
    lhs_order.len() == lhs_rank
        && rhs_order.len() == rhs_rank
        && is_identity(&lhs_order)
        && is_identity(&rhs_order)
}

fn ordered(
    rank: usize,
    batch: &[usize],
    contracting: &[usize],
    contracting_first: bool,
) -> Vec<usize> {
    let cross = (0..rank).filter(|a| !batch.contains(a) && !contracting.contains(a));
    let mut order: Vec<usize> = batch.to_vec();
    if contracting_first {
        order.extend_from_slice(contracting);
        order.extend(cross);
    } else {
        order.extend(cross);
        order.extend_from_slice(contracting);
    }
    order
}
