//! Tiered f32 dot-product primitives.
//!
//! Every tier computes the same sums; only accumulation order differs, so
//! results agree within floating-point tolerance but are not bit-identical.
//! All primitives accept slices of any length and use the common prefix when
//! lengths differ. A zero length yields `0.0` (or the untouched accumulator).

use std::fmt;

use crate::provider::Tier;
use crate::streaming::StreamingSession;
use crate::{scalar, simd};

/// One execution tier's dot-product primitives.
pub trait DotProductKernel: Send + Sync + fmt::Debug {
    fn tier(&self) -> Tier;

    /// `sum(a[i] * b[i])`.
    fn dot(&self, a: &[f32], b: &[f32]) -> f32;

    /// `acc + dot(a, b)`.
    #[inline]
    fn dot_acc(&self, a: &[f32], b: &[f32], acc: f32) -> f32 {
        acc + self.dot(a, b)
    }

    /// Four dot products of `row` against `cols`.
    #[inline]
    fn dot4(&self, row: &[f32], cols: [&[f32]; 4]) -> [f32; 4] {
        self.dot4_acc(row, cols, [0.0; 4])
    }

    /// `acc[j] + dot(row, cols[j])` for each of the four columns.
    fn dot4_acc(&self, row: &[f32], cols: [&[f32]; 4], acc: [f32; 4]) -> [f32; 4];
}

/// Scalar loop unrolled by 8. Always available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScalarKernel;

/// Vector-extension kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VectorKernel;

/// Streaming-matrix kernel. Each call runs inside a [`StreamingSession`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamingKernel;

#[inline]
fn common_len(row: &[f32], cols: &[&[f32]; 4]) -> usize {
    cols.iter().fold(row.len(), |n, c| n.min(c.len()))
}

#[inline]
fn truncate<'a>(a: &'a [f32], b: &'a [f32]) -> (&'a [f32], &'a [f32]) {
    let n = a.len().min(b.len());
    (&a[..n], &b[..n])
}

impl DotProductKernel for ScalarKernel {
    fn tier(&self) -> Tier {
        Tier::Scalar
    }

    #[inline]
    fn dot(&self, a: &[f32], b: &[f32]) -> f32 {
        scalar::dot_unrolled(a, b)
    }

    fn dot4_acc(&self, row: &[f32], cols: [&[f32]; 4], acc: [f32; 4]) -> [f32; 4] {
        let n = common_len(row, &cols);
        let row = &row[..n];
        let mut out = acc;
        for (o, col) in out.iter_mut().zip(cols) {
            *o += scalar::dot_unrolled(row, &col[..n]);
        }
        out
    }
}

impl DotProductKernel for VectorKernel {
    fn tier(&self) -> Tier {
        Tier::Vector
    }

    #[inline]
    fn dot(&self, a: &[f32], b: &[f32]) -> f32 {
        let (a, b) = truncate(a, b);
        simd::dot(a, b)
    }

    fn dot4_acc(&self, row: &[f32], cols: [&[f32]; 4], acc: [f32; 4]) -> [f32; 4] {
        let n = common_len(row, &cols);
        if n == 0 {
            return acc;
        }
        let sums = simd::dot4(&row[..n], cols.map(|c| &c[..n]));
        [
            acc[0] + sums[0],
            acc[1] + sums[1],
            acc[2] + sums[2],
            acc[3] + sums[3],
        ]
    }
}

impl DotProductKernel for StreamingKernel {
    fn tier(&self) -> Tier {
        Tier::StreamingMatrix
    }

    fn dot(&self, a: &[f32], b: &[f32]) -> f32 {
        let (a, b) = truncate(a, b);
        let _session = StreamingSession::enter();
        if a.is_empty() {
            return 0.0;
        }
        simd::dot_ilp4(a, b)
    }

    fn dot4_acc(&self, row: &[f32], cols: [&[f32]; 4], acc: [f32; 4]) -> [f32; 4] {
        let n = common_len(row, &cols);
        let _session = StreamingSession::enter();
        if n == 0 {
            return acc;
        }
        let row = &row[..n];
        let mut out = acc;
        for (o, col) in out.iter_mut().zip(cols) {
            *o += simd::dot_ilp4(row, &col[..n]);
        }
        out
    }
}

static SCALAR: ScalarKernel = ScalarKernel;
static VECTOR: VectorKernel = VectorKernel;
static STREAMING: StreamingKernel = StreamingKernel;

/// The kernel implementing `tier`.
pub fn kernel_for(tier: Tier) -> &'static dyn DotProductKernel {
    match tier {
        Tier::Scalar => &SCALAR,
        Tier::Vector => &VECTOR,
        Tier::StreamingMatrix => &STREAMING,
    }
}

/// Dot product of `a[a_offset..a_offset + n]` and `b[b_offset..b_offset + n]`.
///
/// # Panics
///
/// Panics if either range is out of bounds.
#[inline]
pub fn dot_at<K: DotProductKernel + ?Sized>(
    kernel: &K,
    a: &[f32],
    a_offset: usize,
    b: &[f32],
    b_offset: usize,
    n: usize,
) -> f32 {
    kernel.dot(&a[a_offset..a_offset + n], &b[b_offset..b_offset + n])
}

impl fmt::Display for dyn DotProductKernel + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-kernel", self.tier())
    }
}
