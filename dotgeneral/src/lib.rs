//! CPU dot-general: contraction of two dense arrays over designated axes.
//!
//! A dot-general contracts `lhs` and `rhs` over paired *contracting* axes,
//! keeps paired *batch* axes, and forms the outer product of the remaining
//! *cross* axes. The output is shaped
//! `[batch dims..., lhs cross dims..., rhs cross dims...]`.
//!
//! Execution takes one of two paths:
//!
//! - **Fast path** ([`fastpath`]): `f32` matmul, matrix-vector and (double)
//!   batched matmul shapes that are already laid out canonically run directly
//!   on the caller's buffers.
//! - **General path** ([`blocked`], [`normalize`], [`executor`]): operands of
//!   any layout and dtype are normalized into zero-padded square blocks and
//!   every output tile is computed by the block kernel.
//!
//! Both paths bottom out in the tiered primitives of [`dotgeneral_kernel`].
//!
//! # Example
//!
//! ```
//! use dotgeneral::{Buffer, DotGeneralAxes, Engine, ExecPath, FastPathKind};
//!
//! // [2, 3] x [3, 2] matrix product
//! let lhs = Buffer::from_vec(&[2, 3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
//! let rhs = Buffer::from_vec(&[3, 2], vec![1.0f32, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap();
//! let axes = DotGeneralAxes::new(&[1], &[0]);
//!
//! let engine = Engine::new();
//! let mut out = Buffer::zeros(engine.output_shape(&lhs, &rhs, &axes).unwrap());
//! let path = engine.dot_general_into(&lhs, &rhs, &axes, &mut out).unwrap();
//!
//! assert_eq!(path, ExecPath::FastPath(FastPathKind::MatMul));
//! assert_eq!(out.as_slice::<f32>().unwrap(), &[4.0, 5.0, 10.0, 11.0]);
//! ```

pub mod blocked;
pub mod buffer;
pub mod classify;
pub mod element;
pub mod engine;
pub mod executor;
pub mod fastpath;
pub mod normalize;
pub mod plan;
pub mod reference;
mod util;

use std::fmt;

pub use blocked::{BlockKernel, BlockLayout, Tile};
pub use buffer::{Buffer, BufferData, Shape};
pub use classify::{classify, is_canonical_layout, FastPathKind};
pub use element::{DType, Element, ScalarBase};
pub use engine::{Engine, EngineConfig, ExecPath, MIN_BLOCK_DIM};
pub use fastpath::execute_fast_path;
pub use plan::{DotGeneralAxes, DotGeneralPlan};
pub use reference::dot_general_naive;

pub use dotgeneral_kernel::{
    detect, CapabilityFlags, CapabilityProvider, NativeProvider, ScalarOnlyProvider, Tier,
    VectorOnlyProvider,
};

/// Which buffer an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Lhs,
    Rhs,
    Output,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operand::Lhs => "lhs",
            Operand::Rhs => "rhs",
            Operand::Output => "output",
        })
    }
}

/// Errors for malformed dot-general metadata.
///
/// All of them are detected before any buffer is read or written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DotGeneralError {
    #[error("{operand} axis {axis} out of range for rank {rank}")]
    InvalidAxis {
        operand: Operand,
        axis: usize,
        rank: usize,
    },
    #[error("{operand} axis {axis} listed more than once")]
    DuplicateAxis { operand: Operand, axis: usize },
    #[error("contracting axis count mismatch: lhs has {lhs}, rhs has {rhs}")]
    ContractingCountMismatch { lhs: usize, rhs: usize },
    #[error("batch axis count mismatch: lhs has {lhs}, rhs has {rhs}")]
    BatchCountMismatch { lhs: usize, rhs: usize },
    #[error(
        "{role} dimension mismatch: lhs axis {lhs_axis} has {lhs_dim}, rhs axis {rhs_axis} has {rhs_dim}"
    )]
    DimensionMismatch {
        role: &'static str,
        lhs_axis: usize,
        rhs_axis: usize,
        lhs_dim: usize,
        rhs_dim: usize,
    },
    #[error("dtype mismatch: expected {expected}, got {actual}")]
    DTypeMismatch { expected: DType, actual: DType },
    #[error("buffer length {actual} does not match shape size {expected}")]
    BufferLength { expected: usize, actual: usize },
    #[error("output shape mismatch: expected {expected:?}, got {actual:?}")]
    OutputShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("{operand} shape {actual:?} does not match planned shape {expected:?}")]
    OperandShape {
        operand: Operand,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("block layout {actual:?} does not match planned [batch, m, n, k] {expected:?}")]
    LayoutMismatch {
        expected: [usize; 4],
        actual: [usize; 4],
    },
    #[error("block dimension must be non-zero")]
    InvalidBlockDim,
    #[error("blocked {operand} length {actual} does not match layout length {expected}")]
    BlockedLength {
        operand: Operand,
        expected: usize,
        actual: usize,
    },
}

/// Convenience alias for `Result<T, DotGeneralError>`.
pub type Result<T> = std::result::Result<T, DotGeneralError>;
