//! Engine facade: path selection between fast path and general path.

use std::fmt;

use dotgeneral_kernel::{CapabilityProvider, NativeProvider, Tier};

use crate::blocked::{BlockKernel, BlockLayout};
use crate::buffer::{Buffer, Shape};
use crate::classify::{classify, FastPathKind};
use crate::element::{DType, Element};
use crate::executor::run_tiles;
use crate::fastpath::execute_fast_path;
use crate::normalize::{pack_lhs, pack_rhs, unpack_output};
use crate::plan::{DotGeneralAxes, DotGeneralPlan};
use crate::{DotGeneralError, Result};

/// Smallest block dimension chosen for small problems.
pub const MIN_BLOCK_DIM: usize = 4;

/// Default minimum multiply-adds before tiles run in parallel.
const MIN_PARALLEL_WORK: usize = 1 << 15;

/// Tuning knobs for an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on the general path's block dimension.
    pub block_dim: usize,
    /// Try the fast path before normalizing.
    pub fast_path: bool,
    /// Allow tiles to run on the rayon pool (needs the `parallel` feature).
    pub parallel: bool,
    /// Minimum padded multiply-adds for parallel tile execution.
    pub min_parallel_work: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            block_dim: 64,
            fast_path: true,
            parallel: true,
            min_parallel_work: MIN_PARALLEL_WORK,
        }
    }
}

impl EngineConfig {
    pub fn with_block_dim(mut self, block_dim: usize) -> Self {
        self.block_dim = block_dim;
        self
    }

    pub fn with_fast_path(mut self, fast_path: bool) -> Self {
        self.fast_path = fast_path;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_min_parallel_work(mut self, min_parallel_work: usize) -> Self {
        self.min_parallel_work = min_parallel_work;
        self
    }

    /// Block dimension for an `m x k` by `k x n` problem: the configured
    /// bound, shrunk to the next power of two of the smallest extent but never
    /// below [`MIN_BLOCK_DIM`].
    ///
    /// Rows, columns and the contraction are all tiled with the same block,
    /// so a skinny extent padded to the full block would multiply the work by
    /// up to `block_dim`. Sizing from the smallest extent bounds the padding
    /// factor by [`MIN_BLOCK_DIM`] per axis.
    pub fn effective_block_dim(&self, m: usize, n: usize, k: usize) -> Result<usize> {
        if self.block_dim == 0 {
            return Err(DotGeneralError::InvalidBlockDim);
        }
        let fit = m.min(n).min(k).next_power_of_two().max(MIN_BLOCK_DIM);
        Ok(self.block_dim.min(fit))
    }
}

/// Which path executed a dot-general.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecPath {
    FastPath(FastPathKind),
    Blocked { tier: Tier, block_dim: usize },
}

impl fmt::Display for ExecPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecPath::FastPath(kind) => write!(f, "fast path ({kind})"),
            ExecPath::Blocked { tier, block_dim } => {
                write!(f, "blocked (tier {tier}, block {block_dim})")
            }
        }
    }
}

/// Dot-general engine bound to a capability provider.
///
/// The provider is queried on every call; [`NativeProvider`] answers from the
/// process-wide detection cache.
#[derive(Debug, Clone)]
pub struct Engine<P: CapabilityProvider = NativeProvider> {
    provider: P,
    config: EngineConfig,
}

impl Engine<NativeProvider> {
    /// Engine using the detected hardware capabilities.
    pub fn new() -> Self {
        Self::with_provider(NativeProvider::detect())
    }
}

impl Default for Engine<NativeProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: CapabilityProvider> Engine<P> {
    pub fn with_provider(provider: P) -> Self {
        Engine {
            provider,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Shape of the result of `lhs . rhs` over `axes`.
    pub fn output_shape(&self, lhs: &Buffer, rhs: &Buffer, axes: &DotGeneralAxes) -> Result<Shape> {
        let plan = DotGeneralPlan::new(lhs.shape(), rhs.shape(), axes)?;
        Ok(Shape::new(&plan.output_dims(), lhs.dtype()))
    }

    /// Contract into a freshly allocated buffer.
    pub fn dot_general(&self, lhs: &Buffer, rhs: &Buffer, axes: &DotGeneralAxes) -> Result<Buffer> {
        let mut out = Buffer::zeros(self.output_shape(lhs, rhs, axes)?);
        self.dot_general_into(lhs, rhs, axes, &mut out)?;
        Ok(out)
    }

    /// Contract into `output`, overwriting it. Returns the path taken.
    ///
    /// All metadata is validated before any buffer is read or written.
    pub fn dot_general_into(
        &self,
        lhs: &Buffer,
        rhs: &Buffer,
        axes: &DotGeneralAxes,
        output: &mut Buffer,
    ) -> Result<ExecPath> {
        let plan = DotGeneralPlan::new(lhs.shape(), rhs.shape(), axes)?;
        plan.check_output(output.shape(), lhs.dtype())?;
        let block_dim = self.config.effective_block_dim(plan.m, plan.n, plan.k)?;

        if self.config.fast_path {
            if let Some(kind) = classify(lhs.shape(), rhs.shape(), axes) {
                if execute_fast_path(&self.provider, lhs, rhs, axes, output)? {
                    log::debug!("dot-general {:?} via fast path ({kind})", plan.output_dims());
                    return Ok(ExecPath::FastPath(kind));
                }
            }
        }

        let tier = match lhs.dtype() {
            DType::F32 => self.run_blocked::<f32>(lhs, rhs, &plan, block_dim, output)?,
            DType::F64 => self.run_blocked::<f64>(lhs, rhs, &plan, block_dim, output)?,
            DType::I32 => self.run_blocked::<i32>(lhs, rhs, &plan, block_dim, output)?,
            DType::I64 => self.run_blocked::<i64>(lhs, rhs, &plan, block_dim, output)?,
        };
        log::debug!(
            "dot-general {:?} via blocked path (tier {tier}, block {block_dim}, {} tiles)",
            plan.output_dims(),
            plan.batch * plan.m.div_ceil(block_dim) * plan.n.div_ceil(block_dim)
        );
        Ok(ExecPath::Blocked { tier, block_dim })
    }

    fn run_blocked<T: Element>(
        &self,
        lhs: &Buffer,
        rhs: &Buffer,
        plan: &DotGeneralPlan,
        block_dim: usize,
        output: &mut Buffer,
    ) -> Result<Tier> {
        let tier = match T::DTYPE {
            DType::F32 => Tier::for_blocked(&self.provider.flags(), block_dim),
            _ => Tier::Scalar,
        };
        let layout = BlockLayout::new(plan.batch, plan.m, plan.n, plan.k, block_dim)?;

        let lhs_blocked = pack_lhs(lhs.typed::<T>()?, lhs.dims(), plan, &layout)?;
        let rhs_blocked = pack_rhs(rhs.typed::<T>()?, rhs.dims(), plan, &layout)?;
        let kernel = BlockKernel::build(&lhs_blocked, &rhs_blocked, layout, tier)?;

        let mut out_blocked = vec![T::zero(); layout.output_len()];
        run_tiles(&kernel, &mut out_blocked, &self.config)?;
        unpack_output(&out_blocked, &layout, output.typed_mut::<T>()?)?;
        Ok(tier)
    }
}
