//! Tile execution, parallel over rayon when it pays off.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::blocked::BlockKernel;
use crate::element::Element;
use crate::engine::EngineConfig;
use crate::{DotGeneralError, Operand, Result};

/// Run every tile of `kernel` into `output_blocked`.
///
/// The blocked output is split into one `block_dim * block_dim` chunk per
/// tile, so tiles never share storage. Tiles accumulate into the chunk, so
/// `output_blocked` normally starts zeroed.
///
/// Runs on the rayon pool when the `parallel` feature is enabled,
/// `config.parallel` is set, there is more than one tile and the padded work
/// reaches `config.min_parallel_work`; sequentially otherwise.
pub fn run_tiles<T: Element>(
    kernel: &BlockKernel<'_, T>,
    output_blocked: &mut [T],
    config: &EngineConfig,
) -> Result<()> {
    let layout = *kernel.layout();
    if output_blocked.len() != layout.output_len() {
        return Err(DotGeneralError::BlockedLength {
            operand: Operand::Output,
            expected: layout.output_len(),
            actual: output_blocked.len(),
        });
    }
    let bs = layout.block_size();
    let work = layout.padded_work();

    #[cfg(feature = "parallel")]
    {
        if config.parallel && layout.num_tiles() > 1 && work >= config.min_parallel_work {
            log::trace!(
                "running {} tiles in parallel ({work} multiply-adds, tier {})",
                layout.num_tiles(),
                kernel.tier()
            );
            output_blocked
                .par_chunks_mut(bs)
                .enumerate()
                .for_each(|(index, chunk)| kernel.run_tile(layout.tile(index), chunk));
            return Ok(());
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = config;

    log::trace!(
        "running {} tiles sequentially ({work} multiply-adds, tier {})",
        layout.num_tiles(),
        kernel.tier()
    );
    for (index, chunk) in output_blocked.chunks_mut(bs).enumerate() {
        kernel.run_tile(layout.tile(index), chunk);
    }
    Ok(())
}
