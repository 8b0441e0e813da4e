//! Block-tiled kernel for the general path.
//!
//! Operands are stored as zero-padded `d x d` blocks (see [`BlockLayout`]).
//! The output is partitioned into tiles, one per
//! `(batch, row_block, col_block)`; every tile owns a disjoint `d * d` chunk
//! of the blocked output.

use dotgeneral_kernel::{StreamingSession, Tier};

use crate::element::Element;
use crate::{DotGeneralError, Operand, Result};

/// Geometry of the blocked operands.
///
/// With `d = block_dim`:
/// - lhs: `[batch][row_blocks][k_blocks][d rows][d k]`
/// - rhs: `[batch][col_blocks][k_blocks][d cols][d k]`
/// - output: `[batch][row_blocks][col_blocks][d rows][d cols]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub batch: usize,
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub block_dim: usize,
}

/// One output tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pub batch: usize,
    pub row_block: usize,
    pub col_block: usize,
}

impl BlockLayout {
    pub fn new(batch: usize, m: usize, n: usize, k: usize, block_dim: usize) -> Result<Self> {
        if block_dim == 0 {
            return Err(DotGeneralError::InvalidBlockDim);
        }
        Ok(BlockLayout {
            batch,
            m,
            n,
            k,
            block_dim,
        })
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_dim * self.block_dim
    }

    #[inline]
    pub fn row_blocks(&self) -> usize {
        self.m.div_ceil(self.block_dim)
    }

    #[inline]
    pub fn col_blocks(&self) -> usize {
        self.n.div_ceil(self.block_dim)
    }

    #[inline]
    pub fn k_blocks(&self) -> usize {
        self.k.div_ceil(self.block_dim)
    }

    pub fn lhs_len(&self) -> usize {
        self.batch * self.row_blocks() * self.k_blocks() * self.block_size()
    }

    pub fn rhs_len(&self) -> usize {
        self.batch * self.col_blocks() * self.k_blocks() * self.block_size()
    }

    pub fn output_len(&self) -> usize {
        self.num_tiles() * self.block_size()
    }

    pub fn num_tiles(&self) -> usize {
        self.batch * self.row_blocks() * self.col_blocks()
    }

    /// Multiply-adds executed over all tiles, padding included.
    pub fn padded_work(&self) -> usize {
        self.num_tiles() * self.k_blocks() * self.block_size() * self.block_dim
    }

    /// Tile for a linear tile index (row-major over batch, row block, col block).
    pub fn tile(&self, index: usize) -> Tile {
        let col_blocks = self.col_blocks();
        let per_batch = self.row_blocks() * col_blocks;
        Tile {
            batch: index / per_batch,
            row_block: (index % per_batch) / col_blocks,
            col_block: index % col_blocks,
        }
    }

    pub fn tile_index(&self, tile: Tile) -> usize {
        (tile.batch * self.row_blocks() + tile.row_block) * self.col_blocks() + tile.col_block
    }

    /// Start of block `(batch, outer, kb)` in a blocked lhs or rhs buffer.
    #[inline]
    fn operand_block(&self, outer_blocks: usize, batch: usize, outer: usize, kb: usize) -> usize {
        ((batch * outer_blocks + outer) * self.k_blocks() + kb) * self.block_size()
    }
}

/// Computes output tiles from blocked operands.
///
/// Holds only shared borrows of the operands, so one kernel can serve any
/// number of threads, each writing its own tile.
#[derive(Debug, Clone, Copy)]
pub struct BlockKernel<'a, T> {
    lhs: &'a [T],
    rhs: &'a [T],
    layout: BlockLayout,
    tier: Tier,
}

impl<'a, T: Element> BlockKernel<'a, T> {
    /// Validate blocked operand lengths against `layout`.
    pub fn build(lhs: &'a [T], rhs: &'a [T], layout: BlockLayout, tier: Tier) -> Result<Self> {
        if lhs.len() != layout.lhs_len() {
            return Err(DotGeneralError::BlockedLength {
                operand: Operand::Lhs,
                expected: layout.lhs_len(),
                actual: lhs.len(),
            });
        }
        if rhs.len() != layout.rhs_len() {
            return Err(DotGeneralError::BlockedLength {
                operand: Operand::Rhs,
                expected: layout.rhs_len(),
                actual: rhs.len(),
            });
        }
        Ok(BlockKernel {
            lhs,
            rhs,
            layout,
            tier,
        })
    }

    #[inline]
    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    #[inline]
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Accumulate tile `tile` into `out` (`block_dim * block_dim` elements,
    /// row-major), on top of whatever partial sums `out` already holds.
    ///
    /// # Panics
    ///
    /// Panics if `out` is not exactly one block or `tile` is out of range.
    pub fn run_tile(&self, tile: Tile, out: &mut [T]) {
        let d = self.layout.block_dim;
        let bs = self.layout.block_size();
        assert_eq!(out.len(), bs, "tile output must be one block");
        let row_blocks = self.layout.row_blocks();
        let col_blocks = self.layout.col_blocks();
        assert!(
            tile.batch < self.layout.batch
                && tile.row_block < row_blocks
                && tile.col_block < col_blocks,
            "tile {tile:?} out of range for {row_blocks}x{col_blocks} blocks over {} batches",
            self.layout.batch
        );

        let _session = (self.tier == Tier::StreamingMatrix).then(StreamingSession::enter);

        for kb in 0..self.layout.k_blocks() {
            let a_start = self
                .layout
                .operand_block(row_blocks, tile.batch, tile.row_block, kb);
            let b_start = self
                .layout
                .operand_block(col_blocks, tile.batch, tile.col_block, kb);
            let a_block = &self.lhs[a_start..a_start + bs];
            let b_block = &self.rhs[b_start..b_start + bs];
            let col = move |j: usize| &b_block[j * d..(j + 1) * d];

            for (r, out_row) in out.chunks_exact_mut(d).enumerate() {
                let row = &a_block[r * d..(r + 1) * d];
                let mut c = 0;
                while c + 4 <= d {
                    let acc = [out_row[c], out_row[c + 1], out_row[c + 2], out_row[c + 3]];
                    let cols = [col(c), col(c + 1), col(c + 2), col(c + 3)];
                    let sums = T::dot4_acc(self.tier, row, cols, acc);
                    out_row[c..c + 4].copy_from_slice(&sums);
                    c += 4;
                }
                for cc in c..d {
                    out_row[cc] = T::dot_acc(self.tier, row, col(cc), out_row[cc]);
                }
            }
        }
    }
}
