//! Fast path: `f32` matmul shapes run directly on the caller's layout.
//!
//! Loop order is batch, then output row, then output column. Each output
//! element is one dot product of length `K`. The rhs `[K, N]` panel of a batch
//! is packed once into `[N, K]` so every column is contiguous.

use dotgeneral_kernel::{kernel_for, CapabilityProvider, DotProductKernel, Tier};

use crate::buffer::Buffer;
use crate::classify::{classify, FastPathKind};
use crate::element::DType;
use crate::plan::{DotGeneralAxes, DotGeneralPlan};
use crate::Result;

/// Run `lhs . rhs` on the fast path if the operation qualifies.
///
/// Returns `Ok(false)` without touching `output` when the dtypes are not
/// both `f32` or the shapes are not a canonical fast-path pattern; the
/// caller should then take the general path. `Ok(true)` means the complete
/// result was written. Malformed metadata on a qualifying pattern is an
/// error.
pub fn execute_fast_path<P: CapabilityProvider + ?Sized>(
    provider: &P,
    lhs: &Buffer,
    rhs: &Buffer,
    axes: &DotGeneralAxes,
    output: &mut Buffer,
) -> Result<bool> {
    if lhs.dtype() != DType::F32 || rhs.dtype() != DType::F32 {
        return Ok(false);
    }
    let Some(kind) = classify(lhs.shape(), rhs.shape(), axes) else {
        return Ok(false);
    };
    let plan = DotGeneralPlan::new(lhs.shape(), rhs.shape(), axes)?;
    plan.check_output(output.shape(), DType::F32)?;

    let tier = Tier::for_fast_path(&provider.flags(), plan.k);
    let kernel = kernel_for(tier);
    log::trace!(
        "fast path {kind}: batch={} m={} n={} k={} tier={tier}",
        plan.batch,
        plan.m,
        plan.n,
        plan.k
    );

    let a = lhs.typed::<f32>()?;
    let b = rhs.typed::<f32>()?;
    let c = output.typed_mut::<f32>()?;
    match kind {
        FastPathKind::MatVec => matvec(kernel, a, b, c, plan.k),
        FastPathKind::MatMul | FastPathKind::BatchedMatMul | FastPathKind::DoubleBatchedMatMul => {
            batched_matmul(kernel, a, b, c, plan.batch, plan.m, plan.n, plan.k)
        }
    }
    Ok(true)
}

fn matvec(kernel: &dyn DotProductKernel, a: &[f32], x: &[f32], y: &mut [f32], k: usize) {
    for (i, out) in y.iter_mut().enumerate() {
        *out = kernel.dot(&a[i * k..(i + 1) * k], x);
    }
}

#[allow(clippy::too_many_arguments)]
fn batched_matmul(
    kernel: &dyn DotProductKernel,
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    batch: usize,
    m: usize,
    n: usize,
    k: usize,
) {
    let mut panel = vec![0.0f32; n * k];
    for bi in 0..batch {
        let a_batch = &a[bi * m * k..(bi + 1) * m * k];
        let b_batch = &b[bi * k * n..(bi + 1) * k * n];
        let c_batch = &mut c[bi * m * n..(bi + 1) * m * n];

        pack_panel(b_batch, k, n, &mut panel);
        for i in 0..m {
            let row = &a_batch[i * k..(i + 1) * k];
            let out_row = &mut c_batch[i * n..(i + 1) * n];
            row_times_panel(kernel, row, &panel, k, out_row);
        }
    }
}

/// `panel[j * k + kk] = b[kk * n + j]`.
fn pack_panel(b: &[f32], k: usize, n: usize, panel: &mut [f32]) {
    for kk in 0..k {
        for (j, &v) in b[kk * n..(kk + 1) * n].iter().enumerate() {
            panel[j * k + kk] = v;
        }
    }
}

/// `out[j] = dot(row, panel column j)` for every column of a packed panel.
fn row_times_panel(
    kernel: &dyn DotProductKernel,
    row: &[f32],
    panel: &[f32],
    k: usize,
    out: &mut [f32],
) {
    let n = out.len();
    let col = move |j: usize| &panel[j * k..(j + 1) * k];
    let mut j = 0;
    if kernel.tier() != Tier::Scalar {
        while j + 4 <= n {
            let sums = kernel.dot4(row, [col(j), col(j + 1), col(j + 2), col(j + 3)]);
            out[j..j + 4].copy_from_slice(&sums);
            j += 4;
        }
    }
    for jj in j..n {
        out[jj] = kernel.dot(row, col(jj));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::dot_general_naive;
    use approx::assert_relative_eq;
    use dotgeneral_kernel::{CapabilityFlags, ScalarOnlyProvider, VectorOnlyProvider};

    fn providers() -> Vec<Box<dyn CapabilityProvider>> {
        vec![
            Box::new(ScalarOnlyProvider),
            Box::new(VectorOnlyProvider),
            Box::new(CapabilityFlags {
                streaming_matrix: true,
                vector: true,
                ..CapabilityFlags::SCALAR
            }),
        ]
    }

    fn seq(dims: &[usize], scale: f32) -> Buffer {
        Buffer::from_fn(dims, |idx| {
            let s: usize = idx.iter().enumerate().map(|(d, &i)| (d + 1) * i).sum();
            ((s % 7) as f32 - 3.0) * scale
        })
    }

    fn run(
        provider: &dyn CapabilityProvider,
        lhs: &Buffer,
        rhs: &Buffer,
        axes: &DotGeneralAxes,
    ) -> Option<Buffer> {
        let plan = DotGeneralPlan::new(lhs.shape(), rhs.shape(), axes).unwrap();
        let mut out = Buffer::zeros(crate::Shape::new(&plan.output_dims(), DType::F32));
        execute_fast_path(provider, lhs, rhs, axes, &mut out)
            .unwrap()
            .then_some(out)
    }

    fn assert_matches_reference(lhs: &Buffer, rhs: &Buffer, axes: &DotGeneralAxes) {
        let expected = dot_general_naive(lhs, rhs, axes).unwrap();
        for provider in providers() {
            let out = run(provider.as_ref(), lhs, rhs, axes).expect("fast path taken");
            assert_eq!(out.dims(), expected.dims());
            let got = out.as_slice::<f32>().unwrap();
            let want = expected.as_slice::<f32>().unwrap();
            for (g, w) in got.iter().zip(want) {
                assert_relative_eq!(*g, *w, epsilon = 1e-4, max_relative = 1e-4);
            }
        }
    }

    #[test]
    fn test_ones_times_twos_128() {
        let lhs = Buffer::from_vec(&[128, 128], vec![1.0f32; 128 * 128]).unwrap();
        let rhs = Buffer::from_vec(&[128, 128], vec![2.0f32; 128 * 128]).unwrap();
        for provider in providers() {
            let out = run(provider.as_ref(), &lhs, &rhs, &DotGeneralAxes::matmul()).unwrap();
            assert!(out.as_slice::<f32>().unwrap().iter().all(|&x| x == 256.0));
        }
    }

    #[test]
    fn test_matmul_8x4_4x6() {
        assert_matches_reference(
            &seq(&[8, 4], 1.0),
            &seq(&[4, 6], 0.5),
            &DotGeneralAxes::matmul(),
        );
    }

    #[test]
    fn test_matmul_odd_columns() {
        // n = 7 exercises the grouped columns plus a remainder
        assert_matches_reference(
            &seq(&[5, 33], 0.25),
            &seq(&[33, 7], 1.0),
            &DotGeneralAxes::matmul(),
        );
    }

    #[test]
    fn test_matvec() {
        assert_matches_reference(
            &seq(&[9, 17], 1.0),
            &seq(&[17], 2.0),
            &DotGeneralAxes::new(&[1], &[0]),
        );
    }

    #[test]
    fn test_batched() {
        assert_matches_reference(
            &seq(&[3, 4, 10], 1.0),
            &seq(&[3, 10, 5], 1.0),
            &DotGeneralAxes::batched_matmul(),
        );
        assert_matches_reference(
            &seq(&[2, 3, 4, 6], 0.5),
            &seq(&[2, 3, 6, 9], 1.0),
            &DotGeneralAxes::new(&[3], &[2]).with_batch(&[0, 1], &[0, 1]),
        );
    }

    #[test]
    fn test_empty_contraction_writes_zeros() {
        let lhs = Buffer::from_vec::<f32>(&[3, 0], vec![]).unwrap();
        let rhs = Buffer::from_vec::<f32>(&[0, 2], vec![]).unwrap();
        let mut out = Buffer::from_vec(&[3, 2], vec![9.0f32; 6]).unwrap();
        let axes = DotGeneralAxes::matmul();
        assert!(execute_fast_path(&ScalarOnlyProvider, &lhs, &rhs, &axes, &mut out).unwrap());
        assert!(out.as_slice::<f32>().unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_declines_without_touching_output() {
        let mut out = Buffer::from_vec(&[8, 6], vec![7.0f32; 48]).unwrap();

        // transposed rhs layout
        let lhs = seq(&[8, 4], 1.0);
        let rhs_t = seq(&[6, 4], 1.0);
        let axes = DotGeneralAxes::new(&[1], &[1]);
        let taken = execute_fast_path(&VectorOnlyProvider, &lhs, &rhs_t, &axes, &mut out).unwrap();
        assert!(!taken);

        // non-f32 dtype
        let lhs64 = Buffer::from_vec(&[8, 4], vec![1.0f64; 32]).unwrap();
        let rhs64 = Buffer::from_vec(&[4, 6], vec![1.0f64; 24]).unwrap();
        let axes = DotGeneralAxes::matmul();
        let taken =
            execute_fast_path(&VectorOnlyProvider, &lhs64, &rhs64, &axes, &mut out).unwrap();
        assert!(!taken);

        assert!(out.as_slice::<f32>().unwrap().iter().all(|&x| x == 7.0));
    }

    #[test]
    fn test_errors_on_bad_metadata() {
        let axes = DotGeneralAxes::matmul();
        let lhs = seq(&[8, 4], 1.0);
        let rhs = seq(&[5, 6], 1.0);
        let mut out = Buffer::zeros(crate::Shape::new(&[8, 6], DType::F32));
        assert!(execute_fast_path(&ScalarOnlyProvider, &lhs, &rhs, &axes, &mut out).is_err());

        let rhs = seq(&[4, 6], 1.0);
        let mut wrong = Buffer::zeros(crate::Shape::new(&[6, 8], DType::F32));
        assert!(execute_fast_path(&ScalarOnlyProvider, &lhs, &rhs, &axes, &mut wrong).is_err());
    }
}
