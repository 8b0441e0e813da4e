//! Vector dot products.
//!
//! With the `simd` feature these go through `pulp`'s runtime dispatch, which
//! picks the widest instruction set the CPU supports (AVX2+FMA, NEON, ...).
//! Without it they are plain lane-array loops the compiler auto-vectorizes.
//!
//! All functions operate on slices of equal length; callers truncate first.

/// Single dot product with two vector accumulators.
#[inline]
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    imp::dot(a, b)
}

/// Single dot product with four independent vector accumulators (ILP-4).
#[inline]
pub(crate) fn dot_ilp4(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    imp::dot_ilp4(a, b)
}

/// Four dot products sharing one row operand; the row is loaded once per step.
#[inline]
pub(crate) fn dot4(row: &[f32], cols: [&[f32]; 4]) -> [f32; 4] {
    debug_assert!(cols.iter().all(|c| c.len() == row.len()));
    imp::dot4(row, cols)
}

#[cfg(feature = "simd")]
mod imp {
    use pulp::{Simd, WithSimd};

    /// `sum(a[i] * b[i])` with `N` independent vector accumulators; the
    /// accumulators are combined pairwise only after the main loop.
    struct DotAccumulators<'a, const N: usize> {
        a: &'a [f32],
        b: &'a [f32],
    }

    impl<'a, const N: usize> WithSimd for DotAccumulators<'a, N> {
        type Output = f32;

        #[inline(always)]
        fn with_simd<S: Simd>(self, simd: S) -> Self::Output {
            let (a_head, a_tail) = S::as_simd_f32s(self.a);
            let (b_head, b_tail) = S::as_simd_f32s(self.b);

            let mut accs = [simd.splat_f32s(0.0); N];
            let a_groups = a_head.chunks_exact(N);
            let b_groups = b_head.chunks_exact(N);
            let (a_rest, b_rest) = (a_groups.remainder(), b_groups.remainder());
            for (xs, ys) in a_groups.zip(b_groups) {
                for ((acc, &x), &y) in accs.iter_mut().zip(xs).zip(ys) {
                    *acc = simd.mul_add_f32s(x, y, *acc);
                }
            }
            for ((acc, &x), &y) in accs.iter_mut().zip(a_rest).zip(b_rest) {
                *acc = simd.mul_add_f32s(x, y, *acc);
            }

            let mut width = N;
            while width > 1 {
                let half = width / 2;
                for i in 0..half {
                    accs[i] = simd.add_f32s(accs[i], accs[i + half]);
                }
                if width % 2 == 1 {
                    accs[0] = simd.add_f32s(accs[0], accs[width - 1]);
                }
                width = half;
            }

            let mut sum = simd.reduce_sum_f32s(accs[0]);
            for (&x, &y) in a_tail.iter().zip(b_tail) {
                sum += x * y;
            }
            sum
        }
    }

    pub(super) fn dot(a: &[f32], b: &[f32]) -> f32 {
        pulp::Arch::new().dispatch(DotAccumulators::<2> { a, b })
    }

    pub(super) fn dot_ilp4(a: &[f32], b: &[f32]) -> f32 {
        pulp::Arch::new().dispatch(DotAccumulators::<4> { a, b })
    }

    pub(super) fn dot4(row: &[f32], cols: [&[f32]; 4]) -> [f32; 4] {
        struct Dot4<'a> {
            row: &'a [f32],
            cols: [&'a [f32]; 4],
        }
        impl<'a> WithSimd for Dot4<'a> {
            type Output = [f32; 4];

            #[inline(always)]
            fn with_simd<S: Simd>(self, simd: S) -> Self::Output {
                let (r_head, r_tail) = S::as_simd_f32s(self.row);
                let (c0_head, c0_tail) = S::as_simd_f32s(self.cols[0]);
                let (c1_head, c1_tail) = S::as_simd_f32s(self.cols[1]);
                let (c2_head, c2_tail) = S::as_simd_f32s(self.cols[2]);
                let (c3_head, c3_tail) = S::as_simd_f32s(self.cols[3]);

                let mut acc0 = simd.splat_f32s(0.0);
                let mut acc1 = simd.splat_f32s(0.0);
                let mut acc2 = simd.splat_f32s(0.0);
                let mut acc3 = simd.splat_f32s(0.0);

                for i in 0..r_head.len() {
                    let r = r_head[i];
                    acc0 = simd.mul_add_f32s(r, c0_head[i], acc0);
                    acc1 = simd.mul_add_f32s(r, c1_head[i], acc1);
                    acc2 = simd.mul_add_f32s(r, c2_head[i], acc2);
                    acc3 = simd.mul_add_f32s(r, c3_head[i], acc3);
                }

                let mut out = [
                    simd.reduce_sum_f32s(acc0),
                    simd.reduce_sum_f32s(acc1),
                    simd.reduce_sum_f32s(acc2),
                    simd.reduce_sum_f32s(acc3),
                ];
                for (j, &r) in r_tail.iter().enumerate() {
                    out[0] += r * c0_tail[j];
                    out[1] += r * c1_tail[j];
                    out[2] += r * c2_tail[j];
                    out[3] += r * c3_tail[j];
                }
                out
            }
        }

        pulp::Arch::new().dispatch(Dot4 { row, cols })
    }
}

#[cfg(not(feature = "simd"))]
mod imp {
    const LANES: usize = 8;

    #[inline(always)]
    fn lanes_dot(a: &[f32], b: &[f32], acc: &mut [f32; LANES]) {
        for (x, y) in a.chunks_exact(LANES).zip(b.chunks_exact(LANES)) {
            for l in 0..LANES {
                acc[l] += x[l] * y[l];
            }
        }
    }

    #[inline(always)]
    fn tail_start(n: usize, step: usize) -> usize {
        n - n % step
    }

    pub(super) fn dot(a: &[f32], b: &[f32]) -> f32 {
        let mut acc = [0.0f32; LANES];
        lanes_dot(a, b, &mut acc);
        let start = tail_start(a.len(), LANES);
        let mut sum: f32 = acc.iter().sum();
        for (&x, &y) in a[start..].iter().zip(&b[start..]) {
            sum += x * y;
        }
        sum
    }

    pub(super) fn dot_ilp4(a: &[f32], b: &[f32]) -> f32 {
        const STEP: usize = 4 * LANES;
        let mut accs = [[0.0f32; LANES]; 4];
        for (x, y) in a.chunks_exact(STEP).zip(b.chunks_exact(STEP)) {
            for (k, acc) in accs.iter_mut().enumerate() {
                let lo = k * LANES;
                lanes_dot(&x[lo..lo + LANES], &y[lo..lo + LANES], acc);
            }
        }
        let start = tail_start(a.len(), STEP);
        let mut sum: f32 = accs.iter().flatten().sum();
        sum += dot(&a[start..], &b[start..]);
        sum
    }

    pub(super) fn dot4(row: &[f32], cols: [&[f32]; 4]) -> [f32; 4] {
        let mut accs = [[0.0f32; LANES]; 4];
        for (i, r) in row.chunks_exact(LANES).enumerate() {
            let lo = i * LANES;
            for (acc, col) in accs.iter_mut().zip(cols.iter()) {
                let c = &col[lo..lo + LANES];
                for l in 0..LANES {
                    acc[l] += r[l] * c[l];
                }
            }
        }
        let start = tail_start(row.len(), LANES);
        let mut out = [0.0f32; 4];
        for ((o, acc), col) in out.iter_mut().zip(accs.iter()).zip(cols.iter()) {
            *o = acc.iter().sum();
            for (&x, &y) in row[start..].iter().zip(&col[start..]) {
                *o += x * y;
            }
        }
        out
    }
}
