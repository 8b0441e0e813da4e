//! Scalar dot products unrolled by 8.

const UNROLL: usize = 8;

/// `sum(a[i] * b[i])` over the common length, eight products per step.
#[inline]
pub(crate) fn dot_unrolled(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let (a, b) = (&a[..n], &b[..n]);
    let a_chunks = a.chunks_exact(UNROLL);
    let b_chunks = b.chunks_exact(UNROLL);
    let a_rem = a_chunks.remainder();
    let b_rem = b_chunks.remainder();

    let mut sum = 0.0f32;
    for (x, y) in a_chunks.zip(b_chunks) {
        sum += x[0] * y[0]
            + x[1] * y[1]
            + x[2] * y[2]
            + x[3] * y[3]
            + x[4] * y[4]
            + x[5] * y[5]
            + x[6] * y[6]
            + x[7] * y[7];
    }
    for (&x, &y) in a_rem.iter().zip(b_rem) {
        sum += x * y;
    }
    sum
}
