//! Shared helpers: permutation checks and multi-index iteration.

/// Whether `perm` is `0, 1, ..., n-1`.
pub(crate) fn is_identity(perm: &[usize]) -> bool {
    perm.iter().enumerate().all(|(i, &p)| i == p)
}

/// Odometer over multi-dimensional indices, last index fastest.
///
/// Call [`next`](Iterator::next) before reading the first index; a rank-0
/// index yields exactly once and any zero-sized dimension yields nothing.
pub(crate) struct MultiIndex {
    dims: Vec<usize>,
    current: Vec<usize>,
    total: usize,
    count: usize,
}

impl MultiIndex {
    pub(crate) fn new(dims: &[usize]) -> Self {
        let total: usize = dims.iter().product();
        Self {
            dims: dims.to_vec(),
            current: vec![0; dims.len()],
            total,
            count: 0,
        }
    }

    #[inline]
    pub(crate) fn current(&self) -> &[usize] {
        &self.current
    }

    /// Element offset of the current index for the given strides.
    #[inline]
    pub(crate) fn offset(&self, strides: &[usize]) -> usize {
        self.current
            .iter()
            .zip(strides.iter())
            .map(|(&i, &s)| i * s)
            .sum()
    }

    pub(crate) fn reset(&mut self) {
        self.current.fill(0);
        self.count = 0;
    }
}

impl Iterator for MultiIndex {
    type Item = ();

    fn next(&mut self) -> Option<()> {
        if self.count >= self.total {
            return None;
        }
        if self.count > 0 {
            for i in (0..self.dims.len()).rev() {
                self.current[i] += 1;
                if self.current[i] < self.dims[i] {
                    break;
                }
                self.current[i] = 0;
            }
        }
        self.count += 1;
        Some(())
    }
}
