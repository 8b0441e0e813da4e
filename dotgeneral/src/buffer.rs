//! Owned flat buffers and their shapes.

use smallvec::SmallVec;

use crate::element::{DType, Element};
use crate::{DotGeneralError, Result};

/// Dimension sizes plus a dtype tag. Row-major (last axis contiguous).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: SmallVec<[usize; 6]>,
    dtype: DType,
}

impl Shape {
    pub fn new(dims: &[usize], dtype: DType) -> Self {
        Shape {
            dims: SmallVec::from_slice(dims),
            dtype,
        }
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Number of elements; `1` for rank 0.
    #[inline]
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Row-major element strides.
    pub fn strides(&self) -> SmallVec<[usize; 6]> {
        let mut strides: SmallVec<[usize; 6]> = SmallVec::from_elem(1, self.dims.len());
        for i in (0..self.dims.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }
}

/// Typed storage behind a [`Buffer`].
#[derive(Debug, Clone, PartialEq)]
pub enum BufferData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

impl BufferData {
    pub fn dtype(&self) -> DType {
        match self {
            BufferData::F32(_) => DType::F32,
            BufferData::F64(_) => DType::F64,
            BufferData::I32(_) => DType::I32,
            BufferData::I64(_) => DType::I64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BufferData::F32(v) => v.len(),
            BufferData::F64(v) => v.len(),
            BufferData::I32(v) => v.len(),
            BufferData::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::F32 => BufferData::F32(vec![0.0; len]),
            DType::F64 => BufferData::F64(vec![0.0; len]),
            DType::I32 => BufferData::I32(vec![0; len]),
            DType::I64 => BufferData::I64(vec![0; len]),
        }
    }
}

/// An owned, contiguous, row-major array.
///
/// The data length always equals the shape's element count and the data
/// variant always matches the shape's dtype.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    shape: Shape,
    data: BufferData,
}

impl Buffer {
    /// Wrap `data` with the given dims; the dtype follows `T`.
    pub fn from_vec<T: Element>(dims: &[usize], data: Vec<T>) -> Result<Self> {
        let shape = Shape::new(dims, T::DTYPE);
        let expected = shape.num_elements();
        if data.len() != expected {
            return Err(DotGeneralError::BufferLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Buffer {
            shape,
            data: T::wrap(data),
        })
    }

    /// Build a buffer by evaluating `f` at every row-major multi-index.
    pub fn from_fn<T: Element>(dims: &[usize], mut f: impl FnMut(&[usize]) -> T) -> Self {
        let shape = Shape::new(dims, T::DTYPE);
        let mut index = crate::util::MultiIndex::new(dims);
        let mut data = Vec::with_capacity(shape.num_elements());
        while index.next().is_some() {
            data.push(f(index.current()));
        }
        Buffer {
            shape,
            data: T::wrap(data),
        }
    }

    /// Zero-filled buffer for `shape`.
    pub fn zeros(shape: Shape) -> Self {
        let data = BufferData::zeros(shape.dtype(), shape.num_elements());
        Buffer { shape, data }
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        self.shape.dtype()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &BufferData {
        &self.data
    }

    /// Typed view; `None` if `T` is not the buffer's dtype.
    #[inline]
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::view(&self.data)
    }

    #[inline]
    pub fn as_mut_slice<T: Element>(&mut self) -> Option<&mut [T]> {
        T::view_mut(&mut self.data)
    }

    /// Typed view or a [`DotGeneralError::DTypeMismatch`].
    pub(crate) fn typed<T: Element>(&self) -> Result<&[T]> {
        let actual = self.dtype();
        T::view(&self.data).ok_or(DotGeneralError::DTypeMismatch {
            expected: T::DTYPE,
            actual,
        })
    }

    pub(crate) fn typed_mut<T: Element>(&mut self) -> Result<&mut [T]> {
        let actual = self.dtype();
        T::view_mut(&mut self.data).ok_or(DotGeneralError::DTypeMismatch {
            expected: T::DTYPE,
            actual,
        })
    }
}
