//! Element types and their dot-product primitives.

use std::fmt;

use dotgeneral_kernel::{kernel_for, Tier};

use crate::buffer::BufferData;

/// Dtype tag carried by every [`Shape`](crate::Shape).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
}

impl DType {
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I32 => "i32",
            DType::I64 => "i64",
        })
    }
}

/// Arithmetic bounds shared by every element type.
pub trait ScalarBase:
    Copy
    + Send
    + Sync
    + fmt::Debug
    + std::ops::Mul<Output = Self>
    + std::ops::Add<Output = Self>
    + num_traits::Zero
    + num_traits::One
    + PartialEq
    + 'static
{
}

impl<T> ScalarBase for T where
    T: Copy
        + Send
        + Sync
        + fmt::Debug
        + std::ops::Mul<Output = T>
        + std::ops::Add<Output = T>
        + num_traits::Zero
        + num_traits::One
        + PartialEq
        + 'static
{
}

/// A dtype the engine can store and contract.
///
/// The default primitives are plain multiply-add loops and ignore the tier;
/// `f32` overrides them with the tiered kernels.
pub trait Element: ScalarBase {
    const DTYPE: DType;

    fn wrap(data: Vec<Self>) -> BufferData;

    fn view(data: &BufferData) -> Option<&[Self]>;

    fn view_mut(data: &mut BufferData) -> Option<&mut [Self]>;

    /// `acc + sum(a[i] * b[i])` over the common length.
    #[inline]
    fn dot_acc(_tier: Tier, a: &[Self], b: &[Self], acc: Self) -> Self {
        a.iter().zip(b).fold(acc, |s, (&x, &y)| s + x * y)
    }

    /// `acc[j] + dot(row, cols[j])` for each of four columns.
    #[inline]
    fn dot4_acc(tier: Tier, row: &[Self], cols: [&[Self]; 4], acc: [Self; 4]) -> [Self; 4] {
        [
            Self::dot_acc(tier, row, cols[0], acc[0]),
            Self::dot_acc(tier, row, cols[1], acc[1]),
            Self::dot_acc(tier, row, cols[2], acc[2]),
            Self::dot_acc(tier, row, cols[3], acc[3]),
        ]
    }
}

macro_rules! impl_element_storage {
    ($t:ty, $variant:ident) => {
        const DTYPE: DType = DType::$variant;

        #[inline]
        fn wrap(data: Vec<$t>) -> BufferData {
            BufferData::$variant(data)
        }

        #[inline]
        fn view(data: &BufferData) -> Option<&[$t]> {
            match data {
                BufferData::$variant(v) => Some(v),
                _ => None,
            }
        }

        #[inline]
        fn view_mut(data: &mut BufferData) -> Option<&mut [$t]> {
            match data {
                BufferData::$variant(v) => Some(v),
                _ => None,
            }
        }
    };
}

impl Element for f32 {
    impl_element_storage!(f32, F32);

    #[inline]
    fn dot_acc(tier: Tier, a: &[f32], b: &[f32], acc: f32) -> f32 {
        kernel_for(tier).dot_acc(a, b, acc)
    }

    #[inline]
    fn dot4_acc(tier: Tier, row: &[f32], cols: [&[f32]; 4], acc: [f32; 4]) -> [f32; 4] {
        kernel_for(tier).dot4_acc(row, cols, acc)
    }
}

impl Element for f64 {
    impl_element_storage!(f64, F64);
}

impl Element for i32 {
    impl_element_storage!(i32, I32);
}

impl Element for i64 {
    impl_element_storage!(i64, I64);
}
