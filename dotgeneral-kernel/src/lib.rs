//! Capability detection and tiered f32 dot-product primitives.
//!
//! This crate provides the bottom layer of the dot-general engine:
//!
//! - [`caps`]: one-time runtime detection of SIMD capabilities
//! - [`provider`]: injectable capability sources and tier selection
//! - [`dot`]: the [`DotProductKernel`] trait and its scalar, vector and
//!   streaming-matrix implementations
//! - [`streaming`]: the RAII guard bracketing streaming-mode execution
//!
//! # Example
//!
//! ```rust
//! use dotgeneral_kernel::{kernel_for, CapabilityProvider, DotProductKernel, NativeProvider, Tier};
//!
//! let flags = NativeProvider::detect().flags();
//! let kernel = kernel_for(Tier::for_fast_path(&flags, 128));
//! let a = vec![1.0f32; 128];
//! let b = vec![2.0f32; 128];
//! assert_eq!(kernel.dot(&a, &b), 256.0);
//! ```

pub mod caps;
pub mod dot;
pub mod provider;
mod scalar;
mod simd;
pub mod streaming;

pub use caps::{detect, CapabilityFlags};
pub use dot::{dot_at, kernel_for, DotProductKernel, ScalarKernel, StreamingKernel, VectorKernel};
pub use provider::{
    CapabilityProvider, NativeProvider, ScalarOnlyProvider, Tier, VectorOnlyProvider,
    STREAMING_MIN_LEN, VECTOR_MIN_LEN,
};
pub use streaming::StreamingSession;
