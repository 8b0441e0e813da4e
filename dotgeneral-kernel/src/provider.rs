//! Capability providers and tier selection.
//!
//! A [`CapabilityProvider`] answers "which tiers exist" and is chosen once,
//! then injected into whatever dispatches kernels. Kernels themselves only
//! know "how a tier computes" (see [`crate::dot`]).

use std::fmt;

use crate::caps::{self, CapabilityFlags};

/// Minimum contracted length for the vector tier to pay off.
pub const VECTOR_MIN_LEN: usize = 4;

/// Minimum contracted length (block dimension) for the streaming tier.
/// Entering and leaving streaming mode costs more than it saves below this.
pub const STREAMING_MIN_LEN: usize = 64;

/// f32 execution tiers, ordered by increasing hardware requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Scalar,
    Vector,
    StreamingMatrix,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Scalar, Tier::Vector, Tier::StreamingMatrix];

    pub const fn as_str(self) -> &'static str {
        match self {
            Tier::Scalar => "scalar",
            Tier::Vector => "vector",
            Tier::StreamingMatrix => "streaming-matrix",
        }
    }

    /// Tier for the fast path: the streaming tier is never used there.
    pub fn for_fast_path(flags: &CapabilityFlags, contracted_len: usize) -> Tier {
        if flags.vector && contracted_len >= VECTOR_MIN_LEN {
            Tier::Vector
        } else {
            Tier::Scalar
        }
    }

    /// Tier for the block-tiled path, where `block_dim` is the contracted
    /// length of every inner dot product.
    pub fn for_blocked(flags: &CapabilityFlags, block_dim: usize) -> Tier {
        if flags.streaming_matrix && block_dim >= STREAMING_MIN_LEN {
            Tier::StreamingMatrix
        } else {
            Tier::for_fast_path(flags, block_dim)
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of capability flags for kernel dispatch.
///
/// `CapabilityFlags` itself implements this trait, so any fixed set of flags
/// can stand in for the hardware in tests.
pub trait CapabilityProvider: Send + Sync + fmt::Debug {
    fn flags(&self) -> CapabilityFlags;

    fn name(&self) -> &'static str;
}

/// Flags detected from the running hardware (cached process-wide).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeProvider {
    flags: CapabilityFlags,
}

impl NativeProvider {
    pub fn detect() -> Self {
        NativeProvider {
            flags: caps::detect(),
        }
    }
}

impl Default for NativeProvider {
    fn default() -> Self {
        Self::detect()
    }
}

impl CapabilityProvider for NativeProvider {
    fn flags(&self) -> CapabilityFlags {
        self.flags
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

/// Vector tier only: never selects the streaming tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VectorOnlyProvider;

impl CapabilityProvider for VectorOnlyProvider {
    fn flags(&self) -> CapabilityFlags {
        CapabilityFlags {
            vector: true,
            ..CapabilityFlags::SCALAR
        }
    }

    fn name(&self) -> &'static str {
        "vector-only"
    }
}

/// No acceleration at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScalarOnlyProvider;

impl CapabilityProvider for ScalarOnlyProvider {
    fn flags(&self) -> CapabilityFlags {
        CapabilityFlags::SCALAR
    }

    fn name(&self) -> &'static str {
        "scalar-only"
    }
}

impl CapabilityProvider for CapabilityFlags {
    fn flags(&self) -> CapabilityFlags {
        *self
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

impl<P: CapabilityProvider + ?Sized> CapabilityProvider for &P {
    fn flags(&self) -> CapabilityFlags {
        (**self).flags()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_flags() -> CapabilityFlags {
        CapabilityFlags {
            streaming_matrix: true,
            vector: true,
            ..CapabilityFlags::SCALAR
        }
    }

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::StreamingMatrix > Tier::Vector);
        assert!(Tier::Vector > Tier::Scalar);
    }

    #[test]
    fn test_fast_path_never_streams() {
        assert_eq!(Tier::for_fast_path(&all_flags(), 4096), Tier::Vector);
        assert_eq!(Tier::for_fast_path(&all_flags(), 3), Tier::Scalar);
        assert_eq!(Tier::for_fast_path(&CapabilityFlags::SCALAR, 4096), Tier::Scalar);
    }

    #[test]
    fn test_blocked_streaming_threshold() {
        let flags = all_flags();
        assert_eq!(Tier::for_blocked(&flags, 64), Tier::StreamingMatrix);
        assert_eq!(Tier::for_blocked(&flags, 63), Tier::Vector);
        assert_eq!(Tier::for_blocked(&flags, 2), Tier::Scalar);
        assert_eq!(Tier::for_blocked(&VectorOnlyProvider.flags(), 128), Tier::Vector);
    }

    #[test]
    fn test_providers() {
        assert_eq!(ScalarOnlyProvider.flags(), CapabilityFlags::SCALAR);
        assert!(VectorOnlyProvider.flags().vector);
        assert!(!VectorOnlyProvider.flags().streaming_matrix);
        assert_eq!(NativeProvider::detect().flags(), caps::detect());
        assert_eq!(all_flags().flags(), all_flags());
        assert_eq!((&ScalarOnlyProvider).name(), "scalar-only");
    }
}
