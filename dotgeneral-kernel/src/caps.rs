//! Runtime SIMD capability detection.
//!
//! Detection runs at most once per process; every later call to [`detect`]
//! returns the cached [`CapabilityFlags`]. Probes that are missing or fail on
//! the running platform report the capability as absent.

use std::sync::OnceLock;

/// SIMD capabilities of the running CPU/OS combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityFlags {
    /// Streaming matrix extension (ARM SME).
    pub streaming_matrix: bool,
    /// f32 vector extension with fused multiply-add (NEON, or AVX2+FMA).
    pub vector: bool,
    /// Half-precision vector multiply-add (FEAT_FHM / FEAT_FP16).
    pub vector_fp16: bool,
    /// bfloat16 vector multiply-add. Always `false`, see [`BF16_FORCED_OFF`].
    pub vector_bf16: bool,
    /// What the platform probe reported for bfloat16, kept for diagnostics.
    /// Never consulted for kernel selection.
    pub vector_bf16_reported: bool,
}

/// BF16 vector multiply-add is reported by some OSes on hardware where the
/// instructions run but produce wrong results. Until that is understood the
/// flag stays off regardless of what the probe says.
pub const BF16_FORCED_OFF: bool = true;

static DETECTED: OnceLock<CapabilityFlags> = OnceLock::new();

/// Detect capabilities for the current process.
///
/// Thread-safe: concurrent first callers observe a single detection run.
#[inline]
pub fn detect() -> CapabilityFlags {
    *DETECTED.get_or_init(|| {
        let flags = detect_uncached();
        log::debug!(
            "SIMD capabilities: {} (vector={}, fp16={}, bf16={} [reported {}], streaming={})",
            flags.best_tier_name(),
            flags.vector,
            flags.vector_fp16,
            flags.vector_bf16,
            flags.vector_bf16_reported,
            flags.streaming_matrix,
        );
        flags
    })
}

#[cold]
fn detect_uncached() -> CapabilityFlags {
    let bf16_reported = probe_bf16();
    CapabilityFlags {
        streaming_matrix: probe_streaming_matrix(),
        vector: probe_vector(),
        vector_fp16: probe_fp16(),
        vector_bf16: bf16_reported && !BF16_FORCED_OFF,
        vector_bf16_reported: bf16_reported,
    }
}

impl CapabilityFlags {
    /// Flags with every capability absent.
    pub const SCALAR: CapabilityFlags = CapabilityFlags {
        streaming_matrix: false,
        vector: false,
        vector_fp16: false,
        vector_bf16: false,
        vector_bf16_reported: false,
    };

    /// Best available f32 tier as a human-readable string.
    pub fn best_tier_name(&self) -> &'static str {
        if self.streaming_matrix {
            "streaming-matrix"
        } else if self.vector {
            "vector"
        } else {
            "scalar"
        }
    }

    /// Whether any f32 acceleration is available.
    pub fn has_simd(&self) -> bool {
        self.vector || self.streaming_matrix
    }
}

#[cfg(target_arch = "x86_64")]
fn probe_vector() -> bool {
    is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
}

// NEON is mandatory on AArch64.
#[cfg(target_arch = "aarch64")]
fn probe_vector() -> bool {
    true
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn probe_vector() -> bool {
    false
}

#[cfg(target_arch = "aarch64")]
fn probe_fp16() -> bool {
    std::arch::is_aarch64_feature_detected!("fhm")
        || std::arch::is_aarch64_feature_detected!("fp16")
}

#[cfg(not(target_arch = "aarch64"))]
fn probe_fp16() -> bool {
    false
}

#[cfg(target_arch = "aarch64")]
fn probe_bf16() -> bool {
    std::arch::is_aarch64_feature_detected!("bf16")
}

#[cfg(not(target_arch = "aarch64"))]
fn probe_bf16() -> bool {
    false
}

#[cfg(all(target_arch = "aarch64", any(target_os = "macos", target_os = "ios")))]
fn probe_streaming_matrix() -> bool {
    sysctl_flag(c"hw.optional.arm.FEAT_SME")
}

#[cfg(all(target_arch = "aarch64", target_os = "linux"))]
fn probe_streaming_matrix() -> bool {
    // HWCAP2_SME from the kernel's uapi/asm/hwcap.h.
    const HWCAP2_SME: libc::c_ulong = 1 << 23;
    // SAFETY: getauxval has no preconditions; 0 means "not present".
    let hwcap2 = unsafe { libc::getauxval(libc::AT_HWCAP2) };
    hwcap2 & HWCAP2_SME != 0
}

#[cfg(not(all(
    target_arch = "aarch64",
    any(target_os = "macos", target_os = "ios", target_os = "linux")
)))]
fn probe_streaming_matrix() -> bool {
    false
}

/// Read an integer sysctl flag; any error reads as "absent".
#[cfg(all(target_arch = "aarch64", any(target_os = "macos", target_os = "ios")))]
fn sysctl_flag(name: &std::ffi::CStr) -> bool {
    let mut value: libc::c_int = 0;
    let mut size = std::mem::size_of::<libc::c_int>();
    // SAFETY: `value` and `size` are valid for writes and describe the buffer.
    let rc = unsafe {
        libc::sysctlbyname(
            name.as_ptr(),
            (&mut value as *mut libc::c_int).cast(),
            &mut size,
            std::ptr::null_mut(),
            0,
        )
    };
    rc == 0 && value != 0
}
