//! Streaming-mode bracketing for the streaming-matrix tier.
//!
//! Streaming kernels must enter the elevated-throughput mode explicitly and
//! leave it on every exit path, otherwise unrelated code on the same hardware
//! thread would run in the wrong mode. [`StreamingSession`] is an RAII guard:
//! the mode is entered in [`StreamingSession::enter`] and left in `Drop`, which
//! also runs on early returns and during unwinding.
//!
//! Sessions nest; only the outermost guard toggles the mode.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Guard holding the current thread in streaming mode.
///
/// Not `Send`: the mode belongs to the hardware thread that entered it.
#[must_use = "streaming mode is left as soon as the session is dropped"]
pub struct StreamingSession {
    _not_send: PhantomData<*const ()>,
}

impl StreamingSession {
    pub fn enter() -> Self {
        DEPTH.with(|depth| {
            let d = depth.get();
            if d == 0 {
                mode_start();
            }
            depth.set(d + 1);
        });
        StreamingSession {
            _not_send: PhantomData,
        }
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        DEPTH.with(|depth| {
            let d = depth.get();
            debug_assert!(d > 0, "unbalanced streaming session");
            let d = d.saturating_sub(1);
            depth.set(d);
            if d == 0 {
                mode_stop();
            }
        });
    }
}

/// Whether the current thread is inside a streaming session.
pub fn is_active() -> bool {
    DEPTH.with(|depth| depth.get() > 0)
}

// The streaming kernels in this crate are expressed with portable SIMD, which
// the compiler may lower to instructions that are illegal inside hardware
// streaming mode. Entry and exit are therefore bookkeeping only; these two
// hooks are the single place a hardware `smstart sm` / `smstop sm` pair goes.
#[inline(always)]
fn mode_start() {}

#[inline(always)]
fn mode_stop() {}
