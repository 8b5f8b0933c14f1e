//! Denormal protection
//!
//! Two layers:
//! - [`AudioThreadEnvironment`] puts the audio thread's FPU into
//!   flush-to-zero / denormals-are-zero mode
//! - [`flush_denormal`] clamps recursive filter state after every update,
//!   which also covers platforms where the flags cannot be set
//!
//! # Lifecycle
//! The process-wide record is created by the first [`AudioThreadEnvironment::configure`]
//! call and never torn down. The FPU flags themselves are per thread, so every
//! thread that runs `process()` configures itself once; the engine does this
//! lazily via [`AudioThreadEnvironment::ensure_configured`].

use std::cell::Cell;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::simd::{SimdLevel, simd_level};

/// Magnitude below which recursive state is treated as zero
pub const DENORMAL_THRESHOLD: f64 = 1e-30;

/// Returns 0 if `|x| < 1e-30`, else `x`
#[inline(always)]
pub fn flush_denormal(x: f64) -> f64 {
    if x.abs() < DENORMAL_THRESHOLD { 0.0 } else { x }
}

/// True for values that would be flushed
#[inline(always)]
pub fn is_denormal(x: f64) -> bool {
    x != 0.0 && x.abs() < DENORMAL_THRESHOLD
}

// ============ Audio Thread Environment ============

static ENVIRONMENT: OnceLock<AudioThreadEnvironment> = OnceLock::new();

thread_local! {
    static THREAD_CONFIGURED: Cell<bool> = const { Cell::new(false) };
}

/// Process-wide record of the audio floating-point environment
#[derive(Debug)]
pub struct AudioThreadEnvironment {
    simd_level: SimdLevel,
    hardware_flush: bool,
    configured_threads: AtomicUsize,
}

impl AudioThreadEnvironment {
    /// Configure FTZ/DAZ on the calling thread and return the process-wide record.
    ///
    /// Call once when the audio thread starts. Repeat calls on an already
    /// configured thread are no-ops.
    pub fn configure() -> &'static Self {
        let env = ENVIRONMENT.get_or_init(|| {
            let env = Self {
                simd_level: simd_level(),
                hardware_flush: cfg!(any(target_arch = "x86_64", target_arch = "aarch64")),
                configured_threads: AtomicUsize::new(0),
            };
            log::info!(
                "Audio FP environment: simd={}, hardware flush-to-zero={}",
                env.simd_level.name(),
                env.hardware_flush
            );
            env
        });
        Self::configure_current_thread();
        env
    }

    /// Real-time safe per-thread check. Sets the flags if this thread has not
    /// been configured yet; never logs or allocates.
    #[inline]
    pub fn ensure_configured() {
        let configured = THREAD_CONFIGURED.try_with(Cell::get).unwrap_or(true);
        if !configured {
            Self::configure_current_thread();
        }
    }

    /// The record, if any thread has called [`configure`](Self::configure)
    pub fn get() -> Option<&'static Self> {
        ENVIRONMENT.get()
    }

    fn configure_current_thread() {
        let first_time = THREAD_CONFIGURED
            .try_with(|flag| !flag.replace(true))
            .unwrap_or(false);
        if first_time {
            set_flush_to_zero();
            if let Some(env) = ENVIRONMENT.get() {
                env.configured_threads.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn simd_level(&self) -> SimdLevel {
        self.simd_level
    }

    /// Whether this platform honours the FTZ/DAZ flags
    pub fn hardware_flush(&self) -> bool {
        self.hardware_flush
    }

    /// Threads configured after the record was created
    pub fn configured_threads(&self) -> usize {
        self.configured_threads.load(Ordering::Relaxed)
    }
}

/// Set CPU flags to flush denormals to zero on the current thread
#[inline]
#[allow(deprecated)]
fn set_flush_to_zero() {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: MXCSR only changes floating-point rounding/flush behaviour
        // of the current thread.
        unsafe {
            use std::arch::x86_64::{_mm_getcsr, _mm_setcsr};
            // DAZ (Denormals Are Zero) = bit 6 (0x0040)
            // FTZ (Flush To Zero) = bit 15 (0x8000)
            let mxcsr = _mm_getcsr();
            _mm_setcsr(mxcsr | 0x8040);
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        // SAFETY: FPCR.FZ (bit 24) only affects denormal handling of the
        // current thread.
        unsafe {
            let fpcr: u64;
            std::arch::asm!("mrs {}, fpcr", out(reg) fpcr);
            std::arch::asm!("msr fpcr, {}", in(reg) fpcr | (1 << 24));
        }
    }
}

/// Check if denormals are being flushed to zero on the current thread
#[inline]
#[allow(deprecated)]
pub fn flush_to_zero_active() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: reading MXCSR has no side effects
        unsafe {
            use std::arch::x86_64::_mm_getcsr;
            (_mm_getcsr() & 0x8040) == 0x8040
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        let fpcr: u64;
        // SAFETY: reading FPCR has no side effects
        unsafe {
            std::arch::asm!("mrs {}, fpcr", out(reg) fpcr);
        }
        fpcr & (1 << 24) != 0
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        false
    }
}
