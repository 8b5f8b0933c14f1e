//! hx-dsp: Multiband harmonic exciter
//!
//! Real-time, allocation-free three-band nonlinear processor.
//!
//! ## Modules
//! - `smoothing` - One-pole parameter smoothing with atomic targets, block ramps
//! - `denormal` - Audio-thread FP environment (FTZ/DAZ) and per-sample flushing
//! - `dc_blocker` - One-pole DC blocking high-pass
//! - `biquad` - TDF-II biquad sections
//! - `crossover` - Linkwitz-Riley three-band split with exact reconstruction
//! - `harmonic` - Tube/transistor/tape/diode/fold waveshapers
//! - `oversampling` - Polyphase 2x/4x FIR oversampler
//! - `band` - Per-band gated oversampling with crossfaded path switching
//! - `thermal` - Seeded thermal drift model
//! - `channel` - Per-channel pipeline state
//! - `engine` - The `HarmonicExciter` engine and its control handle
//! - `config` - Serializable engine configuration
//! - `simd` - Runtime SIMD dispatch
//! - `analysis` - Spectrum/THD measurement (never used on the audio path)

pub mod analysis;
pub mod band;
pub mod biquad;
pub mod channel;
pub mod config;
pub mod crossover;
pub mod dc_blocker;
pub mod delay;
pub mod denormal;
pub mod engine;
pub mod harmonic;
pub mod oversampling;
pub mod safety;
pub mod simd;
pub mod smoothing;
pub mod thermal;

pub use config::{Character, EngineConfig, ThermalConfig};
pub use engine::{
    EngineDiagnostics, EngineHandle, EngineParam, EngineState, HarmonicExciter, PARAMETERS,
};

use hx_core::Sample;

/// Trait for all DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;
}
