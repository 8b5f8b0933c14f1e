//! Harmonic Exciter Engine
//!
//! Stereo, three-band exciter built from the components in this crate:
//! - Six normalized parameters with atomic targets and one-pole smoothing
//! - Parameters advanced once per block, derived values ramped per sample
//! - Planar or interleaved, `f32` or `f64` host buffers, processed in place
//! - No allocation, locks or logging inside `process`
//!
//! # Lifecycle
//! `Unprepared -> Prepared -> Processing`. `prepare_to_play` may be called
//! again at any time (it reallocates); `reset` clears signal state only.

use std::sync::Arc;

use hx_core::{
    Decibels, HxResult, IoSample, MAX_CHANNELS, NormalizedValue, ParamId, ParamInfo, ParamRange,
    ParamTarget, Sample, clamp_block_size, clamp_sample_rate,
};

use crate::Processor;
use crate::channel::{BlockParams, ChannelState};
use crate::config::EngineConfig;
use crate::crossover::{Band, NUM_BANDS};
use crate::denormal::AudioThreadEnvironment;
use crate::simd::DspDispatch;
use crate::smoothing::ParameterSmoother;

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Number of engine parameters
pub const NUM_PARAMS: usize = 6;

/// Band gain range of Warmth/Presence, ± dB
pub const BAND_GAIN_RANGE_DB: f64 = 6.0;

/// Engine parameter ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EngineParam {
    Drive = 0,
    Frequency = 1,
    Color = 2,
    Warmth = 3,
    Presence = 4,
    Mix = 5,
}

impl EngineParam {
    pub const ALL: [EngineParam; NUM_PARAMS] = [
        EngineParam::Drive,
        EngineParam::Frequency,
        EngineParam::Color,
        EngineParam::Warmth,
        EngineParam::Presence,
        EngineParam::Mix,
    ];

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn info(self) -> &'static ParamInfo {
        &PARAMETERS[self.index()]
    }
}

/// Parameter table, indexed by id
pub static PARAMETERS: [ParamInfo; NUM_PARAMS] = [
    ParamInfo { id: ParamId(0), name: "Drive", range: ParamRange::unit(0.3) },
    ParamInfo { id: ParamId(1), name: "Frequency", range: ParamRange::unit(0.5) },
    ParamInfo { id: ParamId(2), name: "Color", range: ParamRange::unit(0.0) },
    ParamInfo { id: ParamId(3), name: "Warmth", range: ParamRange::unit(0.5) },
    ParamInfo { id: ParamId(4), name: "Presence", range: ParamRange::unit(0.5) },
    ParamInfo { id: ParamId(5), name: "Mix", range: ParamRange::unit(1.0) },
];

/// Per-band drive from the Drive and Frequency parameters
#[inline]
pub fn band_drives(drive: f64, frequency: f64) -> [f64; NUM_BANDS] {
    [
        drive * (1.0 - frequency) * 0.5,
        drive,
        drive * (0.5 + 0.5 * frequency),
    ]
}

/// Warmth/Presence to linear gain: 0.5 is unity, 0 and 1 are ∓6 dB
#[inline]
pub fn band_gain(value: f64) -> f64 {
    Decibels(NormalizedValue::new(value).map(-BAND_GAIN_RANGE_DB, BAND_GAIN_RANGE_DB)).to_gain()
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROL HANDLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Thread-safe parameter writer, cheap to clone
#[derive(Debug, Clone)]
pub struct EngineHandle {
    targets: [Arc<ParamTarget>; NUM_PARAMS],
}

impl EngineHandle {
    /// Set by id. Out-of-range values are clamped; unknown ids and NaN are ignored.
    pub fn set_parameter(&self, id: u32, value: f64) {
        if let Some(target) = self.targets.get(id as usize) {
            target.set(value);
        }
    }

    pub fn set(&self, param: EngineParam, value: f64) {
        self.targets[param.index()].set(value);
    }

    pub fn get_parameter(&self, id: u32) -> Option<f64> {
        self.targets.get(id as usize).map(|t| t.get())
    }

    pub fn update_parameters(&self, updates: impl IntoIterator<Item = (u32, f64)>) {
        for (id, value) in updates {
            self.set_parameter(id, value);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unprepared,
    Prepared,
    Processing,
}

/// Counters readable off the audio thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct EngineDiagnostics {
    pub blocks_processed: u64,
    pub non_finite_replaced: u64,
}

/// Multiband harmonic exciter
pub struct HarmonicExciter {
    config: EngineConfig,
    handle: EngineHandle,
    smoothers: [ParameterSmoother; NUM_PARAMS],
    channels: Vec<ChannelState>,
    /// f64 working buffers, one per processed channel, `max_block` long
    scratch: [Vec<Sample>; MAX_CHANNELS],
    state: EngineState,
    sample_rate: f64,
    max_block: usize,
    diagnostics: EngineDiagnostics,
}

impl HarmonicExciter {
    /// Build from a config, clamping anything out of range
    pub fn new(config: EngineConfig) -> Self {
        if let Err(e) = config.validate() {
            log::warn!("{e}; sanitizing engine config");
        }
        Self::build(config.sanitized())
    }

    /// Build from a config, rejecting anything out of range
    pub fn try_new(config: EngineConfig) -> HxResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        let targets: [Arc<ParamTarget>; NUM_PARAMS] =
            std::array::from_fn(|i| Arc::new(ParamTarget::new(PARAMETERS[i].range)));
        let smoothers = std::array::from_fn(|i| {
            ParameterSmoother::new(Arc::clone(&targets[i]), config.smoothing_ms, 48_000.0)
        });

        Self {
            config,
            handle: EngineHandle { targets },
            smoothers,
            channels: Vec::new(),
            scratch: std::array::from_fn(|_| Vec::new()),
            state: EngineState::Unprepared,
            sample_rate: 48_000.0,
            max_block: 0,
            diagnostics: EngineDiagnostics::default(),
        }
    }

    /// Derive coefficients, allocate buffers and reset all state.
    ///
    /// Not real-time safe.
    pub fn prepare_to_play(&mut self, sample_rate: f64, max_block_size: usize) {
        let sr = clamp_sample_rate(sample_rate);
        if sr != sample_rate {
            log::warn!("Sample rate {sample_rate} clamped to {sr}");
        }
        let block = clamp_block_size(max_block_size);
        if block != max_block_size {
            log::warn!("Block size {max_block_size} clamped to {block}");
        }

        if self.config.configure_fp_env {
            AudioThreadEnvironment::configure();
        }
        let dispatch = DspDispatch::get();

        self.sample_rate = sr;
        self.max_block = block;
        self.channels = (0..MAX_CHANNELS)
            .map(|ch| ChannelState::new(&self.config, ch, sr))
            .collect();
        for buffer in &mut self.scratch {
            *buffer = vec![0.0; block];
        }
        for smoother in &mut self.smoothers {
            smoother.set_smoothing_time(self.config.smoothing_ms, sr);
            smoother.snap();
        }
        self.state = EngineState::Prepared;

        let (low, high) = self.channels[0].split_points();
        log::info!(
            "Exciter prepared: {sr} Hz, block {block}, {}x {:?} oversampling, splits {low:.0}/{high:.0} Hz, latency {} samples, simd {}",
            self.config.oversample_factor.factor(),
            self.config.oversample_quality,
            self.latency(),
            dispatch.level.name()
        );
    }

    /// Process planar channel buffers in place.
    ///
    /// Only the first two channels are processed; buffers longer than the
    /// prepared block size are processed in chunks.
    pub fn process<S: IoSample>(&mut self, buffers: &mut [&mut [S]]) {
        if self.state == EngineState::Unprepared || buffers.is_empty() {
            return;
        }
        if self.config.configure_fp_env {
            AudioThreadEnvironment::ensure_configured();
        }

        let num_channels = buffers.len().min(MAX_CHANNELS);
        let len = buffers[..num_channels]
            .iter()
            .map(|b| b.len())
            .min()
            .unwrap_or(0);

        let mut offset = 0;
        while offset < len {
            let n = (len - offset).min(self.max_block);
            for (scratch, buffer) in self.scratch.iter_mut().zip(buffers.iter()) {
                for (dst, src) in scratch[..n].iter_mut().zip(&buffer[offset..offset + n]) {
                    *dst = src.to_sample();
                }
            }

            self.process_chunk(n, num_channels);

            for (scratch, buffer) in self.scratch.iter().zip(buffers.iter_mut()) {
                for (dst, src) in buffer[offset..offset + n].iter_mut().zip(&scratch[..n]) {
                    *dst = S::from_sample(*src);
                }
            }
            offset += n;
        }
    }

    /// Process an interleaved buffer in place
    pub fn process_interleaved<S: IoSample>(&mut self, buffer: &mut [S], num_channels: usize) {
        if self.state == EngineState::Unprepared || num_channels == 0 {
            return;
        }
        if self.config.configure_fp_env {
            AudioThreadEnvironment::ensure_configured();
        }

        let processed = num_channels.min(MAX_CHANNELS);
        let frames = buffer.len() / num_channels;

        let mut offset = 0;
        while offset < frames {
            let n = (frames - offset).min(self.max_block);
            let region = &mut buffer[offset * num_channels..(offset + n) * num_channels];

            for (ch, scratch) in self.scratch.iter_mut().enumerate().take(processed) {
                for (dst, frame) in scratch[..n].iter_mut().zip(region.chunks_exact(num_channels)) {
                    *dst = frame[ch].to_sample();
                }
            }

            self.process_chunk(n, processed);

            for (ch, scratch) in self.scratch.iter().enumerate().take(processed) {
                for (src, frame) in scratch[..n].iter().zip(region.chunks_exact_mut(num_channels)) {
                    frame[ch] = S::from_sample(*src);
                }
            }
            offset += n;
        }
    }

    fn process_chunk(&mut self, n: usize, num_channels: usize) {
        let params = self.advance_parameters(n);
        for (channel, scratch) in self
            .channels
            .iter_mut()
            .zip(self.scratch.iter_mut())
            .take(num_channels)
        {
            channel.process_block(
                &mut scratch[..n],
                &params,
                &mut self.diagnostics.non_finite_replaced,
            );
        }
        self.diagnostics.blocks_processed += 1;
        self.state = EngineState::Processing;
    }

    /// Advance all smoothers by `n` and ramp the derived values across the block
    fn advance_parameters(&mut self, n: usize) -> BlockParams {
        let start: [f64; NUM_PARAMS] = std::array::from_fn(|i| self.smoothers[i].current());
        let end: [f64; NUM_PARAMS] = std::array::from_fn(|i| self.smoothers[i].update_block(n));

        let drive = EngineParam::Drive.index();
        let freq = EngineParam::Frequency.index();
        let drive_start = band_drives(start[drive], start[freq]);
        let drive_end = band_drives(end[drive], end[freq]);

        let gain_index = [
            Some(EngineParam::Warmth.index()),
            None,
            Some(EngineParam::Presence.index()),
        ];

        let mut params = BlockParams::default();
        for band in Band::ALL {
            let b = band.index();
            params.band_drive[b].begin(drive_start[b], drive_end[b], n);
            match gain_index[b] {
                Some(p) => params.band_gain[b].begin(band_gain(start[p]), band_gain(end[p]), n),
                None => params.band_gain[b].set(1.0),
            }
        }
        let color = EngineParam::Color.index();
        let mix = EngineParam::Mix.index();
        params.color.begin(start[color], end[color], n);
        params.mix.begin(start[mix], end[mix], n);
        params
    }

    /// Clear all signal state. Parameter targets are kept.
    pub fn reset(&mut self) {
        if self.state == EngineState::Unprepared {
            return;
        }
        for channel in &mut self.channels {
            channel.reset();
        }
        for smoother in &mut self.smoothers {
            smoother.snap();
        }
        self.state = EngineState::Prepared;
        log::debug!("Exciter reset");
    }

    // ─── Parameters ────────────────────────────────────────────────────────────

    /// Set targets by id. Out-of-range values are clamped; unknown ids are ignored.
    pub fn update_parameters(&self, updates: impl IntoIterator<Item = (u32, f64)>) {
        self.handle.update_parameters(updates);
    }

    pub fn set_parameter(&self, id: u32, value: f64) {
        self.handle.set_parameter(id, value);
    }

    /// Current target for `id`
    pub fn get_parameter(&self, id: u32) -> Option<f64> {
        self.handle.get_parameter(id)
    }

    pub fn get_num_parameters(&self) -> usize {
        NUM_PARAMS
    }

    pub fn get_parameter_name(&self, index: usize) -> Option<&'static str> {
        PARAMETERS.get(index).map(|info| info.name)
    }

    /// Handle for control threads
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    // ─── Introspection ─────────────────────────────────────────────────────────

    /// Processing latency in samples, identical for every setting
    pub fn latency(&self) -> usize {
        self.config.oversample_quality.taps_per_phase() - 1
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Whether `band` of `channel` is currently running its oversampler
    pub fn is_oversampling(&self, channel: usize, band: Band) -> bool {
        self.channels
            .get(channel)
            .and_then(|ch| ch.band(band.index()))
            .is_some_and(|b| b.is_oversampling())
    }

    pub fn diagnostics(&self) -> EngineDiagnostics {
        self.diagnostics
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block
    }

    /// Thermal bias offset currently applied to `channel`
    pub fn thermal_offset(&self, channel: usize) -> Option<f64> {
        self.channels.get(channel).map(|ch| ch.thermal_offset())
    }
}

impl Default for HarmonicExciter {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Processor for HarmonicExciter {
    fn reset(&mut self) {
        HarmonicExciter::reset(self);
    }

    fn latency(&self) -> usize {
        HarmonicExciter::latency(self)
    }
}
