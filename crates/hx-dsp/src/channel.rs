//! Per-channel processing chain
//!
//! DC block -> three-band split -> gated shaping per band -> band gains ->
//! sum -> DC block -> soft limit -> dry/wet mix -> finiteness net.

use hx_core::Sample;

use crate::band::BandProcessor;
use crate::config::EngineConfig;
use crate::crossover::{NUM_BANDS, ThreeBandCrossover};
use crate::dc_blocker::DcBlocker;
use crate::delay::LatencyDelay;
use crate::safety::{sanitize, soft_limit};
use crate::smoothing::BlockRamp;
use crate::thermal::ThermalModel;
use crate::{MonoProcessor, Processor};

/// Values derived once per block, ramped per sample
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockParams {
    pub band_drive: [BlockRamp; NUM_BANDS],
    pub band_gain: [BlockRamp; NUM_BANDS],
    pub color: BlockRamp,
    pub mix: BlockRamp,
}

/// State for one audio channel
#[derive(Debug, Clone)]
pub struct ChannelState {
    dc_in: DcBlocker,
    dc_out: DcBlocker,
    crossover: ThreeBandCrossover,
    bands: [BandProcessor; NUM_BANDS],
    dry_delay: LatencyDelay,
    thermal: ThermalModel,
}

impl ChannelState {
    /// Allocates; call at prepare time
    pub fn new(config: &EngineConfig, channel: usize, sample_rate: f64) -> Self {
        let bands: [BandProcessor; NUM_BANDS] =
            std::array::from_fn(|_| BandProcessor::new(config, sample_rate));
        let latency = bands[0].latency();

        Self {
            dc_in: DcBlocker::new(config.dc_cutoff_hz, sample_rate),
            dc_out: DcBlocker::new(config.dc_cutoff_hz, sample_rate),
            crossover: ThreeBandCrossover::new(
                config.low_crossover_hz,
                config.high_crossover_hz,
                sample_rate,
            ),
            bands,
            dry_delay: LatencyDelay::new(latency),
            thermal: ThermalModel::new(&config.thermal, channel, sample_rate),
        }
    }

    /// Process one block in place. Non-finite samples are zeroed and
    /// counted in `replaced`.
    pub fn process_block(&mut self, buffer: &mut [Sample], params: &BlockParams, replaced: &mut u64) {
        let mut p = *params;

        let offset = self.thermal.advance(buffer.len());
        for (band, drive) in self.bands.iter_mut().zip(&p.band_drive) {
            band.set_bias_offset(offset);
            band.update_gate(drive.end());
        }

        for sample in buffer.iter_mut() {
            let input = sanitize(*sample, replaced);
            let dry = self.dry_delay.process_sample(input);

            let color = p.color.next_value();
            let split = self.crossover.split(self.dc_in.process_sample(input));

            let mut sum = 0.0;
            for (i, band) in self.bands.iter_mut().enumerate() {
                let drive = p.band_drive[i].next_value();
                let gain = p.band_gain[i].next_value();
                sum += band.process_sample(split[i], drive, color) * gain;
            }

            let wet = soft_limit(self.dc_out.process_sample(sum));
            let mix = p.mix.next_value();
            *sample = sanitize(dry + (wet - dry) * mix, replaced);
        }
    }

    /// Processing latency in samples
    pub fn latency(&self) -> usize {
        self.dry_delay.delay()
    }

    pub fn band(&self, index: usize) -> Option<&BandProcessor> {
        self.bands.get(index)
    }

    pub fn thermal_offset(&self) -> f64 {
        self.thermal.offset()
    }

    pub fn split_points(&self) -> (f64, f64) {
        self.crossover.split_points()
    }
}

impl Processor for ChannelState {
    fn reset(&mut self) {
        self.dc_in.reset();
        self.dc_out.reset();
        self.crossover.reset();
        for band in &mut self.bands {
            band.reset();
        }
        self.dry_delay.reset();
        self.thermal.reset();
    }

    fn latency(&self) -> usize {
        self.dry_delay.delay()
    }
}
