//! Block-rate rendering of modulation signals.
//!
//! One [`GenerativeModulator`] per band plus one master modulator. Rendering
//! happens once per block into preallocated buffers so the per-sample band
//! loop only ever reads plain slices.

use crate::dsp::modulator::{GenerativeModulator, Waveform};
use crate::{MAX_BLOCK_SIZE, NUM_BANDS};

/// Owns all modulation sources and their per-block output buffers.
pub struct ModulationEngine {
    band_modulators: Vec<GenerativeModulator>,
    master_modulator: GenerativeModulator,

    band_buffers: Vec<Vec<f32>>,
    master_buffer: Vec<f32>,
}

impl ModulationEngine {
    pub fn new() -> Self {
        Self {
            band_modulators: (0..NUM_BANDS).map(|_| GenerativeModulator::new()).collect(),
            master_modulator: GenerativeModulator::new(),
            band_buffers: vec![Vec::new(); NUM_BANDS],
            master_buffer: Vec::new(),
        }
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        for modulator in &mut self.band_modulators {
            modulator.prepare(sample_rate);
        }
        self.master_modulator.prepare(sample_rate);

        for buffer in &mut self.band_buffers {
            buffer.clear();
            buffer.resize(MAX_BLOCK_SIZE, 0.0);
        }
        self.master_buffer.clear();
        self.master_buffer.resize(MAX_BLOCK_SIZE, 0.0);
    }

    pub fn reset(&mut self) {
        for modulator in &mut self.band_modulators {
            modulator.reset();
        }
        self.master_modulator.reset();

        for buffer in &mut self.band_buffers {
            buffer.fill(0.0);
        }
        self.master_buffer.fill(0.0);
    }

    /// Update one band's modulation source. `band_index` is zero-based.
    pub fn set_band_params(&mut self, band_index: usize, waveform: Waveform, rate: f32, depth: f32) {
        if let Some(modulator) = self.band_modulators.get_mut(band_index) {
            modulator.set_params(waveform, rate, depth);
        }
    }

    pub fn set_master_params(&mut self, waveform: Waveform, rate: f32, depth: f32) {
        self.master_modulator.set_params(waveform, rate, depth);
    }

    /// Render all sources for the current block.
    pub fn process(&mut self, num_samples: usize) {
        let num_samples = num_samples.min(MAX_BLOCK_SIZE);
        if num_samples == 0 {
            return;
        }

        for sample in self.master_buffer[..num_samples].iter_mut() {
            *sample = self.master_modulator.tick();
        }

        for (modulator, buffer) in self.band_modulators.iter_mut().zip(&mut self.band_buffers) {
            for sample in buffer[..num_samples].iter_mut() {
                *sample = modulator.tick();
            }
        }
    }

    /// This block's modulation values for one band (zero-based index).
    pub fn band_buffer(&self, band_index: usize, num_samples: usize) -> Option<&[f32]> {
        self.band_buffers
            .get(band_index)
            .map(|buffer| &buffer[..num_samples.min(buffer.len())])
    }

    pub fn master_buffer(&self, num_samples: usize) -> &[f32] {
        &self.master_buffer[..num_samples.min(self.master_buffer.len())]
    }
}

impl Default for ModulationEngine {
    fn default() -> Self {
        Self::new()
    }
}
