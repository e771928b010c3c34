/*
Delay Band
==========

One complete delay voice. Per sample, per channel:

  1. Modulate the base delay time by the local plus master modulation value,
     scaled to milliseconds, floored at 1 ms.
  2. Read the delayed sample with 4-point cubic Hermite interpolation. Linear
     interpolation would be cheaper, but under time modulation its kinked
     first derivative is audible as zipper noise; the Hermite fit keeps the
     first derivative continuous.
  3. Scale the delayed sample by feedback gain, color it with the selected
     algorithm, then filter it (hi-cut, lo-cut). Only the re-entering energy
     is colored; the tap sent to the output mix is clean.
  4. Write input + feedback at the write position. Ping-pong mode crosses the
     feedback terms (left buffer receives right feedback and vice versa) so
     repeats bounce between channels.
  5. Shape the wet tap: level, equal-power pan, optional phase invert,
     optional attack-envelope swell keyed off the input level.
  6. Emit input + wet * wet_mix.

The circular buffers are sized for the maximum delay plus modulation
headroom and owned exclusively by the audio thread; telemetry leaves the
band only as copied scalars.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::envelope::AttackEnvelope;
use crate::dsp::filter::FilterSection;
use crate::dsp::mix::equal_power_pan;
use crate::dsp::modulator::Waveform;
use crate::dsp::{AlgorithmKind, DelayAlgorithm};
use crate::MAX_DELAY_SECONDS;

/// Modulation-to-milliseconds scale: a full-scale modulation value swings
/// the delay time by this many ms.
const MOD_DEPTH_MS: f32 = 25.0;

/// Full parameter set for one band, replaced wholesale once per block.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayBandParams {
    pub delay_time_ms: f32,
    pub feedback: f32,
    pub level: f32,
    pub pan: f32,
    pub hi_cut_hz: f32,
    pub lo_cut_hz: f32,
    pub mod_rate_hz: f32,
    pub mod_depth: f32,
    pub mod_waveform: Waveform,
    /// 0 = instant (no swell), >0 = volume-swell attack time.
    pub attack_time_ms: f32,
    pub algorithm: AlgorithmKind,
    pub phase_invert: bool,
    pub ping_pong: bool,
    pub enabled: bool,
}

impl Default for DelayBandParams {
    fn default() -> Self {
        Self {
            delay_time_ms: 250.0,
            feedback: 0.3,
            level: 1.0,
            pan: 0.0,
            hi_cut_hz: 12_000.0,
            lo_cut_hz: 80.0,
            mod_rate_hz: 1.0,
            mod_depth: 0.0,
            mod_waveform: Waveform::Sine,
            attack_time_ms: 0.0,
            algorithm: AlgorithmKind::Digital,
            phase_invert: false,
            ping_pong: false,
            enabled: true,
        }
    }
}

/// A single delay band: circular buffer, feedback coloration, output shaping.
pub struct DelayBandNode {
    params: DelayBandParams,
    algorithm: DelayAlgorithm,
    filter: FilterSection,
    attack_envelope: AttackEnvelope,

    sample_rate: f64,
    prepared: bool,

    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
}

impl DelayBandNode {
    pub fn new() -> Self {
        Self {
            params: DelayBandParams::default(),
            algorithm: DelayAlgorithm::default(),
            filter: FilterSection::new(),
            attack_envelope: AttackEnvelope::new(),
            sample_rate: 44_100.0,
            prepared: false,
            buffer_l: Vec::new(),
            buffer_r: Vec::new(),
            write_pos: 0,
        }
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;

        // Max delay plus modulation headroom
        let capacity = (MAX_DELAY_SECONDS * sample_rate) as usize + 1;
        self.buffer_l = vec![0.0; capacity];
        self.buffer_r = vec![0.0; capacity];
        self.write_pos = 0;

        self.algorithm.prepare(sample_rate);
        self.filter.prepare(sample_rate);
        self.attack_envelope.prepare(sample_rate);
        self.prepared = true;
    }

    pub fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
        self.algorithm.reset();
        self.filter.reset();
        self.attack_envelope.reset();
    }

    /// Replace the full parameter set. Called once per block, never
    /// mid-block.
    pub fn set_params(&mut self, params: DelayBandParams) {
        let mut params = params;
        params.feedback = params.feedback.clamp(0.0, 1.0);

        if params.algorithm != self.params.algorithm {
            self.algorithm = DelayAlgorithm::new(params.algorithm);
            if self.prepared {
                self.algorithm.prepare(self.sample_rate);
            }
        }

        self.filter.set_hi_cut_frequency(params.hi_cut_hz);
        self.filter.set_lo_cut_frequency(params.lo_cut_hz);
        self.attack_envelope.set_attack_time_ms(params.attack_time_ms);

        self.params = params;
    }

    pub fn params(&self) -> &DelayBandParams {
        &self.params
    }

    pub fn algorithm_kind(&self) -> AlgorithmKind {
        self.algorithm.kind()
    }

    pub fn algorithm_name(&self) -> &'static str {
        self.algorithm.name()
    }

    /// Process a stereo block in place.
    ///
    /// `mod_signal` and `master_mod` are this block's modulation buffers;
    /// their values sum into the delay-time warp. The matrix passes
    /// `wet_mix = 1.0` and does its own dry/wet blend downstream.
    pub fn process(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        wet_mix: f32,
        mod_signal: Option<&[f32]>,
        master_mod: Option<&[f32]>,
    ) {
        if !self.params.enabled || !self.prepared || self.buffer_l.is_empty() {
            return;
        }
        debug_assert_eq!(left.len(), right.len());

        let buffer_size = self.buffer_l.len();
        let (pan_l, pan_r) = equal_power_pan(self.params.pan);

        for i in 0..left.len() {
            let mut total_mod = 0.0;
            if let Some(signal) = mod_signal {
                total_mod += signal[i];
            }
            if let Some(master) = master_mod {
                total_mod += master[i];
            }

            let mut modulated_time_ms = self.params.delay_time_ms;
            if total_mod != 0.0 {
                modulated_time_ms += total_mod * MOD_DEPTH_MS;
            }
            // Floors both a full downward modulation swing and a nonpositive
            // base time
            let modulated_time_ms = modulated_time_ms.max(1.0);

            // Fractional delay in samples, capped so the 4-point read can
            // never lap the write position
            let delay_samples_f = ((modulated_time_ms / 1_000.0) * self.sample_rate as f32)
                .min((buffer_size - 4) as f32);
            let delay_samples = delay_samples_f as usize;
            let frac = delay_samples_f - delay_samples as f32;

            let (delayed_l, delayed_r) = self.read_interpolated(delay_samples, frac);

            let input_l = left[i];
            let input_r = right[i];

            // Feedback path: gain, coloration, filters
            let mut feedback_l = delayed_l * self.params.feedback;
            let mut feedback_r = delayed_r * self.params.feedback;
            feedback_l = self.algorithm.process_sample(feedback_l);
            feedback_r = self.algorithm.process_sample(feedback_r);
            self.filter.process_sample(&mut feedback_l, &mut feedback_r);

            if self.params.ping_pong {
                self.buffer_l[self.write_pos] = input_l + feedback_r;
                self.buffer_r[self.write_pos] = input_r + feedback_l;
            } else {
                self.buffer_l[self.write_pos] = input_l + feedback_l;
                self.buffer_r[self.write_pos] = input_r + feedback_r;
            }

            self.write_pos = (self.write_pos + 1) % buffer_size;

            // Output shaping on the clean tap
            let mut wet_l = delayed_l * self.params.level * pan_l;
            let mut wet_r = delayed_r * self.params.level * pan_r;

            if self.params.phase_invert {
                wet_l = -wet_l;
                wet_r = -wet_r;
            }

            if self.params.attack_time_ms > 0.0 {
                self.attack_envelope
                    .apply(input_l, input_r, &mut wet_l, &mut wet_r);
            }

            left[i] = input_l + wet_l * wet_mix;
            right[i] = input_r + wet_r * wet_mix;
        }
    }

    /// Cubic Hermite read of both channels at `delay_samples + frac` behind
    /// the write position.
    #[inline]
    fn read_interpolated(&self, delay_samples: usize, frac: f32) -> (f32, f32) {
        let buffer_size = self.buffer_l.len();
        let wrap = |pos: isize| -> usize {
            let size = buffer_size as isize;
            (((pos % size) + size) % size) as usize
        };

        let base = self.write_pos as isize - delay_samples as isize;
        let p0 = wrap(base + 1); // One sample ahead
        let p1 = wrap(base);
        let p2 = wrap(base - 1);
        let p3 = wrap(base - 2);

        let interp = |buffer: &[f32]| -> f32 {
            let y0 = buffer[p0];
            let y1 = buffer[p1];
            let y2 = buffer[p2];
            let y3 = buffer[p3];

            let c0 = y1;
            let c1 = 0.5 * (y2 - y0);
            let c2 = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
            let c3 = 0.5 * (y3 - y0) + 1.5 * (y1 - y2);

            ((c3 * frac + c2) * frac + c1) * frac + c0
        };

        (interp(&self.buffer_l), interp(&self.buffer_r))
    }
}

impl Default for DelayBandNode {
    fn default() -> Self {
        Self::new()
    }
}
