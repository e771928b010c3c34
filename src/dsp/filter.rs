/*
| filter | response  | passes       | removes      |
| ------ | --------- | ------------ | ------------ |
| hi-cut | low-pass  | below cutoff | highs        |
| lo-cut | high-pass | above cutoff | lows, rumble |

Both are 2nd-order Butterworth biquads (Q = 1/sqrt(2)) applied in series to
the feedback path of a delay band: hi-cut first, then lo-cut. Coefficients
are only recomputed when the target frequency actually changes, so calling
the setters every block with an unchanged value is free.
*/

use std::f32::consts::PI;

const MIN_CUTOFF_HZ: f32 = 20.0;
const BUTTERWORTH_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Biquad filter coefficients (transposed direct form II).
#[derive(Debug, Clone, Copy)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Identity filter
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

/// Two-tap biquad state for one channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    z1: f32,
    z2: f32,
}

impl BiquadState {
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    #[inline]
    pub fn process(&mut self, input: f32, c: &BiquadCoeffs) -> f32 {
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }
}

/// Hi-cut and lo-cut filter section for a delay band's feedback path.
pub struct FilterSection {
    sample_rate: f64,
    hi_cut_hz: f32,
    lo_cut_hz: f32,

    hi_cut_coeffs: BiquadCoeffs,
    lo_cut_coeffs: BiquadCoeffs,

    hi_cut_state_l: BiquadState,
    hi_cut_state_r: BiquadState,
    lo_cut_state_l: BiquadState,
    lo_cut_state_r: BiquadState,
}

impl FilterSection {
    pub fn new() -> Self {
        Self {
            sample_rate: 44_100.0,
            hi_cut_hz: 12_000.0,
            lo_cut_hz: 80.0,
            hi_cut_coeffs: BiquadCoeffs::default(),
            lo_cut_coeffs: BiquadCoeffs::default(),
            hi_cut_state_l: BiquadState::default(),
            hi_cut_state_r: BiquadState::default(),
            lo_cut_state_l: BiquadState::default(),
            lo_cut_state_r: BiquadState::default(),
        }
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.update_hi_cut();
        self.update_lo_cut();
    }

    pub fn reset(&mut self) {
        self.hi_cut_state_l.reset();
        self.hi_cut_state_r.reset();
        self.lo_cut_state_l.reset();
        self.lo_cut_state_r.reset();
    }

    pub fn set_hi_cut_frequency(&mut self, freq_hz: f32) {
        if self.hi_cut_hz != freq_hz {
            self.hi_cut_hz = freq_hz;
            self.update_hi_cut();
        }
    }

    pub fn set_lo_cut_frequency(&mut self, freq_hz: f32) {
        if self.lo_cut_hz != freq_hz {
            self.lo_cut_hz = freq_hz;
            self.update_lo_cut();
        }
    }

    pub fn hi_cut_hz(&self) -> f32 {
        self.hi_cut_hz
    }

    pub fn lo_cut_hz(&self) -> f32 {
        self.lo_cut_hz
    }

    /// Filter a stereo pair in place: hi-cut first, then lo-cut.
    #[inline]
    pub fn process_sample(&mut self, left: &mut f32, right: &mut f32) {
        *left = self.hi_cut_state_l.process(*left, &self.hi_cut_coeffs);
        *right = self.hi_cut_state_r.process(*right, &self.hi_cut_coeffs);

        *left = self.lo_cut_state_l.process(*left, &self.lo_cut_coeffs);
        *right = self.lo_cut_state_r.process(*right, &self.lo_cut_coeffs);
    }

    fn clamp_cutoff(&self, freq_hz: f32) -> f32 {
        freq_hz.clamp(MIN_CUTOFF_HZ, (self.sample_rate * 0.49) as f32)
    }

    fn update_hi_cut(&mut self) {
        if self.sample_rate <= 0.0 {
            return;
        }

        let freq = self.clamp_cutoff(self.hi_cut_hz);
        let omega = 2.0 * PI * freq / self.sample_rate as f32;
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * BUTTERWORTH_Q);

        let a0 = 1.0 + alpha;
        self.hi_cut_coeffs = BiquadCoeffs {
            b0: ((1.0 - cos_omega) / 2.0) / a0,
            b1: (1.0 - cos_omega) / a0,
            b2: ((1.0 - cos_omega) / 2.0) / a0,
            a1: (-2.0 * cos_omega) / a0,
            a2: (1.0 - alpha) / a0,
        };
    }

    fn update_lo_cut(&mut self) {
        if self.sample_rate <= 0.0 {
            return;
        }

        let freq = self.clamp_cutoff(self.lo_cut_hz);
        let omega = 2.0 * PI * freq / self.sample_rate as f32;
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * BUTTERWORTH_Q);

        let a0 = 1.0 + alpha;
        self.lo_cut_coeffs = BiquadCoeffs {
            b0: ((1.0 + cos_omega) / 2.0) / a0,
            b1: (-(1.0 + cos_omega)) / a0,
            b2: ((1.0 + cos_omega) / 2.0) / a0,
            a1: (-2.0 * cos_omega) / a0,
            a2: (1.0 - alpha) / a0,
        };
    }
}

impl Default for FilterSection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f64 = 44_100.0;

    fn rms(buffer: &[f32]) -> f32 {
        (buffer.iter().map(|s| s * s).sum::<f32>() / buffer.len() as f32).sqrt()
    }

    fn run_tone(section: &mut FilterSection, freq: f32, samples: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(samples);
        for i in 0..samples {
            let phase = 2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32;
            let mut l = phase.sin();
            let mut r = l;
            section.process_sample(&mut l, &mut r);
            out.push(l);
        }
        out
    }

    #[test]
    fn test_passthrough_at_extreme_cutoffs() {
        let mut section = FilterSection::new();
        section.prepare(SAMPLE_RATE);
        section.set_hi_cut_frequency(SAMPLE_RATE as f32 * 0.49);
        section.set_lo_cut_frequency(20.0);

        let out = run_tone(&mut section, 1_000.0, 8_192);

        // Skip the settling transient, then the mid-band tone should survive
        let settled = &out[2_048..];
        let energy = rms(settled);
        assert!(
            energy > 0.707 * 0.7,
            "mid-band tone should pass nearly unattenuated, rms={}",
            energy
        );
    }

    #[test]
    fn test_hi_cut_attenuates_high_frequencies() {
        let mut section = FilterSection::new();
        section.prepare(SAMPLE_RATE);
        section.set_hi_cut_frequency(500.0);
        section.set_lo_cut_frequency(20.0);

        let out = run_tone(&mut section, 5_000.0, 8_192);
        let settled = &out[2_048..];
        assert!(
            rms(settled) < 0.707 * 0.3,
            "tone well above hi-cut should be attenuated, rms={}",
            rms(settled)
        );
    }

    #[test]
    fn test_lo_cut_removes_dc() {
        let mut section = FilterSection::new();
        section.prepare(SAMPLE_RATE);
        section.set_lo_cut_frequency(80.0);

        let mut last = 1.0f32;
        for _ in 0..44_100 {
            let mut l = 1.0;
            let mut r = 1.0;
            section.process_sample(&mut l, &mut r);
            last = l;
        }
        assert!(last.abs() < 0.01, "DC should decay to zero, got {}", last);
    }

    #[test]
    fn test_extreme_cutoff_is_clamped() {
        let mut section = FilterSection::new();
        section.prepare(SAMPLE_RATE);

        // Way above Nyquist and below zero: must not produce NaN output
        section.set_hi_cut_frequency(1_000_000.0);
        section.set_lo_cut_frequency(-50.0);

        let out = run_tone(&mut section, 1_000.0, 1_024);
        assert!(out.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_getters_return_set_values() {
        let mut section = FilterSection::new();
        section.prepare(SAMPLE_RATE);

        section.set_hi_cut_frequency(8_000.0);
        section.set_lo_cut_frequency(120.0);

        assert_eq!(section.hi_cut_hz(), 8_000.0);
        assert_eq!(section.lo_cut_hz(), 120.0);
    }

    #[test]
    fn test_rapid_coefficient_changes_stay_stable() {
        let mut section = FilterSection::new();
        section.prepare(SAMPLE_RATE);

        for i in 0..4_096 {
            section.set_hi_cut_frequency(500.0 + (i % 100) as f32 * 100.0);
            let mut l = ((i as f32) * 0.1).sin();
            let mut r = l;
            section.process_sample(&mut l, &mut r);
            assert!(l.is_finite() && r.is_finite());
            assert!(l.abs() < 10.0, "filter must not explode, got {}", l);
        }
    }
}
