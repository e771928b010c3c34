/*
Generative Modulator
====================

A single-channel modulation source used to warp delay time. Four standard
phase-accumulator waveforms plus two generative families:

  Brownian    A phase-timed random walk. Every time the phase wraps, a new
              bounded step is added to a drifting target; the target decays
              toward center (so the walk cannot wander off) and the audible
              value slews toward it so there are never discontinuities.

  Lorenz      The classic three-variable chaotic attractor, integrated with
              fixed-step Euler for stability. The rate parameter scales the
              iteration count rather than dt. One state variable is mapped
              and clamped to [-1, 1], then slewed.

`tick()` always returns raw * depth, so for any depth in [0, 1] the output
magnitude never exceeds depth (the chaotic families get a brief settling
transient before the clamp fully applies to their smoothed output).
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::f32::consts::TAU;

/// Modulation waveform family.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Saw,
    Square,
    Brownian,
    Lorenz,
}

/// Per-band (or master) modulation source.
pub struct GenerativeModulator {
    sample_rate: f64,
    waveform: Waveform,
    rate_hz: f32,
    depth: f32,
    phase: f32,

    rng: fastrand::Rng,
    brownian_value: f32,
    brownian_target: f32,

    lorenz_x: f32,
    lorenz_y: f32,
    lorenz_z: f32,
    lorenz_smoothed: f32,
}

impl GenerativeModulator {
    pub fn new() -> Self {
        Self {
            sample_rate: 44_100.0,
            waveform: Waveform::Sine,
            rate_hz: 1.0,
            depth: 0.0,
            phase: 0.0,
            rng: fastrand::Rng::new(),
            brownian_value: 0.0,
            brownian_target: 0.0,
            lorenz_x: 0.1,
            lorenz_y: 0.0,
            lorenz_z: 0.0,
            lorenz_smoothed: 0.0,
        }
    }

    /// Deterministic construction for tests and reproducible renders.
    pub fn with_seed(seed: u64) -> Self {
        let mut modulator = Self::new();
        modulator.rng = fastrand::Rng::with_seed(seed);
        modulator
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.brownian_value = 0.0;
        self.brownian_target = 0.0;
        // Lorenz must not start at the (0,0,0) fixed point
        self.lorenz_x = 0.1;
        self.lorenz_y = 0.0;
        self.lorenz_z = 0.0;
        self.lorenz_smoothed = 0.0;
    }

    pub fn set_params(&mut self, waveform: Waveform, rate_hz: f32, depth: f32) {
        self.waveform = waveform;
        self.rate_hz = rate_hz.clamp(0.01, 20.0);
        self.depth = depth.clamp(0.0, 1.0);
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Advance one sample and return the current value in [-depth, depth].
    pub fn tick(&mut self) -> f32 {
        let phase_inc = self.rate_hz / self.sample_rate as f32;

        let raw = match self.waveform {
            Waveform::Sine => {
                let value = (self.phase * TAU).sin();
                self.advance_phase(phase_inc);
                value
            }

            Waveform::Triangle => {
                let value = if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                };
                self.advance_phase(phase_inc);
                value
            }

            Waveform::Saw => {
                let value = 2.0 * self.phase - 1.0;
                self.advance_phase(phase_inc);
                value
            }

            Waveform::Square => {
                let value = if self.phase < 0.5 { 1.0 } else { -1.0 };
                self.advance_phase(phase_inc);
                value
            }

            Waveform::Brownian => {
                let prev_phase = self.phase;
                self.advance_phase(phase_inc);

                // Each phase wrap draws a new bounded step
                if self.phase < prev_phase {
                    let step = (self.rng.f32() - 0.5) * 0.4; // +/-0.2
                    self.brownian_target += step;

                    // Decay toward center so the walk stays tethered
                    self.brownian_target *= 0.92;
                    self.brownian_target = self.brownian_target.clamp(-1.0, 1.0);
                }

                // Slew the audible value toward the target
                let slew = 0.001;
                self.brownian_value += (self.brownian_target - self.brownian_value) * slew;
                self.brownian_value
            }

            Waveform::Lorenz => {
                const SIGMA: f32 = 10.0;
                const RHO: f32 = 28.0;
                const BETA: f32 = 8.0 / 3.0;
                const DT: f32 = 0.01; // Fixed step for stability

                // Rate scales the iteration count, not dt
                let iterations = ((self.rate_hz * 0.5) as usize).max(1);
                for _ in 0..iterations {
                    let dx = SIGMA * (self.lorenz_y - self.lorenz_x);
                    let dy = self.lorenz_x * (RHO - self.lorenz_z) - self.lorenz_y;
                    let dz = self.lorenz_x * self.lorenz_y - BETA * self.lorenz_z;

                    self.lorenz_x += dx * DT;
                    self.lorenz_y += dy * DT;
                    self.lorenz_z += dz * DT;
                }

                let raw = (self.lorenz_x / 20.0).clamp(-1.0, 1.0);
                let slew = 0.0005 + self.rate_hz * 0.000_1;
                self.lorenz_smoothed += (raw - self.lorenz_smoothed) * slew;
                self.lorenz_smoothed
            }
        };

        raw * self.depth
    }

    fn advance_phase(&mut self, inc: f32) {
        self.phase += inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
    }
}

impl Default for GenerativeModulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f64 = 44_100.0;

    fn run(waveform: Waveform, rate: f32, depth: f32, samples: usize) -> Vec<f32> {
        let mut modulator = GenerativeModulator::with_seed(0xec_40);
        modulator.prepare(SAMPLE_RATE);
        modulator.set_params(waveform, rate, depth);
        (0..samples).map(|_| modulator.tick()).collect()
    }

    #[test]
    fn all_waveforms_respect_depth_bound() {
        for waveform in [
            Waveform::Sine,
            Waveform::Triangle,
            Waveform::Saw,
            Waveform::Square,
            Waveform::Brownian,
            Waveform::Lorenz,
        ] {
            for &depth in &[0.0, 0.25, 1.0] {
                let out = run(waveform, 2.0, depth, 44_100);
                for (i, &v) in out.iter().enumerate() {
                    assert!(
                        v.abs() <= depth + 1e-6,
                        "{:?} depth {} exceeded at sample {}: {}",
                        waveform,
                        depth,
                        i,
                        v
                    );
                }
            }
        }
    }

    #[test]
    fn zero_depth_is_exactly_silent() {
        for waveform in [Waveform::Sine, Waveform::Brownian, Waveform::Lorenz] {
            let out = run(waveform, 5.0, 0.0, 1_024);
            assert!(out.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn sine_completes_one_cycle_per_period() {
        // 1 Hz at 44.1 kHz over 1.5 s: exactly one positive-going zero
        // crossing, at the phase wrap near sample 44,100
        let out = run(Waveform::Sine, 1.0, 1.0, 66_150);
        let crossings = out
            .windows(2)
            .filter(|pair| pair[0] < 0.0 && pair[1] >= 0.0)
            .count();
        assert_eq!(crossings, 1);
    }

    #[test]
    fn triangle_reaches_both_peaks() {
        let out = run(Waveform::Triangle, 2.0, 1.0, 44_100);
        let max = out.iter().cloned().fold(f32::MIN, f32::max);
        let min = out.iter().cloned().fold(f32::MAX, f32::min);
        assert!(max > 0.99, "triangle should reach +1, got {}", max);
        assert!(min < -0.99, "triangle should reach -1, got {}", min);
    }

    #[test]
    fn square_is_plus_minus_depth() {
        let out = run(Waveform::Square, 4.0, 0.5, 22_050);
        assert!(out.iter().all(|&v| v == 0.5 || v == -0.5));
    }

    #[test]
    fn rate_is_clamped() {
        let mut modulator = GenerativeModulator::new();
        modulator.prepare(SAMPLE_RATE);
        modulator.set_params(Waveform::Sine, 1_000.0, 2.0);

        // Rate clamps to 20 Hz, depth to 1.0: a 20 Hz sine has ~40 positive
        // crossings over two seconds (allow one for phase accumulation drift)
        let out: Vec<f32> = (0..88_200).map(|_| modulator.tick()).collect();
        let crossings = out
            .windows(2)
            .filter(|pair| pair[0] < 0.0 && pair[1] >= 0.0)
            .count() as i64;
        assert!((crossings - 40).abs() <= 1, "got {} crossings", crossings);
    }

    #[test]
    fn brownian_walks_but_stays_tethered() {
        let out = run(Waveform::Brownian, 10.0, 1.0, 441_000);

        // It should actually move...
        let max = out.iter().cloned().fold(f32::MIN, f32::max);
        let min = out.iter().cloned().fold(f32::MAX, f32::min);
        assert!(max - min > 0.01, "walk should move, range {}", max - min);

        // ...without jumps between adjacent samples (slew limiting)
        for pair in out.windows(2) {
            assert!((pair[0] - pair[1]).abs() < 0.01);
        }
    }

    #[test]
    fn lorenz_is_bounded_and_nonperiodic() {
        let out = run(Waveform::Lorenz, 20.0, 1.0, 441_000);
        assert!(out.iter().all(|v| v.is_finite() && v.abs() <= 1.0));

        // Crude non-periodicity check: the second half should not replay the
        // first half
        let half = out.len() / 2;
        let diff: f32 = out[..half]
            .iter()
            .zip(&out[half..])
            .map(|(a, b)| (a - b).abs())
            .sum();
        assert!(diff > 1.0, "attractor should not repeat, diff {}", diff);
    }
}
