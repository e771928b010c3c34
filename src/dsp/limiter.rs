/*
Safety Limiter
==============

Protective output chain applied to the summed wet signal before the dry mix.
Eight stages, in order:

  0. Sustained-peak detector  smoothed peak vs +6 dBFS (2.0 linear); 100 ms
                              sustained excess latches permanent mute
  1. NaN/Inf guard            non-finite samples are zeroed and latch mute
  2. DC-offset detector       smoothed mono DC vs 0.5; 500 ms sustained
                              excess latches permanent mute
  3. DC blocker               10 Hz one-pole high-pass per channel
  4. Soft-knee limiter        fast-attack (0.1 ms) / slow-release (50 ms)
                              envelope; gain = threshold / envelope above
                              threshold
  5. Sustained-loudness guard 500 ms loudness estimate; corrective gain
                              proportional to overshoot, catching slow
                              feedback build-up the fast limiter misses
  6. Slew-rate limiter        clamps sample-to-sample delta to 0.5
  7. Hard clip                [-1, 1], unconditional

The permanent-mute latch lives in a shared `MuteLatch` so a UI or control
thread can observe and acknowledge it without touching audio-thread state.
The latch survives `reset()` and is cleared only by `unlock_permanent_mute`.
The danger-event diagnostic count is cleared separately.
*/

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::Arc;

/// Why the output was latched silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MuteReason {
    #[default]
    None,
    /// Peak held above +6 dBFS for 100 ms.
    SustainedPeak,
    /// Mono DC estimate held above 0.5 for 500 ms.
    DcOffset,
    /// A non-finite sample reached the output chain.
    NanInf,
}

impl MuteReason {
    fn to_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::SustainedPeak => 1,
            Self::DcOffset => 2,
            Self::NanInf => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::SustainedPeak,
            2 => Self::DcOffset,
            3 => Self::NanInf,
            _ => Self::None,
        }
    }
}

/// Shared latch observable from outside the audio thread.
///
/// Plain atomic loads and stores with relaxed ordering; the flag and reason
/// are independent telemetry values, not a synchronization protocol.
#[derive(Debug, Default)]
pub struct MuteLatch {
    muted: AtomicBool,
    reason: AtomicU8,
    danger_events: AtomicU32,
}

impl MuteLatch {
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn reason(&self) -> MuteReason {
        MuteReason::from_u8(self.reason.load(Ordering::Relaxed))
    }

    /// Diagnostic count of latch trips since the last explicit clear.
    pub fn danger_event_count(&self) -> u32 {
        self.danger_events.load(Ordering::Relaxed)
    }

    pub fn reset_danger_event_count(&self) {
        self.danger_events.store(0, Ordering::Relaxed);
    }

    fn trip(&self, reason: MuteReason) {
        if !self.muted.swap(true, Ordering::Relaxed) {
            self.reason.store(reason.to_u8(), Ordering::Relaxed);
        }
        self.danger_events.fetch_add(1, Ordering::Relaxed);
    }

    fn clear(&self) {
        self.muted.store(false, Ordering::Relaxed);
        self.reason.store(MuteReason::None.to_u8(), Ordering::Relaxed);
    }
}

/// Multi-stage protective output limiter with a permanent-mute latch.
pub struct SafetyLimiter {
    sample_rate: f64,
    latch: Arc<MuteLatch>,

    // Soft-knee limiter
    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
    threshold: f32,

    // DC blocker (10 Hz HPF)
    dc_block_coeff: f32,
    dc_block_state_l: f32,
    dc_block_state_r: f32,
    dc_block_prev_l: f32,
    dc_block_prev_r: f32,

    // Sustained loudness
    sustained_coeff: f32,
    sustained_level: f32,
    sustained_threshold: f32,

    // Sustained peak
    sustained_peak_coeff: f32,
    sustained_peak_level: f32,
    sustained_peak_counter: u32,
    sustained_peak_threshold_samples: u32,

    // DC offset detector
    dc_detect_coeff: f32,
    dc_offset_level: f32,
    dc_offset_counter: u32,
    dc_offset_threshold_samples: u32,

    // Slew limiting
    prev_output_l: f32,
    prev_output_r: f32,
}

const DANGER_PEAK_THRESHOLD: f32 = 2.0; // +6 dBFS
const DC_OFFSET_THRESHOLD: f32 = 0.5;
const MAX_SLEW_RATE: f32 = 0.5;

impl SafetyLimiter {
    pub fn new() -> Self {
        Self {
            sample_rate: 44_100.0,
            latch: Arc::new(MuteLatch::default()),
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
            threshold: 0.9, // ~-1 dB
            dc_block_coeff: 0.999,
            dc_block_state_l: 0.0,
            dc_block_state_r: 0.0,
            dc_block_prev_l: 0.0,
            dc_block_prev_r: 0.0,
            sustained_coeff: 0.0,
            sustained_level: 0.0,
            sustained_threshold: 0.7, // ~-3 dB
            sustained_peak_coeff: 0.0,
            sustained_peak_level: 0.0,
            sustained_peak_counter: 0,
            sustained_peak_threshold_samples: 4_410,
            dc_detect_coeff: 0.0,
            dc_offset_level: 0.0,
            dc_offset_counter: 0,
            dc_offset_threshold_samples: 22_050,
            prev_output_l: 0.0,
            prev_output_r: 0.0,
        }
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;

        // Fast attack (0.1 ms), slow release (50 ms)
        self.attack_coeff = (-1.0 / (0.000_1 * sample_rate)).exp() as f32;
        self.release_coeff = (-1.0 / (0.050 * sample_rate)).exp() as f32;

        self.dc_block_coeff = (1.0 - 2.0 * std::f64::consts::PI * 10.0 / sample_rate) as f32;

        self.sustained_peak_coeff = (-1.0 / (0.1 * sample_rate)).exp() as f32;
        self.dc_detect_coeff = (-1.0 / (0.5 * sample_rate)).exp() as f32;
        self.sustained_coeff = (-1.0 / (0.5 * sample_rate)).exp() as f32;

        self.sustained_peak_threshold_samples = (0.1 * sample_rate) as u32;
        self.dc_offset_threshold_samples = (0.5 * sample_rate) as u32;

        self.reset();
    }

    /// Clear detector and filter state. The permanent-mute latch is NOT
    /// cleared here; use `unlock_permanent_mute`.
    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.dc_block_state_l = 0.0;
        self.dc_block_state_r = 0.0;
        self.dc_block_prev_l = 0.0;
        self.dc_block_prev_r = 0.0;
        self.sustained_level = 0.0;
        self.sustained_peak_level = 0.0;
        self.dc_offset_level = 0.0;
        self.sustained_peak_counter = 0;
        self.dc_offset_counter = 0;
        self.prev_output_l = 0.0;
        self.prev_output_r = 0.0;
    }

    /// Run the full chain over a stereo block in place.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len());

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            if self.latch.is_muted() {
                *l = 0.0;
                *r = 0.0;
                continue;
            }

            // Stage 0: sustained peak
            let instant_peak = l.abs().max(r.abs());
            self.sustained_peak_level = self.sustained_peak_coeff * self.sustained_peak_level
                + (1.0 - self.sustained_peak_coeff) * instant_peak;

            if self.sustained_peak_level > DANGER_PEAK_THRESHOLD {
                self.sustained_peak_counter += 1;
                if self.sustained_peak_counter >= self.sustained_peak_threshold_samples {
                    self.latch.trip(MuteReason::SustainedPeak);
                }
            } else {
                self.sustained_peak_counter = 0;
            }

            // Stage 1: NaN/Inf guard
            if !l.is_finite() {
                *l = 0.0;
                self.latch.trip(MuteReason::NanInf);
            }
            if !r.is_finite() {
                *r = 0.0;
                self.latch.trip(MuteReason::NanInf);
            }

            // Stage 2: DC offset detector, on the raw input before blocking
            let dc_level = (0.5 * (*l + *r)).abs();
            self.dc_offset_level = self.dc_detect_coeff * self.dc_offset_level
                + (1.0 - self.dc_detect_coeff) * dc_level;

            if self.dc_offset_level > DC_OFFSET_THRESHOLD {
                self.dc_offset_counter += 1;
                if self.dc_offset_counter >= self.dc_offset_threshold_samples {
                    self.latch.trip(MuteReason::DcOffset);
                }
            } else {
                self.dc_offset_counter = 0;
            }

            // Stage 3: DC blocker (10 Hz HPF)
            let dc_free_l = *l - self.dc_block_prev_l + self.dc_block_coeff * self.dc_block_state_l;
            let dc_free_r = *r - self.dc_block_prev_r + self.dc_block_coeff * self.dc_block_state_r;
            self.dc_block_prev_l = *l;
            self.dc_block_prev_r = *r;
            self.dc_block_state_l = dc_free_l;
            self.dc_block_state_r = dc_free_r;
            *l = dc_free_l;
            *r = dc_free_r;

            // Stage 4: soft-knee limiter
            let peak = l.abs().max(r.abs());
            if peak > self.envelope {
                self.envelope =
                    self.attack_coeff * self.envelope + (1.0 - self.attack_coeff) * peak;
            } else {
                self.envelope =
                    self.release_coeff * self.envelope + (1.0 - self.release_coeff) * peak;
            }

            if self.envelope > self.threshold {
                let gain = self.threshold / self.envelope;
                *l *= gain;
                *r *= gain;
            }

            // Stage 5: sustained loudness (feedback runaway)
            let post_peak = l.abs().max(r.abs());
            self.sustained_level = self.sustained_coeff * self.sustained_level
                + (1.0 - self.sustained_coeff) * post_peak;

            if self.sustained_level > self.sustained_threshold {
                let sustain_gain = self.sustained_threshold / self.sustained_level;
                *l *= sustain_gain;
                *r *= sustain_gain;
            }

            // Stage 6: slew limiting
            let slew_l = *l - self.prev_output_l;
            let slew_r = *r - self.prev_output_r;
            if slew_l.abs() > MAX_SLEW_RATE {
                *l = self.prev_output_l + MAX_SLEW_RATE.copysign(slew_l);
            }
            if slew_r.abs() > MAX_SLEW_RATE {
                *r = self.prev_output_r + MAX_SLEW_RATE.copysign(slew_r);
            }
            self.prev_output_l = *l;
            self.prev_output_r = *r;

            // Stage 7: hard clip
            *l = l.clamp(-1.0, 1.0);
            *r = r.clamp(-1.0, 1.0);
        }
    }

    /// Set the soft-knee limiter threshold in dB.
    pub fn set_threshold(&mut self, threshold_db: f32) {
        self.threshold = 10.0f32.powf(threshold_db / 20.0);
    }

    /// Set the sustained-loudness threshold as a linear level.
    pub fn set_sustained_threshold(&mut self, level: f32) {
        self.sustained_threshold = level.clamp(0.1, 0.95);
    }

    pub fn is_permanently_muted(&self) -> bool {
        self.latch.is_muted()
    }

    pub fn mute_reason(&self) -> MuteReason {
        self.latch.reason()
    }

    /// Shared handle for control/UI threads to observe the latch.
    pub fn latch(&self) -> Arc<MuteLatch> {
        Arc::clone(&self.latch)
    }

    /// Acknowledge a safety event and resume output. Detector state is
    /// cleared, the danger-event count is not.
    pub fn unlock_permanent_mute(&mut self) {
        self.latch.clear();
        self.sustained_peak_counter = 0;
        self.dc_offset_counter = 0;
        self.sustained_peak_level = 0.0;
        self.dc_offset_level = 0.0;
    }

    /// Current limiter envelope, for metering.
    pub fn envelope_level(&self) -> f32 {
        self.envelope
    }

    pub fn danger_event_count(&self) -> u32 {
        self.latch.danger_event_count()
    }

    pub fn reset_danger_event_count(&self) {
        self.latch.reset_danger_event_count();
    }
}

impl Default for SafetyLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f64 = 44_100.0;

    fn prepared() -> SafetyLimiter {
        let mut limiter = SafetyLimiter::new();
        limiter.prepare(SAMPLE_RATE);
        limiter
    }

    fn process_constant(limiter: &mut SafetyLimiter, value: f32, samples: usize) -> Vec<f32> {
        let mut left = vec![value; samples];
        let mut right = vec![value; samples];
        limiter.process(&mut left, &mut right);
        left
    }

    #[test]
    fn quiet_signal_passes_mostly_untouched() {
        let mut limiter = prepared();

        let samples = 4_096;
        let mut left: Vec<f32> = (0..samples)
            .map(|i| 0.3 * (i as f32 * 0.05).sin())
            .collect();
        let mut right = left.clone();
        let reference = left.clone();
        limiter.process(&mut left, &mut right);

        // The DC blocker barely touches a mid-frequency tone
        for (out, input) in left.iter().zip(&reference).skip(1_024) {
            assert!((out - input).abs() < 0.05);
        }
        assert!(!limiter.is_permanently_muted());
    }

    #[test]
    fn output_is_always_in_range_and_finite() {
        let mut limiter = prepared();
        let mut rng = fastrand::Rng::with_seed(7);

        for block in 0..64 {
            let mut left: Vec<f32> = (0..512)
                .map(|i| match (block + i) % 7 {
                    0 => f32::NAN,
                    1 => f32::INFINITY,
                    2 => f32::NEG_INFINITY,
                    3 => (rng.f32() - 0.5) * 1_000.0,
                    _ => rng.f32() - 0.5,
                })
                .collect();
            let mut right = left.clone();
            limiter.process(&mut left, &mut right);

            for &s in left.iter().chain(right.iter()) {
                assert!(s.is_finite());
                assert!((-1.0..=1.0).contains(&s));
            }
        }
    }

    #[test]
    fn nan_latches_permanent_mute() {
        let mut limiter = prepared();

        let mut left = [0.1, f32::NAN, 0.1, 0.1];
        let mut right = [0.1; 4];
        limiter.process(&mut left, &mut right);

        assert!(limiter.is_permanently_muted());
        assert_eq!(limiter.mute_reason(), MuteReason::NanInf);

        // Every sample after the trip is forced silent
        assert_eq!(left[2], 0.0);
        assert_eq!(left[3], 0.0);
        assert_eq!(right[2], 0.0);
    }

    #[test]
    fn sustained_peak_latches_after_100ms() {
        let mut limiter = prepared();

        // 3.0 linear is above the +6 dBFS danger threshold. The smoothed peak
        // crosses 2.0 at ~110 ms (100 ms time constant, ln 3) and the counter
        // needs 100 ms more, so the latch lands at ~210 ms
        process_constant(&mut limiter, 3.0, (SAMPLE_RATE * 0.35) as usize);

        assert!(limiter.is_permanently_muted());
        assert_eq!(limiter.mute_reason(), MuteReason::SustainedPeak);
        assert!(limiter.danger_event_count() >= 1);
    }

    #[test]
    fn brief_peak_does_not_latch() {
        let mut limiter = prepared();

        // 10 ms of hot signal is well under the 100 ms window
        process_constant(&mut limiter, 3.0, (SAMPLE_RATE * 0.01) as usize);
        assert!(!limiter.is_permanently_muted());
    }

    #[test]
    fn dc_offset_latches_after_500ms() {
        let mut limiter = prepared();

        process_constant(&mut limiter, 0.8, (SAMPLE_RATE * 1.5) as usize);

        assert!(limiter.is_permanently_muted());
        assert_eq!(limiter.mute_reason(), MuteReason::DcOffset);
    }

    #[test]
    fn latch_survives_reset_until_unlock() {
        let mut limiter = prepared();

        let mut left = [f32::INFINITY];
        let mut right = [0.0];
        limiter.process(&mut left, &mut right);
        assert!(limiter.is_permanently_muted());

        limiter.reset();
        assert!(limiter.is_permanently_muted(), "reset must not clear latch");

        let out = process_constant(&mut limiter, 0.5, 256);
        assert!(out.iter().all(|&s| s == 0.0));

        limiter.unlock_permanent_mute();
        assert!(!limiter.is_permanently_muted());
        assert_eq!(limiter.mute_reason(), MuteReason::None);

        // Danger count survives the unlock, clears separately
        assert!(limiter.danger_event_count() >= 1);
        limiter.reset_danger_event_count();
        assert_eq!(limiter.danger_event_count(), 0);

        let out = process_constant(&mut limiter, 0.2, 256);
        assert!(out.iter().any(|&s| s != 0.0), "audio should resume");
    }

    #[test]
    fn limiter_reduces_hot_but_legal_signal() {
        let mut limiter = prepared();
        limiter.set_threshold(-6.0); // ~0.5 linear

        // A 0.9 tone stays below the danger detectors but above the limiter
        // threshold
        let samples = 8_192;
        let mut left: Vec<f32> = (0..samples)
            .map(|i| 0.9 * (i as f32 * 0.3).sin())
            .collect();
        let mut right = left.clone();
        limiter.process(&mut left, &mut right);

        let peak = left[4_096..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak < 0.7, "limited peak should near threshold, got {}", peak);
        assert!(!limiter.is_permanently_muted());
        assert!(limiter.envelope_level() > 0.0);
    }

    #[test]
    fn shared_latch_observes_trip() {
        let mut limiter = prepared();
        let latch = limiter.latch();
        assert!(!latch.is_muted());

        let mut left = [f32::NAN];
        let mut right = [0.0];
        limiter.process(&mut left, &mut right);

        assert!(latch.is_muted());
        assert_eq!(latch.reason(), MuteReason::NanInf);
    }
}
