/*
Attack Envelope (volume swell)
==============================

A trigger/release envelope follower used to fade the wet signal in over a
configurable attack time, producing pad-like "volume swell" delays.

  trigger     Input level crossing the threshold (default -60 dB) starts the
              attack ramp and latches the triggered flag.

  attack      Exponential ramp 0 -> 1. The coefficient is derived so the
              envelope reaches ~99% of target within the configured attack
              time (5 time constants).

  release     Once triggered, if the input falls back below the threshold the
              envelope decays toward 0 over the release time, then clears the
              triggered flag.

An attack time of 0 means "instant": the coefficient snaps to 1 and callers
typically skip applying the envelope at all.
*/

/// Attack/release envelope for volume-swell effects.
pub struct AttackEnvelope {
    sample_rate: f64,
    attack_time_ms: f32,
    release_time_ms: f32,
    threshold: f32,

    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
    triggered: bool,
}

impl AttackEnvelope {
    pub fn new() -> Self {
        Self {
            sample_rate: 44_100.0,
            attack_time_ms: 0.0,
            release_time_ms: 100.0,
            threshold: 0.001, // -60 dB
            attack_coeff: 1.0,
            release_coeff: 0.01,
            envelope: 0.0,
            triggered: false,
        }
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.triggered = false;
    }

    pub fn set_attack_time_ms(&mut self, attack_ms: f32) {
        let attack_ms = attack_ms.clamp(0.0, 5_000.0);
        if self.attack_time_ms != attack_ms {
            self.attack_time_ms = attack_ms;
            self.update_coefficients();
        }
    }

    pub fn set_release_time_ms(&mut self, release_ms: f32) {
        let release_ms = release_ms.clamp(1.0, 5_000.0);
        if self.release_time_ms != release_ms {
            self.release_time_ms = release_ms;
            self.update_coefficients();
        }
    }

    /// Set the trigger threshold in dB (converted to linear amplitude).
    pub fn set_threshold_db(&mut self, threshold_db: f32) {
        self.threshold = 10.0f32.powf(threshold_db / 20.0);
    }

    /// Advance one sample from an input level and return the envelope value.
    pub fn process(&mut self, input_level: f32) -> f32 {
        let input_active = input_level > self.threshold;

        if input_active {
            self.triggered = true;
            self.envelope += self.attack_coeff * (1.0 - self.envelope);
        } else if self.triggered {
            self.envelope -= self.release_coeff * self.envelope;
            if self.envelope < 0.001 {
                self.envelope = 0.0;
                self.triggered = false;
            }
        }

        self.envelope
    }

    /// Apply the envelope to a wet stereo pair, triggered by the input pair's
    /// peak level.
    #[inline]
    pub fn apply(&mut self, input_l: f32, input_r: f32, wet_l: &mut f32, wet_r: &mut f32) {
        let input_level = input_l.abs().max(input_r.abs());
        let env = self.process(input_level);
        *wet_l *= env;
        *wet_r *= env;
    }

    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    pub fn attack_time_ms(&self) -> f32 {
        self.attack_time_ms
    }

    pub fn is_active(&self) -> bool {
        self.envelope > 0.001
    }

    fn update_coefficients(&mut self) {
        if self.sample_rate <= 0.0 {
            return;
        }

        // coefficient = 1 - exp(-5 / time_in_samples) reaches ~99% of the
        // target within the configured time (5 time constants)
        if self.attack_time_ms > 0.0 {
            let attack_samples = (self.attack_time_ms / 1_000.0) * self.sample_rate as f32;
            self.attack_coeff = 1.0 - (-5.0 / attack_samples).exp();
        } else {
            self.attack_coeff = 1.0; // Instant attack
        }

        let release_samples = (self.release_time_ms / 1_000.0) * self.sample_rate as f32;
        self.release_coeff = 1.0 - (-5.0 / release_samples).exp();
    }
}

impl Default for AttackEnvelope {
    fn default() -> Self {
        Self::new()
    }
}
