/*
Delay Coloration Algorithms
===========================

Each algorithm processes ONLY the feedback path of a delay band; the tap that
feeds the output mix is untouched. Because the colored signal re-enters the
loop every repeat, even subtle per-pass coloration compounds into character.

  Digital   y = x. The zero-coloration baseline, also used by regression
            tests as the identity reference.

  Analog    Bucket-brigade flavor: tanh soft clip into a one-pole low-pass
            at ~8 kHz.

  Tape      Simplified Jiles-Atherton magnetic hysteresis: the signal is
            treated as an applied field, the stored state as magnetization.
            Magnetization is pulled toward the anhysteretic curve (a Langevin
            function of the field) at a rate bounded by how fast the field is
            moving, which is what produces the level-dependent lag and
            compression of real tape. A ~6 kHz one-pole models head-gap loss.

  LoFi      Sample-and-hold decimation, amplitude quantization, and a small
            uniform noise floor.

Every variant stays bounded for any finite input: saturators are contractive
and the tape model clamps magnetization to its saturation value.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::f32::consts::PI;

/// Selectable delay character.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlgorithmKind {
    #[default]
    Digital,
    Analog,
    Tape,
    LoFi,
}

/// One-pole low-pass used by the analog and tape variants for HF roll-off.
#[derive(Debug, Clone, Copy, Default)]
struct OnePoleLp {
    coeff: f32,
    state: f32,
}

impl OnePoleLp {
    fn set_cutoff(&mut self, cutoff_hz: f32, sample_rate: f64) {
        let wc = 2.0 * PI * cutoff_hz / sample_rate as f32;
        self.coeff = wc / (1.0 + wc);
    }

    fn reset(&mut self) {
        self.state = 0.0;
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.state += self.coeff * (input - self.state);
        self.state
    }
}

// Jiles-Atherton tuning. Saturation magnetization bounds the state; the
// anhysteretic shape parameter sets how quickly the Langevin curve bends.
const TAPE_SATURATION: f32 = 1.2;
const TAPE_SHAPE: f32 = 0.45;
const TAPE_BASE_RATE: f32 = 0.05;
const TAPE_FIELD_COUPLING: f32 = 0.6;
const TAPE_MAX_RATE: f32 = 0.5;

#[derive(Debug, Clone, Default)]
struct TapeState {
    magnetization: f32,
    prev_field: f32,
    lpf: OnePoleLp,
}

/// Langevin function L(x) = coth(x) - 1/x, the anhysteretic magnetization
/// curve. Near zero both terms blow up individually, so a Taylor expansion
/// avoids the 0/0 singularity.
#[inline]
fn langevin(x: f32) -> f32 {
    if x.abs() < 1e-3 {
        x / 3.0 - x * x * x / 45.0
    } else {
        1.0 / x.tanh() - 1.0 / x
    }
}

#[derive(Debug, Clone, Default)]
struct LoFiState {
    hold_sample: f32,
    hold_counter: u32,
    rng: fastrand::Rng,
}

/// Closed family of feedback-path coloration algorithms.
///
/// The set is fixed and performance-critical, so this is an enum with a
/// match per sample rather than trait objects.
#[derive(Debug, Clone)]
pub enum DelayAlgorithm {
    Digital,
    Analog(OnePoleLpBox),
    Tape(Box<TapeStateBox>),
    LoFi(Box<LoFiStateBox>),
}

// Wrapper structs keep the per-variant state private while letting the enum
// variants stay cheap to construct.
#[derive(Debug, Clone, Default)]
pub struct OnePoleLpBox(OnePoleLp);

#[derive(Debug, Clone, Default)]
pub struct TapeStateBox(TapeState);

#[derive(Debug, Clone, Default)]
pub struct LoFiStateBox(LoFiState);

impl DelayAlgorithm {
    /// Factory mapping a kind to a fresh, unprepared instance.
    pub fn new(kind: AlgorithmKind) -> Self {
        match kind {
            AlgorithmKind::Digital => Self::Digital,
            AlgorithmKind::Analog => Self::Analog(OnePoleLpBox::default()),
            AlgorithmKind::Tape => Self::Tape(Box::default()),
            AlgorithmKind::LoFi => Self::LoFi(Box::default()),
        }
    }

    pub fn kind(&self) -> AlgorithmKind {
        match self {
            Self::Digital => AlgorithmKind::Digital,
            Self::Analog(_) => AlgorithmKind::Analog,
            Self::Tape(_) => AlgorithmKind::Tape,
            Self::LoFi(_) => AlgorithmKind::LoFi,
        }
    }

    /// Display name for UI surfaces.
    pub fn name(&self) -> &'static str {
        match self.kind() {
            AlgorithmKind::Digital => "Digital",
            AlgorithmKind::Analog => "Analog",
            AlgorithmKind::Tape => "Tape",
            AlgorithmKind::LoFi => "Lo-Fi",
        }
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        match self {
            Self::Analog(lp) => lp.0.set_cutoff(8_000.0, sample_rate),
            Self::Tape(tape) => tape.0.lpf.set_cutoff(6_000.0, sample_rate),
            Self::Digital | Self::LoFi(_) => {}
        }
        self.reset();
    }

    pub fn reset(&mut self) {
        match self {
            Self::Digital => {}
            Self::Analog(lp) => lp.0.reset(),
            Self::Tape(tape) => {
                tape.0.magnetization = 0.0;
                tape.0.prev_field = 0.0;
                tape.0.lpf.reset();
            }
            Self::LoFi(lofi) => {
                lofi.0.hold_sample = 0.0;
                lofi.0.hold_counter = 0;
            }
        }
    }

    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        match self {
            Self::Digital => sample,

            Self::Analog(lp) => {
                let saturated = (sample * 1.2).tanh() * 0.9;
                lp.0.process(saturated)
            }

            Self::Tape(tape) => {
                let state = &mut tape.0;
                let field = sample;

                // Anhysteretic target for the current field
                let m_an = TAPE_SATURATION * langevin(field / TAPE_SHAPE);

                // Integrate magnetization toward the target. A fast-moving
                // field drags the magnetization along more quickly; a static
                // field lets it creep, which is where the hysteresis lag
                // comes from.
                let field_rate = (field - state.prev_field).abs();
                let rate =
                    (TAPE_BASE_RATE + field_rate * TAPE_FIELD_COUPLING).min(TAPE_MAX_RATE);
                state.magnetization += (m_an - state.magnetization) * rate;
                state.magnetization =
                    state.magnetization.clamp(-TAPE_SATURATION, TAPE_SATURATION);
                state.prev_field = field;

                // Head-gap HF loss, then normalize to unit range
                state.lpf.process(state.magnetization) / TAPE_SATURATION
            }

            Self::LoFi(lofi) => {
                let state = &mut lofi.0;

                // Hold every N samples, quantizing the effective sample rate
                const DECIMATION: u32 = 4;
                state.hold_counter += 1;
                if state.hold_counter >= DECIMATION {
                    state.hold_counter = 0;

                    // 12-bit amplitude quantization
                    const LEVELS: f32 = 4_096.0;
                    state.hold_sample = (sample * LEVELS).round() / LEVELS;
                }

                let noise = (state.rng.f32() - 0.5) * 0.002;
                state.hold_sample + noise
            }
        }
    }
}

impl Default for DelayAlgorithm {
    fn default() -> Self {
        Self::Digital
    }
}
