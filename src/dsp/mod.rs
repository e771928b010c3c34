//! Low-level DSP primitives used by the delay bands and the output chain.
//!
//! These components are allocation-free and realtime-safe, making them safe to
//! embed directly inside per-band processing state. They intentionally stay
//! focused on the signal-processing math so the graph layer can handle
//! orchestration and routing.

/// Feedback-path coloration algorithms (digital, analog, tape, lo-fi).
pub mod algorithm;
/// Attack/release envelope follower for volume-swell effects.
pub mod envelope;
/// Hi-cut / lo-cut Butterworth filter pair for the feedback path.
pub mod filter;
/// Multi-stage protective output chain with a permanent-mute latch.
pub mod limiter;
/// Wet-bus summing and equal-power panning helpers.
pub mod mix;
/// Periodic and generative modulation-signal sources.
pub mod modulator;

pub use algorithm::{AlgorithmKind, DelayAlgorithm};
pub use limiter::{MuteLatch, MuteReason, SafetyLimiter};
pub use modulator::Waveform;
