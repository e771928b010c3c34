//! Cross-thread control of an audio-resident [`DelayMatrix`].
//!
//! Control threads never touch the matrix directly. They push whole-value
//! commands into a wait-free SPSC queue; the audio thread drains the queue
//! at the start of each block via [`DelayMatrix::apply_commands`], so no
//! partial update is ever visible mid-block. Routing replacements travel as
//! a complete [`RoutingState`] snapshot, never as incremental edits.
//!
//! [`DelayMatrix`]: crate::engine::DelayMatrix
//! [`DelayMatrix::apply_commands`]: crate::engine::DelayMatrix::apply_commands

#[cfg(feature = "rtrb")]
use rtrb::{Consumer, Producer, RingBuffer};

use crate::dsp::modulator::Waveform;
use crate::graph::band::DelayBandParams;
use crate::graph::routing::RoutingState;

/// A whole-value state change for the matrix.
#[derive(Debug, Clone)]
pub enum MatrixCommand {
    /// Replace one band's full parameter set (zero-based index).
    SetBandParams {
        band_index: usize,
        params: DelayBandParams,
    },
    SetMasterModulator {
        waveform: Waveform,
        rate: f32,
        depth: f32,
    },
    SetMix(f32),
    SetDryLevel(f32),
    SetDryPan(f32),
    /// Wholesale routing replacement, applied at the next block boundary.
    ReplaceRouting(RoutingState),
    Reset,
    UnlockSafetyMute,
}

/// Source of pending commands, drained by the audio thread.
pub trait CommandReceiver {
    fn pop(&mut self) -> Option<MatrixCommand>;
}

#[cfg(feature = "rtrb")]
impl CommandReceiver for Consumer<MatrixCommand> {
    fn pop(&mut self) -> Option<MatrixCommand> {
        Consumer::pop(self).ok()
    }
}

/// Control-thread half of the command queue.
#[cfg(feature = "rtrb")]
pub struct MatrixController {
    tx: Producer<MatrixCommand>,
}

#[cfg(feature = "rtrb")]
impl MatrixController {
    /// Send a command. Returns false when the queue is full, in which case
    /// the caller retries next tick.
    pub fn send(&mut self, command: MatrixCommand) -> bool {
        self.tx.push(command).is_ok()
    }
}

/// Build a command queue: the controller stays on the control thread, the
/// consumer moves to the audio thread.
#[cfg(feature = "rtrb")]
pub fn command_queue(capacity: usize) -> (MatrixController, Consumer<MatrixCommand>) {
    let (tx, rx) = RingBuffer::new(capacity);
    (MatrixController { tx }, rx)
}

#[cfg(all(test, feature = "rtrb"))]
mod tests {
    use super::*;
    use crate::engine::DelayMatrix;

    #[test]
    fn commands_cross_the_queue_in_order() {
        let (mut controller, mut rx) = command_queue(16);

        assert!(controller.send(MatrixCommand::SetMix(0.8)));
        assert!(controller.send(MatrixCommand::SetDryPan(-0.5)));

        let mut matrix = DelayMatrix::new();
        matrix.prepare(44_100.0);
        matrix.apply_commands(&mut rx);

        assert!(
            CommandReceiver::pop(&mut rx).is_none(),
            "queue fully drained"
        );
    }

    #[test]
    fn full_queue_reports_backpressure() {
        let (mut controller, _rx) = command_queue(2);

        assert!(controller.send(MatrixCommand::Reset));
        assert!(controller.send(MatrixCommand::Reset));
        assert!(!controller.send(MatrixCommand::Reset), "queue is full");
    }

    #[test]
    fn band_params_survive_the_crossing() {
        let (mut controller, mut rx) = command_queue(4);
        let params = DelayBandParams {
            delay_time_ms: 333.0,
            feedback: 0.42,
            ..Default::default()
        };
        controller.send(MatrixCommand::SetBandParams {
            band_index: 2,
            params,
        });

        let mut matrix = DelayMatrix::new();
        matrix.prepare(44_100.0);
        matrix.apply_commands(&mut rx);

        let applied = matrix.band_params(2).unwrap();
        assert_eq!(applied.delay_time_ms, 333.0);
        assert_eq!(applied.feedback, 0.42);
    }
}
