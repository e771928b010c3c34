pub mod dsp;
pub mod engine; // Block orchestrator and cross-thread control surface
pub mod graph; // Routing graph, delay bands, modulation

pub use dsp::Waveform;
pub use engine::DelayMatrix;
pub use graph::routing::RoutingGraph;

pub const MAX_BLOCK_SIZE: usize = 2048;

/// Maximum number of delay bands the matrix can host.
pub const NUM_BANDS: usize = 12;

/// Delay line capacity in seconds: 700 ms usable range plus modulation headroom.
pub const MAX_DELAY_SECONDS: f64 = 0.75;
