//! Routing topology and the per-band processing nodes that live inside it.
//!
//! The graph layer sits between the raw DSP primitives and the block
//! orchestrator: [`routing`] decides the order nodes run in, [`band`] is one
//! complete delay voice, and [`modulation`] renders the per-block modulation
//! buffers the bands consume.

/// One complete delay voice: buffer, feedback coloration, output shaping.
pub mod band;
/// Per-block modulation buffer rendering for all bands plus a master source.
pub mod modulation;
/// Connection topology, topological scheduling, and cycle detection.
pub mod routing;

pub use band::{DelayBandNode, DelayBandParams};
pub use modulation::ModulationEngine;
pub use routing::{Connection, RoutingGraph, RoutingState, INPUT_NODE, OUTPUT_NODE};
