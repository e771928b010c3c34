/*
Delay Matrix
============

Top-level block orchestrator. Owns the twelve band nodes, the routing graph,
the modulation engine, and the safety limiter, and executes one processing
block at a time on the audio thread:

  1. Snapshot the dry signal.
  2. Copy the input block into the input node's buffer.
  3. Render this block's modulation buffers.
  4. Walk the routing graph's topological order. Band nodes sum their
     declared inputs into a scratch buffer, process it, and publish the
     result to their own node buffer (recording a peak level for telemetry).
     The output node just sums its inputs. A node with no inputs contributes
     silence.
  5. Run the safety limiter over the output node's buffer.
  6. Mix: out = dry * dry_level * dry_pan_gain + wet * wet_mix, equal-power
     panned.

Oversized caller blocks are split into MAX_BLOCK_SIZE chunks. All audio
buffers are preallocated in prepare(); routing edits and parameter changes
arrive as whole-value commands at block boundaries (see [`control`]).
*/

/// Cross-thread command surface for the audio-resident matrix.
pub mod control;

use crate::dsp::mix::{equal_power_pan, sum_in_place};
use crate::dsp::modulator::Waveform;
use crate::dsp::{MuteLatch, MuteReason, SafetyLimiter};
use crate::graph::band::{DelayBandNode, DelayBandParams};
use crate::graph::modulation::ModulationEngine;
use crate::graph::routing::{RoutingGraph, RoutingState, INPUT_NODE, OUTPUT_NODE};
use crate::{MAX_BLOCK_SIZE, NUM_BANDS};

use std::sync::Arc;

use control::{CommandReceiver, MatrixCommand};

struct StereoBuffer {
    l: Vec<f32>,
    r: Vec<f32>,
}

impl StereoBuffer {
    fn new() -> Self {
        Self {
            l: Vec::new(),
            r: Vec::new(),
        }
    }

    fn allocate(&mut self, capacity: usize) {
        self.l.clear();
        self.l.resize(capacity, 0.0);
        self.r.clear();
        self.r.resize(capacity, 0.0);
    }

    fn clear(&mut self, num_samples: usize) {
        self.l[..num_samples].fill(0.0);
        self.r[..num_samples].fill(0.0);
    }
}

/// The full multi-band delay engine.
pub struct DelayMatrix {
    bands: Vec<DelayBandNode>,
    routing: RoutingGraph,
    limiter: SafetyLimiter,
    modulation: ModulationEngine,

    // One buffer per node id: input, bands 1..=NUM_BANDS, output
    node_buffers: Vec<StereoBuffer>,
    scratch: StereoBuffer,
    dry: StereoBuffer,

    band_levels: [f32; NUM_BANDS],

    wet_mix: f32,
    dry_level: f32,
    dry_pan: f32,

    prepared: bool,
}

impl DelayMatrix {
    pub fn new() -> Self {
        Self {
            bands: (0..NUM_BANDS).map(|_| DelayBandNode::new()).collect(),
            routing: RoutingGraph::new(),
            limiter: SafetyLimiter::new(),
            modulation: ModulationEngine::new(),
            node_buffers: (0..=OUTPUT_NODE).map(|_| StereoBuffer::new()).collect(),
            scratch: StereoBuffer::new(),
            dry: StereoBuffer::new(),
            band_levels: [0.0; NUM_BANDS],
            wet_mix: 0.5,
            dry_level: 1.0,
            dry_pan: 0.0,
            prepared: false,
        }
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        for band in &mut self.bands {
            band.prepare(sample_rate);
        }
        self.limiter.prepare(sample_rate);
        self.modulation.prepare(sample_rate);

        for buffer in &mut self.node_buffers {
            buffer.allocate(MAX_BLOCK_SIZE);
        }
        self.scratch.allocate(MAX_BLOCK_SIZE);
        self.dry.allocate(MAX_BLOCK_SIZE);

        self.prepared = true;
    }

    /// Clear all audio state. The safety latch survives; see
    /// [`unlock_safety_mute`](Self::unlock_safety_mute).
    pub fn reset(&mut self) {
        for band in &mut self.bands {
            band.reset();
        }
        self.limiter.reset();
        self.modulation.reset();
        self.band_levels = [0.0; NUM_BANDS];
    }

    // ---- parameters ----

    /// Replace one band's full parameter set. `band_index` is zero-based.
    pub fn set_band_params(&mut self, band_index: usize, params: DelayBandParams) {
        if let Some(band) = self.bands.get_mut(band_index) {
            band.set_params(params);
            self.modulation.set_band_params(
                band_index,
                params.mod_waveform,
                params.mod_rate_hz,
                params.mod_depth,
            );
        }
    }

    pub fn band_params(&self, band_index: usize) -> Option<&DelayBandParams> {
        self.bands.get(band_index).map(|band| band.params())
    }

    pub fn set_master_modulator(&mut self, waveform: Waveform, rate: f32, depth: f32) {
        self.modulation.set_master_params(waveform, rate, depth);
    }

    /// Wet mix, 0.0 all dry to 1.0 all wet.
    pub fn set_mix(&mut self, mix: f32) {
        self.wet_mix = mix.clamp(0.0, 1.0);
    }

    pub fn set_dry_level(&mut self, level: f32) {
        self.dry_level = level.max(0.0);
    }

    pub fn set_dry_pan(&mut self, pan: f32) {
        self.dry_pan = pan.clamp(-1.0, 1.0);
    }

    pub fn set_limiter_threshold(&mut self, threshold_db: f32) {
        self.limiter.set_threshold(threshold_db);
    }

    // ---- routing ----

    pub fn routing(&self) -> &RoutingGraph {
        &self.routing
    }

    pub fn routing_mut(&mut self) -> &mut RoutingGraph {
        &mut self.routing
    }

    /// Wholesale routing replacement, applied between blocks.
    pub fn set_routing_state(&mut self, state: &RoutingState) {
        self.routing.set_state(state);
    }

    pub fn routing_state(&self) -> RoutingState {
        self.routing.state()
    }

    // ---- telemetry ----

    /// Peak level of a band's last processed block, zero-based index.
    pub fn band_level(&self, band_index: usize) -> f32 {
        self.band_levels.get(band_index).copied().unwrap_or(0.0)
    }

    pub fn is_safety_muted(&self) -> bool {
        self.limiter.is_permanently_muted()
    }

    pub fn safety_mute_reason(&self) -> MuteReason {
        self.limiter.mute_reason()
    }

    /// Shared latch handle for a UI thread.
    pub fn safety_latch(&self) -> Arc<MuteLatch> {
        self.limiter.latch()
    }

    pub fn unlock_safety_mute(&mut self) {
        self.limiter.unlock_permanent_mute();
    }

    pub fn danger_event_count(&self) -> u32 {
        self.limiter.danger_event_count()
    }

    pub fn reset_danger_event_count(&self) {
        self.limiter.reset_danger_event_count();
    }

    // ---- processing ----

    /// Drain pending control commands. Called at a block boundary, never
    /// mid-block.
    pub fn apply_commands(&mut self, rx: &mut impl CommandReceiver) {
        while let Some(command) = rx.pop() {
            match command {
                MatrixCommand::SetBandParams { band_index, params } => {
                    self.set_band_params(band_index, params);
                }
                MatrixCommand::SetMasterModulator {
                    waveform,
                    rate,
                    depth,
                } => self.set_master_modulator(waveform, rate, depth),
                MatrixCommand::SetMix(mix) => self.set_mix(mix),
                MatrixCommand::SetDryLevel(level) => self.set_dry_level(level),
                MatrixCommand::SetDryPan(pan) => self.set_dry_pan(pan),
                MatrixCommand::ReplaceRouting(state) => self.set_routing_state(&state),
                MatrixCommand::Reset => self.reset(),
                MatrixCommand::UnlockSafetyMute => self.unlock_safety_mute(),
            }
        }
    }

    /// Process a stereo block in place. Blocks larger than `MAX_BLOCK_SIZE`
    /// are split internally.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        if !self.prepared {
            return;
        }
        debug_assert_eq!(left.len(), right.len());

        let total = left.len().min(right.len());
        let mut start = 0;
        while start < total {
            let end = (start + MAX_BLOCK_SIZE).min(total);
            self.process_chunk(&mut left[start..end], &mut right[start..end]);
            start = end;
        }
    }

    fn process_chunk(&mut self, left: &mut [f32], right: &mut [f32]) {
        let num_samples = left.len();
        if num_samples == 0 {
            return;
        }

        for buffer in &mut self.node_buffers {
            buffer.clear(num_samples);
        }

        self.dry.l[..num_samples].copy_from_slice(left);
        self.dry.r[..num_samples].copy_from_slice(right);

        self.node_buffers[INPUT_NODE].l[..num_samples].copy_from_slice(left);
        self.node_buffers[INPUT_NODE].r[..num_samples].copy_from_slice(right);

        self.modulation.process(num_samples);

        for &node in self.routing.processing_order() {
            if node == INPUT_NODE {
                continue; // Already populated
            }

            // Sum declared inputs into scratch. The graph sanitizes edges on
            // every mutation, so an unknown source here means a bug upstream;
            // skip it rather than fault the audio thread.
            self.scratch.clear(num_samples);
            for source in self.routing.inputs_for(node) {
                let Some(source_buffer) = self.node_buffers.get(source) else {
                    continue;
                };
                sum_in_place(
                    &mut self.scratch.l[..num_samples],
                    &source_buffer.l[..num_samples],
                );
                sum_in_place(
                    &mut self.scratch.r[..num_samples],
                    &source_buffer.r[..num_samples],
                );
            }

            if node != OUTPUT_NODE {
                let band_index = node - 1;
                let Some(band) = self.bands.get_mut(band_index) else {
                    continue;
                };

                band.process(
                    &mut self.scratch.l[..num_samples],
                    &mut self.scratch.r[..num_samples],
                    1.0, // Matrix-level dry/wet happens after the limiter
                    self.modulation.band_buffer(band_index, num_samples),
                    Some(self.modulation.master_buffer(num_samples)),
                );

                let peak = self.scratch.l[..num_samples]
                    .iter()
                    .chain(self.scratch.r[..num_samples].iter())
                    .fold(0.0f32, |m, s| m.max(s.abs()));
                self.band_levels[band_index] = peak;
            }

            let node_buffer = &mut self.node_buffers[node];
            node_buffer.l[..num_samples].copy_from_slice(&self.scratch.l[..num_samples]);
            node_buffer.r[..num_samples].copy_from_slice(&self.scratch.r[..num_samples]);
        }

        // Safety chain on the wet signal only
        let wet = &mut self.node_buffers[OUTPUT_NODE];
        self.limiter
            .process(&mut wet.l[..num_samples], &mut wet.r[..num_samples]);

        let (pan_l, pan_r) = equal_power_pan(self.dry_pan);
        let dry_gain_l = pan_l * self.dry_level;
        let dry_gain_r = pan_r * self.dry_level;

        for i in 0..num_samples {
            left[i] = self.dry.l[i] * dry_gain_l + wet.l[i] * self.wet_mix;
            right[i] = self.dry.r[i] * dry_gain_r + wet.r[i] * self.wet_mix;
        }
    }
}

impl Default for DelayMatrix {
    fn default() -> Self {
        Self::new()
    }
}
