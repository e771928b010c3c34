//! echograph - live multi-band delay demo
//!
//! Routes the default input device through three parallel delay bands and
//! plays the result on the default output device. Run with: cargo run

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::RingBuffer;

use echograph::dsp::AlgorithmKind;
use echograph::graph::band::DelayBandParams;
use echograph::graph::routing::{INPUT_NODE, OUTPUT_NODE};
use echograph::{DelayMatrix, Waveform, MAX_BLOCK_SIZE, NUM_BANDS};

use std::time::Duration;

fn main() -> EyreResult<()> {
    color_eyre::install()?;

    let host = cpal::default_host();
    let input_device = host
        .default_input_device()
        .ok_or_else(|| eyre!("no default input device available"))?;
    let output_device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;

    let output_config = output_device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;
    let input_config = input_device
        .default_input_config()
        .wrap_err("failed to fetch default input config")?;

    let sample_rate = output_config.sample_rate().0 as f64;
    let output_channels = output_config.channels() as usize;
    let input_channels = input_config.channels() as usize;

    println!("=== echograph ===");
    println!("Input:  {}", input_device.name().unwrap_or_default());
    println!("Output: {}", output_device.name().unwrap_or_default());
    println!("Sample rate: {} Hz", sample_rate);
    println!();

    let mut matrix = build_matrix(sample_rate);
    let latch = matrix.safety_latch();

    // Mono frames from the input callback to the output callback
    let (mut frame_tx, mut frame_rx) = RingBuffer::<f32>::new(MAX_BLOCK_SIZE * 8);

    let input_stream = input_device.build_input_stream(
        &input_config.into(),
        move |data: &[f32], _| {
            // Fold interleaved input down to mono; drop frames when the
            // output side falls behind
            for frame in data.chunks(input_channels) {
                let mono = frame.iter().sum::<f32>() / input_channels as f32;
                let _ = frame_tx.push(mono);
            }
        },
        |err| eprintln!("Input error: {}", err),
        None,
    )?;

    let mut left = vec![0.0f32; MAX_BLOCK_SIZE];
    let mut right = vec![0.0f32; MAX_BLOCK_SIZE];

    let output_stream = output_device.build_output_stream(
        &output_config.into(),
        move |data: &mut [f32], _| {
            let total_frames = data.len() / output_channels;
            let mut frames_written = 0;

            while frames_written < total_frames {
                let frames = (total_frames - frames_written).min(MAX_BLOCK_SIZE);

                let block_l = &mut left[..frames];
                let block_r = &mut right[..frames];
                for (l, r) in block_l.iter_mut().zip(block_r.iter_mut()) {
                    let sample = frame_rx.pop().unwrap_or(0.0);
                    *l = sample;
                    *r = sample;
                }

                matrix.process(block_l, block_r);

                let offset = frames_written * output_channels;
                for i in 0..frames {
                    for ch in 0..output_channels {
                        let sample = if ch % 2 == 0 { block_l[i] } else { block_r[i] };
                        data[offset + i * output_channels + ch] = sample;
                    }
                }

                frames_written += frames;
            }
        },
        |err| eprintln!("Audio error: {}", err),
        None,
    )?;

    input_stream.play()?;
    output_stream.play()?;

    println!("Running... Press Ctrl+C to stop");
    loop {
        std::thread::sleep(Duration::from_millis(500));
        if latch.is_muted() {
            eprintln!(
                "SAFETY MUTE: {:?} (danger events: {})",
                latch.reason(),
                latch.danger_event_count()
            );
        }
    }
}

/// Three parallel bands: a short slap, a panned quarter-note echo with tape
/// coloration, and a long modulated ambient tail.
fn build_matrix(sample_rate: f64) -> DelayMatrix {
    let mut matrix = DelayMatrix::new();
    matrix.prepare(sample_rate);

    let routing = matrix.routing_mut();
    for band in 4..=NUM_BANDS {
        routing.remove_band(band);
    }
    routing.set_default_parallel_routing();
    debug_assert!(routing.inputs_for(OUTPUT_NODE).len() == 3);
    debug_assert!(routing.outputs_for(INPUT_NODE).len() == 3);

    matrix.set_band_params(
        0,
        DelayBandParams {
            delay_time_ms: 110.0,
            feedback: 0.15,
            level: 0.5,
            pan: -0.3,
            ..Default::default()
        },
    );
    matrix.set_band_params(
        1,
        DelayBandParams {
            delay_time_ms: 370.0,
            feedback: 0.45,
            level: 0.6,
            pan: 0.4,
            algorithm: AlgorithmKind::Tape,
            ping_pong: true,
            ..Default::default()
        },
    );
    matrix.set_band_params(
        2,
        DelayBandParams {
            delay_time_ms: 620.0,
            feedback: 0.6,
            level: 0.35,
            hi_cut_hz: 4_000.0,
            mod_rate_hz: 0.3,
            mod_depth: 0.15,
            mod_waveform: Waveform::Brownian,
            attack_time_ms: 250.0,
            ..Default::default()
        },
    );

    matrix.set_mix(0.5);
    matrix.set_dry_level(1.0);
    matrix
}
