#![forbid(unsafe_code)]

use std::f32::consts::TAU;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};
use nx_audio::loopback::{LoopbackConfig, LoopbackIpc};
use nx_audio::{AudioOutConfig, SwitchAudio, BYTES_PER_SAMPLE, CHANNEL_COUNT};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Back-off between polls when a non-blocking write makes no progress.
const NONBLOCK_POLL: Duration = Duration::from_millis(2);

#[derive(Debug, Parser)]
#[command(
    about = "Stream PCM through the audio-out driver over the loopback service",
    group(ArgGroup::new("source").args(["tone", "input"]))
)]
struct Args {
    /// Output name exposed by the loopback service.
    #[arg(long)]
    device: Option<String>,

    /// Target latency in milliseconds (overrides NX_AUDIO_LATENCY_MS).
    #[arg(long)]
    latency: Option<u32>,

    /// Return immediately when no buffer is free instead of waiting.
    #[arg(long)]
    nonblock: bool,

    /// Seconds of tone to generate.
    #[arg(long, default_value_t = 2)]
    seconds: u32,

    /// Sine tone frequency in Hz.
    #[arg(long, default_value_t = 440)]
    tone: u32,

    /// Raw interleaved s16le stereo file to play instead of a tone.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Bytes handed to each write call.
    #[arg(long, default_value_t = 4096)]
    chunk: usize,

    /// Release buffers as soon as they are queued instead of pacing to real time.
    #[arg(long)]
    fast: bool,
}

fn tone_pcm(rate: u32, hz: u32, seconds: u32) -> Vec<u8> {
    let frames = rate as usize * seconds as usize;
    let mut pcm = Vec::with_capacity(frames * CHANNEL_COUNT as usize * BYTES_PER_SAMPLE);
    for n in 0..frames {
        let phase = (n as f32 * hz as f32 / rate as f32).fract();
        let sample = ((phase * TAU).sin() * f32::from(i16::MAX) * 0.25) as i16;
        for _ in 0..CHANNEL_COUNT {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
    }
    pcm
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if args.chunk == 0 {
        bail!("--chunk must be non-zero");
    }

    let mut config = AudioOutConfig::from_env().context("invalid NX_AUDIO_* environment")?;
    if let Some(device) = &args.device {
        config.device = Some(device.clone());
    }
    if let Some(latency) = args.latency {
        config.latency_ms = latency;
    }
    if args.nonblock {
        config.block_frames = false;
    }

    let mut loopback = LoopbackConfig {
        realtime: !args.fast,
        ..LoopbackConfig::default()
    };
    if let Some(device) = &config.device {
        loopback.output_names = vec![device.clone()];
    }
    let ipc = LoopbackIpc::new(loopback);
    let stats = ipc.stats();

    let (mut swa, rate) = SwitchAudio::init(ipc, &config).context("audio-out init failed")?;

    let pcm = match &args.input {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read PCM input {}", path.display()))?,
        None => tone_pcm(rate, args.tone, args.seconds),
    };

    swa.start(false).context("failed to start audio output")?;
    let started = Instant::now();

    let mut stalls = 0u64;
    for chunk in pcm.chunks(args.chunk) {
        let mut rest = chunk;
        while !rest.is_empty() {
            let n = swa.write(rest).context("audio write failed")?;
            if n == 0 {
                stalls += 1;
                thread::sleep(NONBLOCK_POLL);
            }
            rest = &rest[n..];
        }
    }

    if let Err(err) = swa.stop() {
        warn!(%err, "failed to stop audio output");
    }
    let pending = swa.pending_bytes();
    drop(swa);

    info!(
        bytes = pcm.len(),
        pending,
        stalls,
        elapsed_ms = started.elapsed().as_millis() as u64,
        buffers_played = stats.buffers_played(),
        bytes_played = stats.bytes_played(),
        "playback finished"
    );
    Ok(())
}
