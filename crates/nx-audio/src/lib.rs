//! Audio output driver for the console's system audio-out service.
//!
//! The service plays PCM out of fixed-size shared buffers that the application hands over one
//! at a time. This crate provides:
//!
//! - [`service`]: the service boundary ([`AudioIpc`], [`AudioOutput`], [`ReleaseEvent`])
//! - [`OutputBuffer`]: one page-aligned sample buffer whose ownership moves between the writer
//!   and the service
//! - [`SwitchAudio`]: a driver session that accumulates interleaved `i16` stereo samples into
//!   the checked-out buffer and submits it once the configured latency budget is reached
//! - [`AudioDriver`]: the object-safe interface the frontend dispatches through
//! - [`loopback`]: an in-process implementation of the service used by tests and the CLI
//!
//! All operations on one session are expected to come from a single thread. The only
//! concurrency is the service consuming submitted buffers and signalling their release.

pub mod buffer;
pub mod config;
pub mod driver;
pub mod error;
pub mod flow;
pub mod loopback;
pub mod service;
pub mod switch;

pub use buffer::{OutputBuffer, PageBuf};
pub use config::{AudioOutConfig, ConfigError};
pub use driver::AudioDriver;
pub use error::{AudioOutError, Result, ServiceError, ServiceOp};
pub use flow::{CancelToken, FlowMode};
pub use service::{
    AppendError, AudioIpc, AudioOutput, OutputInfo, OutputName, PcmFormat, ReleaseEvent,
};
pub use switch::SwitchAudio;

use std::time::Duration;

/// The only sample rate the audio-out service accepts.
pub const SAMPLE_RATE: u32 = 48_000;

/// One second worth of frames; sizes each pool buffer.
pub const MAX_SAMPLES_PER_SECOND: u32 = SAMPLE_RATE;

/// Interleaved stereo.
pub const CHANNEL_COUNT: u32 = 2;

pub const BYTES_PER_SAMPLE: usize = core::mem::size_of::<i16>();

pub const PAGE_SIZE: usize = 0x1000;

/// Buffers cycled between the writer and the service.
pub const BUFFER_COUNT: usize = 3;

/// Capacity of every pool buffer: one second of stereo `i16` audio, rounded up to whole pages.
pub const SAMPLE_BUFFER_SIZE: usize = align_up(
    MAX_SAMPLES_PER_SECOND as usize * CHANNEL_COUNT as usize * BYTES_PER_SAMPLE,
    PAGE_SIZE,
);

/// Maximum number of outputs the service enumerates in one call.
pub const MAX_OUTPUT_NAMES: usize = 8;

/// Width of one fixed-size output name slot.
pub const OUTPUT_NAME_LEN: usize = 0x20;

/// Per-attempt wait on the release event while blocking for a buffer.
///
/// Bounded so that a release signalled between the query and the wait is picked up on the next
/// iteration instead of stalling the writer.
pub const RELEASE_WAIT_TIMEOUT: Duration = Duration::from_nanos(33_333_333);

/// Name the driver registers under in the frontend.
pub const DRIVER_IDENT: &str = "switch";

pub(crate) const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + (align - 1)) & !(align - 1)
}
