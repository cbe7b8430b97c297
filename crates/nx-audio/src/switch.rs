//! Audio-out driver session.
//!
//! Three buffers are allocated at init and immediately queued with the service. From then on
//! each buffer alternates between the service (queued or playing) and the writer (being
//! filled). [`SwitchAudio::write`] copies caller bytes into the checked-out buffer and submits it
//! once it holds more than the latency budget.

use std::time::Instant;

use tracing::{error, info, warn};

use crate::buffer::OutputBuffer;
use crate::config::{flush_threshold, AudioOutConfig};
use crate::error::{AudioOutError, Result};
use crate::flow::{acquire_buffer, CancelToken, FlowMode};
use crate::service::{AppendError, AudioIpc, AudioOutput, PcmFormat};
use crate::{BUFFER_COUNT, CHANNEL_COUNT, MAX_OUTPUT_NAMES, SAMPLE_BUFFER_SIZE, SAMPLE_RATE};

/// Finalizes the service session when dropped.
struct IpcGuard<I: AudioIpc> {
    ipc: I,
}

impl<I: AudioIpc> Drop for IpcGuard<I> {
    fn drop(&mut self) {
        self.ipc.finalize();
    }
}

/// Closes the output when dropped.
struct OutputGuard<O: AudioOutput> {
    output: O,
}

impl<O: AudioOutput> Drop for OutputGuard<O> {
    fn drop(&mut self) {
        self.output.close();
    }
}

/// One active audio-out driver instance.
///
/// Dropping the session closes the output and then finalizes the service.
pub struct SwitchAudio<I: AudioIpc> {
    mode: FlowMode,
    is_paused: bool,
    last_append: Instant,
    latency_ms: u32,
    /// Buffer checked out for filling. Never also queued with the service.
    current: Option<OutputBuffer>,
    cancel: Option<CancelToken>,

    event: <I::Output as AudioOutput>::Event,
    // Field order is drop order: the output must close before the service is finalized.
    output: OutputGuard<I::Output>,
    ipc: IpcGuard<I>,
}

impl<I: AudioIpc> SwitchAudio<I> {
    /// Negotiate with the service and prime it with the buffer pool.
    ///
    /// Returns the session and the negotiated sample rate. Any failure releases everything
    /// acquired so far, in reverse order.
    pub fn init(mut ipc: I, config: &AudioOutConfig) -> Result<(Self, u32)> {
        config.validate()?;

        ipc.initialize()
            .inspect_err(|err| error!(%err, "failed to initialize audio-out service"))?;
        let mut ipc = IpcGuard { ipc };

        let names = ipc
            .ipc
            .list_outputs(MAX_OUTPUT_NAMES)
            .inspect_err(|err| error!(%err, "failed to list audio outputs"))?;
        if names.len() != 1 {
            error!(found = names.len(), "expected exactly one audio output");
            return Err(AudioOutError::EndpointCount { found: names.len() });
        }

        let output = ipc
            .ipc
            .open_output(&names[0])
            .inspect_err(|err| error!(%err, name = %names[0], "failed to open audio output"))?;
        let mut output = OutputGuard { output };

        let info = output.output.info();
        if info.sample_rate != SAMPLE_RATE {
            error!(
                expected = SAMPLE_RATE,
                got = info.sample_rate,
                "unexpected audio output sample rate"
            );
            return Err(AudioOutError::SampleRate {
                expected: SAMPLE_RATE,
                got: info.sample_rate,
            });
        }
        if info.channel_count != CHANNEL_COUNT {
            error!(
                expected = CHANNEL_COUNT,
                got = info.channel_count,
                "unexpected audio output channel count"
            );
            return Err(AudioOutError::ChannelCount {
                expected: CHANNEL_COUNT,
                got: info.channel_count,
            });
        }
        if info.sample_format != PcmFormat::Int16 {
            error!(got = ?info.sample_format, "expected PCM_INT16 audio output");
            return Err(AudioOutError::SampleFormat {
                got: info.sample_format,
            });
        }

        let event = output
            .output
            .register_buffer_event()
            .inspect_err(|err| error!(%err, "failed to register audio buffer event"))?;

        for index in 0..BUFFER_COUNT {
            let Some(memory) = ipc.ipc.alloc_buffer_memory(SAMPLE_BUFFER_SIZE) else {
                error!(index, size = SAMPLE_BUFFER_SIZE, "failed to allocate audio buffer");
                return Err(AudioOutError::Alloc {
                    index,
                    size: SAMPLE_BUFFER_SIZE,
                });
            };
            output
                .output
                .append_buffer(OutputBuffer::new(index, memory))
                .map_err(|AppendError { error, .. }| {
                    error!(%error, index, "failed to queue audio buffer");
                    error
                })?;
        }

        let swa = Self {
            mode: FlowMode::from_block_frames(config.block_frames),
            is_paused: true,
            last_append: Instant::now(),
            latency_ms: config.latency_ms,
            current: None,
            cancel: None,
            event,
            output,
            ipc,
        };

        info!(
            rate = info.sample_rate,
            latency_ms = swa.latency_ms,
            blocking = swa.mode.is_blocking(),
            "audio-out initialized"
        );
        Ok((swa, info.sample_rate))
    }

    /// Append interleaved little-endian `i16` stereo bytes.
    ///
    /// Returns how many bytes were consumed, which can be less than `buf.len()` when the
    /// checked-out buffer fills up, and `0` when non-blocking and no buffer is free. The caller
    /// resubmits the remainder.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.current.is_none() {
            let acquired = acquire_buffer(
                &mut self.output.output,
                &self.event,
                self.mode,
                self.cancel.as_ref(),
            )
            .inspect_err(|err| {
                if err.service_op().is_some() {
                    warn!(%err, "failed to get released audio buffer");
                }
            })?;
            match acquired {
                Some(buffer) => self.current = Some(buffer),
                None => return Ok(0),
            }
        }

        let threshold = self.flush_threshold();
        let Some(current) = self.current.as_mut() else {
            return Ok(0);
        };
        let written = current.fill(buf);

        if current.data_size() > threshold {
            if let Some(buffer) = self.current.take() {
                if let Err(AppendError { error, buffer }) = self.output.output.append_buffer(buffer)
                {
                    warn!(%error, "failed to submit audio buffer");
                    self.current = Some(buffer);
                    return Err(error.into());
                }
            }
        }

        self.last_append = Instant::now();
        Ok(written)
    }

    /// Pause playback. Stopping a paused session is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        if !self.is_paused {
            self.output.output.stop().inspect_err(|err| {
                warn!(%err, "failed to stop audio output");
            })?;
        }
        self.is_paused = true;
        Ok(())
    }

    /// Resume playback. Starting a running session is a no-op.
    pub fn start(&mut self, _is_shutdown: bool) -> Result<()> {
        if self.is_paused {
            self.output.output.start().inspect_err(|err| {
                warn!(%err, "failed to start audio output");
            })?;
        }
        self.is_paused = false;
        Ok(())
    }

    pub fn alive(&self) -> bool {
        !self.is_paused
    }

    pub fn set_nonblock_state(&mut self, nonblock: bool) {
        self.mode = FlowMode::from_nonblock(nonblock);
    }

    pub fn flow_mode(&self) -> FlowMode {
        self.mode
    }

    pub fn is_blocking(&self) -> bool {
        self.mode.is_blocking()
    }

    /// Samples are always handed over as `i16`.
    pub fn use_float(&self) -> bool {
        false
    }

    /// Bytes that fit into the checked-out buffer, or `0` if no buffer is checked out.
    pub fn write_avail(&self) -> usize {
        self.current.as_ref().map_or(0, OutputBuffer::remaining)
    }

    pub fn buffer_size(&self) -> usize {
        SAMPLE_BUFFER_SIZE
    }

    pub fn latency_ms(&self) -> u32 {
        self.latency_ms
    }

    pub fn flush_threshold(&self) -> usize {
        flush_threshold(self.latency_ms)
    }

    /// Time of the last successful write.
    pub fn last_append(&self) -> Instant {
        self.last_append
    }

    /// Bytes buffered in the checked-out buffer and not yet submitted.
    pub fn pending_bytes(&self) -> usize {
        self.current.as_ref().map_or(0, OutputBuffer::data_size)
    }

    /// Attach a token that aborts blocking buffer waits with [`AudioOutError::Cancelled`].
    pub fn set_cancel_token(&mut self, token: Option<CancelToken>) {
        self.cancel = token;
    }

    pub fn output(&self) -> &I::Output {
        &self.output.output
    }

    pub fn ipc(&self) -> &I {
        &self.ipc.ipc
    }
}

impl<I: AudioIpc> core::fmt::Debug for SwitchAudio<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SwitchAudio")
            .field("mode", &self.mode)
            .field("is_paused", &self.is_paused)
            .field("latency_ms", &self.latency_ms)
            .field("pending_bytes", &self.pending_bytes())
            .finish_non_exhaustive()
    }
}
