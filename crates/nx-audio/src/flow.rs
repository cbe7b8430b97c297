//! Buffer acquisition and blocking/non-blocking flow control.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::buffer::OutputBuffer;
use crate::error::{AudioOutError, Result};
use crate::service::{AudioOutput, ReleaseEvent};
use crate::RELEASE_WAIT_TIMEOUT;

/// Whether a write may wait for the service to release a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMode {
    Blocking,
    NonBlocking,
}

impl FlowMode {
    /// Mode for the frontend's "nonblock" toggle.
    pub fn from_nonblock(nonblock: bool) -> Self {
        if nonblock {
            Self::NonBlocking
        } else {
            Self::Blocking
        }
    }

    pub fn from_block_frames(block_frames: bool) -> Self {
        Self::from_nonblock(!block_frames)
    }

    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Blocking)
    }
}

/// Cancels a blocking buffer wait from another thread.
///
/// The flag is checked before every bounded wait, so a cancelled writer returns within one
/// [`RELEASE_WAIT_TIMEOUT`]. Once set it stays set until [`CancelToken::reset`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Check a released buffer out of the service for writing.
///
/// Returns `Ok(None)` only in [`FlowMode::NonBlocking`] when the service has nothing to give
/// back; the release event is not touched in that case. In blocking mode the wait/query loop
/// runs until a buffer is released, a query fails, or `cancel` fires. The returned buffer has
/// its fill length reset.
pub fn acquire_buffer<O: AudioOutput>(
    output: &mut O,
    event: &O::Event,
    mode: FlowMode,
    cancel: Option<&CancelToken>,
) -> Result<Option<OutputBuffer>> {
    let mut buffer = output.get_released_buffer()?;

    if buffer.is_none() {
        if !mode.is_blocking() {
            return Ok(None);
        }

        debug!("no released audio buffer, blocking");
        while buffer.is_none() {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                debug!("blocking audio buffer wait cancelled");
                return Err(AudioOutError::Cancelled);
            }
            event.wait(RELEASE_WAIT_TIMEOUT);
            event.reset();
            buffer = output.get_released_buffer()?;
        }
    }

    Ok(buffer.map(|mut buffer| {
        buffer.clear();
        buffer
    }))
}
