//! Boundary to the system audio-out service.
//!
//! The transport behind these traits (IPC session, kernel handles, transfer memory) is opaque to
//! the driver. [`crate::loopback`] provides an in-process implementation.

use std::time::Duration;

use crate::buffer::{OutputBuffer, PageBuf};
use crate::error::{AudioOutError, ServiceError};
use crate::OUTPUT_NAME_LEN;

/// Sample formats as numbered by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PcmFormat {
    Invalid = 0,
    Int8 = 1,
    Int16 = 2,
    Int24 = 3,
    Int32 = 4,
    Float = 5,
    Adpcm = 6,
}

impl PcmFormat {
    /// Unknown values map to [`PcmFormat::Invalid`].
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Int8,
            2 => Self::Int16,
            3 => Self::Int24,
            4 => Self::Int32,
            5 => Self::Float,
            6 => Self::Adpcm,
            _ => Self::Invalid,
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

/// Stream parameters reported by the service when an output is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputInfo {
    pub sample_rate: u32,
    pub channel_count: u32,
    pub sample_format: PcmFormat,
}

/// Fixed-width, NUL-padded output name as exchanged with the service.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputName([u8; OUTPUT_NAME_LEN]);

impl OutputName {
    pub fn new(name: &str) -> Result<Self, AudioOutError> {
        Self::from_bytes(name.as_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AudioOutError> {
        if bytes.len() > OUTPUT_NAME_LEN {
            return Err(AudioOutError::NameTooLong {
                max: OUTPUT_NAME_LEN,
            });
        }
        let mut raw = [0u8; OUTPUT_NAME_LEN];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(raw))
    }

    /// The full slot including NUL padding.
    pub fn as_raw(&self) -> &[u8; OUTPUT_NAME_LEN] {
        &self.0
    }

    /// Name bytes up to the first NUL.
    pub fn as_bytes(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(OUTPUT_NAME_LEN);
        &self.0[..end]
    }

    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.as_bytes()).ok()
    }
}

impl core::fmt::Debug for OutputName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "OutputName({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl core::fmt::Display for OutputName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

/// A failed append hands the buffer back so ownership is never lost.
#[derive(Debug)]
pub struct AppendError {
    pub error: ServiceError,
    pub buffer: OutputBuffer,
}

/// Event the service signals whenever it releases a buffer back to the application.
pub trait ReleaseEvent {
    /// Block for up to `timeout`. Returns whether the event was signalled.
    fn wait(&self, timeout: Duration) -> bool;

    fn reset(&self);
}

/// One opened audio output.
pub trait AudioOutput {
    type Event: ReleaseEvent;

    fn info(&self) -> OutputInfo;

    fn register_buffer_event(&mut self) -> Result<Self::Event, ServiceError>;

    /// Queue a buffer for playback. The service owns it until it shows up in
    /// [`AudioOutput::get_released_buffer`].
    fn append_buffer(&mut self, buffer: OutputBuffer) -> Result<(), AppendError>;

    /// Pop one buffer the service has finished playing, if any.
    fn get_released_buffer(&mut self) -> Result<Option<OutputBuffer>, ServiceError>;

    fn start(&mut self) -> Result<(), ServiceError>;

    fn stop(&mut self) -> Result<(), ServiceError>;

    /// Close the output. Buffers still queued are released by the service.
    fn close(&mut self);
}

/// Process-wide audio-out service session.
pub trait AudioIpc {
    type Output: AudioOutput;

    fn initialize(&mut self) -> Result<(), ServiceError>;

    fn finalize(&mut self);

    /// Enumerate up to `max` output names. The driver passes [`crate::MAX_OUTPUT_NAMES`].
    fn list_outputs(&mut self, max: usize) -> Result<Vec<OutputName>, ServiceError>;

    fn open_output(&mut self, name: &OutputName) -> Result<Self::Output, ServiceError>;

    /// Allocate page-aligned memory for one sample buffer.
    fn alloc_buffer_memory(&mut self, size: usize) -> Option<PageBuf> {
        PageBuf::try_new(size)
    }
}
