use thiserror::Error;

use crate::PcmFormat;

pub type Result<T> = std::result::Result<T, AudioOutError>;

/// Service call that returned a failure status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceOp {
    Initialize,
    ListOutputs,
    OpenOutput,
    RegisterBufferEvent,
    AppendBuffer,
    GetReleasedBuffer,
    Start,
    Stop,
}

impl core::fmt::Display for ServiceOp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Initialize => "initialize",
            Self::ListOutputs => "list_outputs",
            Self::OpenOutput => "open_output",
            Self::RegisterBufferEvent => "register_buffer_event",
            Self::AppendBuffer => "append_buffer",
            Self::GetReleasedBuffer => "get_released_buffer",
            Self::Start => "start",
            Self::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// A nonzero status returned across the audio-out service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("audio-out service call {op} failed with status {code:#x}")]
pub struct ServiceError {
    pub op: ServiceOp,
    pub code: i32,
}

impl ServiceError {
    pub fn new(op: ServiceOp, code: i32) -> Self {
        Self { op, code }
    }
}

/// Errors surfaced by the audio-out driver.
///
/// A non-blocking write that finds no free buffer is not an error; it reports zero bytes
/// consumed instead.
#[derive(Debug, Error)]
pub enum AudioOutError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("expected exactly one audio output, service listed {found}")]
    EndpointCount { found: usize },

    #[error("expected sample rate of {expected}, got sample rate of {got}")]
    SampleRate { expected: u32, got: u32 },

    #[error("expected {expected} channels, got {got}")]
    ChannelCount { expected: u32, got: u32 },

    #[error("expected PCM_INT16, got {got:?}")]
    SampleFormat { got: PcmFormat },

    #[error("failed to allocate {size} bytes for output buffer {index}")]
    Alloc { index: usize, size: usize },

    #[error("output name is longer than {max} bytes")]
    NameTooLong { max: usize },

    #[error("blocking wait for a released buffer was cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl AudioOutError {
    /// Whether this error came out of a service call (as opposed to a local check).
    pub fn service_op(&self) -> Option<ServiceOp> {
        match self {
            Self::Service(err) => Some(err.op),
            _ => None,
        }
    }
}
