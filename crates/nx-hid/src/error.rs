use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("input report too short: {len} bytes (expected at least {min})")]
    TooShort { len: usize, min: usize },
}
