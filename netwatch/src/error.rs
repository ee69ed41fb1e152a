//! The crate-wide error taxonomy.
//!
//! Two error types exist at two different temperatures. [`DecodeError`] is
//! the hot-path discriminant threaded through every protocol handler on
//! every packet; it is deliberately small and cheap and does not implement
//! `std::error::Error`. [`Error`] is the boundary type returned by
//! operations that run once per session (opening a capture file, assembling
//! a filter, opening a capture device) and is where a caller wants a
//! `Display`-able, `std::error::Error`-compatible value.

use crate::reader::Truncated;

/// Failure of a single protocol handler's own header validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The header was present but failed validation (bad length field,
    /// reserved bits set where they must be zero, and so on).
    Decode(&'static str),
    /// The reader ran out of bytes before the declared structure ended.
    Truncated(&'static str),
}

impl From<Truncated> for DecodeError {
    fn from(_: Truncated) -> Self {
        DecodeError::Truncated("ran out of bytes while reading a header field")
    }
}

impl DecodeError {
    pub fn message(&self) -> &'static str {
        match self {
            DecodeError::Decode(m) => m,
            DecodeError::Truncated(m) => m,
        }
    }
}

/// The three-way outcome a decoded [`crate::pdu::Packet`] is left in.
/// `Truncated` is folded into `DecodeErr` here (per the error taxonomy:
/// "treated as DECODE_ERR with a distinct message"), the distinct message
/// survives on the `DecodeErr` variant itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketStatus {
    NoErr,
    DecodeErr(&'static str),
    UnkProtocol,
}

impl From<DecodeError> for PacketStatus {
    fn from(e: DecodeError) -> Self {
        PacketStatus::DecodeErr(e.message())
    }
}

/// Boundary error type for session-level, once-per-run operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported capture link type: {0}")]
    UnsupportedLinkType(u32),
    #[error("not a valid pcap capture file: {0}")]
    BadCaptureFile(&'static str),
    #[error("{} error(s) assembling filter program", .0.len())]
    FilterAssembly(Vec<crate::filter::AsmError>),
    #[error("capture device error: {0}")]
    CaptureDevice(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
