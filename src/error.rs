//! Error taxonomy for the connection engine.

use std::io;

use thiserror::Error;

/// HTTP/2 error codes (RFC 7540 Section 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    NoError = 0x0,
    ProtocolError = 0x1,
    InternalError = 0x2,
    FlowControlError = 0x3,
    SettingsTimeout = 0x4,
    StreamClosed = 0x5,
    FrameSizeError = 0x6,
    RefusedStream = 0x7,
    Cancel = 0x8,
    CompressionError = 0x9,
    ConnectError = 0xa,
    EnhanceYourCalm = 0xb,
    InadequateSecurity = 0xc,
    Http11Required = 0xd,
}

impl ErrorCode {
    pub fn from_u32(v: u32) -> Self {
        match v {
            0x0 => Self::NoError,
            0x1 => Self::ProtocolError,
            0x2 => Self::InternalError,
            0x3 => Self::FlowControlError,
            0x4 => Self::SettingsTimeout,
            0x5 => Self::StreamClosed,
            0x6 => Self::FrameSizeError,
            0x7 => Self::RefusedStream,
            0x8 => Self::Cancel,
            0x9 => Self::CompressionError,
            0xa => Self::ConnectError,
            0xb => Self::EnhanceYourCalm,
            0xc => Self::InadequateSecurity,
            0xd => Self::Http11Required,
            _ => Self::InternalError,
        }
    }
}

/// Errors produced by frame parsing and connection serving.
///
/// The serve loop classifies these three ways: [`Error::Stream`] resets one
/// stream and keeps the connection alive, [`Error::GoAwayFlow`] emits
/// GOAWAY(FLOW_CONTROL_ERROR) before terminating, and everything else
/// terminates the connection outright.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// Received bytes that violate the framing layer.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// HPACK header block could not be decoded or encoded.
    #[error("HPACK compression error")]
    Compression,
    /// Frame length field out of bounds for its type.
    #[error("frame size error")]
    FrameSize,
    /// A flow control window went out of its legal range.
    #[error("flow control error")]
    FlowControl,
    /// Stream-level error: reset the stream, connection continues.
    #[error("stream {id} error: {code:?}")]
    Stream { id: u32, code: ErrorCode },
    /// Connection-level error: terminate the connection.
    #[error("connection error: {0:?}")]
    Connection(ErrorCode),
    /// Connection-wide flow control window overflow: GOAWAY then terminate.
    #[error("connection flow control window overflow")]
    GoAwayFlow,
}

impl Error {
    /// Whether this is the boring "peer went away" family of I/O errors.
    pub(crate) fn is_closed_transport(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
