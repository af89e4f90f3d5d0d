use crate::serde;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
/// Possible `libbpi` errors
pub enum Error {
    /// The underlying stream ran out of bits in the middle of a field
    #[error("unexpected end of stream")]
    EndOfStream,
    /// A caller-supplied dimension, bit width or palette is out of range.
    /// Always reported before anything is written to the stream
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A reader/writer protocol violation
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// An image or block index beyond the known bounds
    #[error("index {index} out of range (known length: {len})")]
    IndexOutOfRange {
        /// the requested index
        index: usize,
        /// the number of known elements
        len: usize,
    },
    /// A collection descriptor whose block graph does not resolve
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(String),
    /// Error returned if a descriptor tree fails to parse
    #[error("descriptor parse error")]
    Descriptor(#[from] serde::error::Error),
    /// Any other I/O error from the underlying byte source/sink
    #[error("i/o error")]
    Io(#[source] io::Error),
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        if value.kind() == io::ErrorKind::UnexpectedEof {
            Self::EndOfStream
        } else {
            Self::Io(value)
        }
    }
}

impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDescriptor(msg.into())
    }
}
