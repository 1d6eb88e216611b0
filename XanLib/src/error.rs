//! Error types for `XanLib`

use thiserror::Error;

/// The error type for `XanLib` operations.
///
/// Decode failures inside a scene are not returned as `Err` from the scene
/// entry points; they are stored on [`Scene::error`](crate::formats::xbf::Scene::error)
/// together with the bytes that could not be parsed.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file or stream operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== XBF Decode Errors ====================
    /// Fewer bytes remain than a fixed-size read requires.
    #[error("truncated input at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedInput {
        /// Stream offset where the read started.
        offset: u64,
        /// Number of bytes the read required.
        needed: u64,
        /// Number of bytes left in the stream.
        available: u64,
    },

    /// An internal cross-check failed, either while decoding (for example a
    /// vertex animation whose base count disagrees with its count) or while
    /// encoding (for example a color list that does not match the vertices).
    #[error("structural mismatch: {message}")]
    StructuralMismatch {
        /// Description of the failed check.
        message: String,
    },

    /// A tagged-union selector fell outside its known domain.
    #[error("unknown {field} discriminant: {value}")]
    UnknownDiscriminant {
        /// The selector field that was read.
        field: &'static str,
        /// The value found in the file.
        value: i64,
    },

    /// The node list terminator was found before the end of the stream.
    #[error("{len} bytes of trailing data after the node list terminator at offset {offset}")]
    TrailingData {
        /// Offset of the terminator.
        offset: u64,
        /// Number of bytes following the terminator.
        len: u64,
    },
}

impl Error {
    /// Shorthand for building a [`Error::StructuralMismatch`].
    pub(crate) fn mismatch(message: impl Into<String>) -> Self {
        Error::StructuralMismatch {
            message: message.into(),
        }
    }

    /// Whether this error describes malformed file content rather than an
    /// I/O failure of the underlying stream.
    pub fn is_data_error(&self) -> bool {
        !matches!(self, Error::Io(_))
    }
}

// `std::io::Error` has no equality, so IO errors compare by kind.
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::Io(a), Error::Io(b)) => a.kind() == b.kind(),
            (
                Error::TruncatedInput { offset: a0, needed: a1, available: a2 },
                Error::TruncatedInput { offset: b0, needed: b1, available: b2 },
            ) => a0 == b0 && a1 == b1 && a2 == b2,
            (
                Error::StructuralMismatch { message: a },
                Error::StructuralMismatch { message: b },
            ) => a == b,
            (
                Error::UnknownDiscriminant { field: af, value: av },
                Error::UnknownDiscriminant { field: bf, value: bv },
            ) => af == bf && av == bv,
            (
                Error::TrailingData { offset: ao, len: al },
                Error::TrailingData { offset: bo, len: bl },
            ) => ao == bo && al == bl,
            _ => false,
        }
    }
}

/// A specialized Result type for `XanLib` operations.
pub type Result<T> = std::result::Result<T, Error>;
