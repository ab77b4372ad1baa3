//! Entity codec errors
//!
//! Every variant means "these bytes are not one whole record of the
//! expected kind". The scan loop treats all of them as a non-fatal probe
//! miss, so none carry an I/O source.

use thiserror::Error;

/// Result type for entity encoding and decoding
pub type CodecResult<T> = Result<T, CodecError>;

/// Reasons a byte window fails to decode as an entity record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Fewer bytes than the fixed framing requires
    #[error("record too short: {len} bytes, framing needs at least {min}")]
    TooShort { len: usize, min: usize },

    /// Declared record length disagrees with the window
    #[error("record length mismatch: header declares {declared}, window holds {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Unknown format version byte
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    /// Type name differs from the one the decoder expects
    #[error("type name mismatch: expected {expected}, found {found:?}")]
    TypeMismatch { expected: &'static str, found: String },

    /// CRC32 trailer does not match the record bytes
    #[error("checksum mismatch: computed {computed:08x}, stored {stored:08x}")]
    ChecksumMismatch { computed: u32, stored: u32 },

    /// A field ran past the end of the body
    #[error("truncated field {field}: needs {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// String field is not valid UTF-8
    #[error("invalid UTF-8 in field {0}")]
    InvalidUtf8(&'static str),

    /// Enum discriminant outside the known range
    #[error("invalid discriminant {value} for {field}")]
    InvalidDiscriminant { field: &'static str, value: u8 },

    /// Body decoded but did not consume everything before the checksum
    #[error("{0} trailing bytes after record body")]
    TrailingBytes(usize),
}

impl CodecError {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            CodecError::TooShort { .. } => "EXHUME_CODEC_TOO_SHORT",
            CodecError::LengthMismatch { .. } => "EXHUME_CODEC_LENGTH_MISMATCH",
            CodecError::UnsupportedVersion(_) => "EXHUME_CODEC_UNSUPPORTED_VERSION",
            CodecError::TypeMismatch { .. } => "EXHUME_CODEC_TYPE_MISMATCH",
            CodecError::ChecksumMismatch { .. } => "EXHUME_CODEC_CHECKSUM_MISMATCH",
            CodecError::Truncated { .. } => "EXHUME_CODEC_TRUNCATED",
            CodecError::InvalidUtf8(_) => "EXHUME_CODEC_INVALID_UTF8",
            CodecError::InvalidDiscriminant { .. } => "EXHUME_CODEC_INVALID_DISCRIMINANT",
            CodecError::TrailingBytes(_) => "EXHUME_CODEC_TRAILING_BYTES",
        }
    }
}
