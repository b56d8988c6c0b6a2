//! Throttled ingestion and parsing of untrusted channel payloads.
//!
//! This crate takes a length-bounded byte payload delivered by a peer (copied
//! from a local span or fetched through a memory-region capability) and exposes
//! it either as an opaque NUL-terminated byte stream or as a structured set of
//! named sub-fields, each holding a sequence of `name:value` pairs. Admission
//! of payload bytes is gated by a process-wide budget so a flood of oversized
//! payloads cannot pin unbounded memory.

use thiserror::Error;

pub mod config;
pub mod context;
pub mod header;
pub mod throttle;
pub mod tokenizer;
pub mod transport;

pub use config::*;
pub use context::*;
pub use header::*;
pub use throttle::*;
pub use tokenizer::*;
pub use transport::*;

/// Default ceiling on bytes held by all live parse contexts (128 KiB).
pub const DEFAULT_BUDGET_CEILING: usize = 128 * 1024;

/// Default cap on a parameter name, in bytes.
pub const DEFAULT_NAME_CAP: usize = 128;

/// Payload ingestion and parsing errors
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Payload throttled: {requested} bytes requested, {available} available")]
    Throttled { requested: usize, available: usize },

    #[error("Buffer allocation failed for {bytes} bytes")]
    AllocationFailed { bytes: usize },

    #[error("Invalid source address: offset {addr:#x} + {len} exceeds {span}-byte span")]
    InvalidAddress { addr: u64, len: usize, span: usize },

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl PayloadError {
    /// Whether the caller may retry the same request later.
    ///
    /// Budget denial and allocation failure are transient; every other
    /// error means the payload or the source is bad and retrying cannot
    /// help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PayloadError::Throttled { .. } | PayloadError::AllocationFailed { .. }
        )
    }
}

/// Result type for payload operations
pub type Result<T> = std::result::Result<T, PayloadError>;

/// Malformed payload and field content errors
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Payload too small for header: need {need} bytes, got {got}")]
    PayloadTooSmall { need: usize, got: usize },

    #[error("Header total length {declared} does not match ingested length {ingested}")]
    LengthMismatch { declared: u32, ingested: usize },

    #[error("Header length {header} exceeds total length {total}")]
    HeaderExceedsTotal { total: u32, header: u32 },

    #[error("Header length {got} below minimum {min}")]
    HeaderTooSmall { got: u32, min: usize },

    #[error("{kind:?} field out of range: offset {offset} + length {length} exceeds payload")]
    FieldOutOfRange { kind: FieldKind, offset: u32, length: u32 },

    #[error("Context has no structured header")]
    NotStructured,

    #[error("Parameter name exceeds {cap} bytes")]
    NameTooLong { cap: usize },

    #[error("Unexpected end of parameter input")]
    UnexpectedEnd,

    #[error("Unterminated quoted value opened with {quote}")]
    UnterminatedQuote { quote: char },

    #[error("Missing separator after quoted value")]
    MissingSeparator,
}

/// Result type for parse-level operations
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// The four named sub-fields a structured header locates
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, serde::Serialize, serde::Deserialize)]
pub enum FieldKind {
    Initiator = 1,
    Target = 2,
    Connection = 3,
    Name = 4,
}
