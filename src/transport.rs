//! Payload byte sources.
//!
//! Ingestion never touches peer memory directly; it pulls bytes through a
//! capability. Directly addressable local memory is wrapped in [`MemorySpan`];
//! hardware memory-region channels implement [`PayloadSource`] in the
//! embedding system and surface their failures as [`SourceError::Transport`].

use thiserror::Error;

use crate::PayloadError;

/// Failure modes of a payload source.
///
/// The two variants map onto distinct crate-level errors: a rejected local
/// address is the caller handing us a bad span, a region read failure is the
/// channel misbehaving.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("address {addr:#x} + {len} outside {span}-byte span")]
    AddressOutOfRange { addr: u64, len: usize, span: usize },

    #[error("region read failed: {0}")]
    Transport(#[from] std::io::Error),
}

impl From<SourceError> for PayloadError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::AddressOutOfRange { addr, len, span } => {
                PayloadError::InvalidAddress { addr, len, span }
            }
            SourceError::Transport(io) => PayloadError::Transport(io),
        }
    }
}

/// Synchronous byte supplier for payload ingestion.
///
/// Context creation performs one bulk read from offset zero. The call may
/// block inside the implementation and may fail; there is no cancellation at
/// this layer.
pub trait PayloadSource {
    /// Copy exactly `dst.len()` bytes starting at `offset` into `dst`.
    fn read_at(&mut self, offset: u64, dst: &mut [u8]) -> Result<(), SourceError>;
}

/// Directly addressable local memory window.
///
/// The window borrows the bytes; reads outside it are rejected before any
/// copy, which is what keeps an attacker-supplied (address, length) pair from
/// walking past the mapped region.
#[derive(Debug)]
pub struct MemorySpan<'a> {
    bytes: &'a [u8],
}

impl<'a> MemorySpan<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Size of the addressable window in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl PayloadSource for MemorySpan<'_> {
    fn read_at(&mut self, offset: u64, dst: &mut [u8]) -> Result<(), SourceError> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = start.saturating_add(dst.len());
        if start > self.bytes.len() || end > self.bytes.len() {
            return Err(SourceError::AddressOutOfRange {
                addr: offset,
                len: dst.len(),
                span: self.bytes.len(),
            });
        }
        dst.copy_from_slice(&self.bytes[start..end]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_read_in_range() {
        let mut span = MemorySpan::new(b"abcdef");
        let mut dst = [0u8; 4];

        span.read_at(0, &mut dst).unwrap();
        assert_eq!(&dst, b"abcd");

        span.read_at(2, &mut dst).unwrap();
        assert_eq!(&dst, b"cdef");
    }

    #[test]
    fn test_span_read_whole() {
        let mut span = MemorySpan::new(b"abc");
        let mut dst = [0u8; 3];
        span.read_at(0, &mut dst).unwrap();
        assert_eq!(&dst, b"abc");
    }

    #[test]
    fn test_span_read_out_of_range() {
        let mut span = MemorySpan::new(b"abc");
        let mut dst = [0u8; 4];

        let err = span.read_at(0, &mut dst).unwrap_err();
        assert!(matches!(
            err,
            SourceError::AddressOutOfRange {
                addr: 0,
                len: 4,
                span: 3
            }
        ));
    }

    #[test]
    fn test_span_read_offset_past_end() {
        let mut span = MemorySpan::new(b"abc");
        let mut dst = [0u8; 1];
        assert!(span.read_at(7, &mut dst).is_err());
    }

    #[test]
    fn test_span_huge_offset_rejected() {
        let mut span = MemorySpan::new(b"abc");
        let mut dst = [0u8; 1];
        assert!(span.read_at(u64::MAX, &mut dst).is_err());
    }

    #[test]
    fn test_empty_read_from_empty_span() {
        let mut span = MemorySpan::new(b"");
        let mut dst = [0u8; 0];
        assert!(span.read_at(0, &mut dst).is_ok());
        assert!(span.is_empty());
    }

    #[test]
    fn test_source_error_maps_to_payload_error() {
        let out_of_range = SourceError::AddressOutOfRange {
            addr: 16,
            len: 8,
            span: 4,
        };
        assert!(matches!(
            PayloadError::from(out_of_range),
            PayloadError::InvalidAddress {
                addr: 16,
                len: 8,
                span: 4
            }
        ));

        let io = SourceError::Transport(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "channel reset",
        ));
        let mapped = PayloadError::from(io);
        assert!(matches!(mapped, PayloadError::Transport(_)));
        assert!(!mapped.is_retryable());
    }
}
