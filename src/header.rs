//! Structured payload header.
//!
//! A structured payload opens with a fixed-layout header declaring the payload
//! and header lengths, an identifying token, and the offset/length locators of
//! four named sub-fields. Every field of the header is peer-controlled and
//! untrusted until `validate` has accepted the length relationships.

use std::mem::size_of;

use zerocopy::{AsBytes, FromBytes, FromZeroes, Ref};

use crate::{FieldKind, ParseError, ParseResult};

/// Identifying token carried by a structured payload (16 opaque bytes).
///
/// The bytes are assigned by the peer and never interpreted here.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
pub struct Token(pub [u8; 16]);

impl Token {
    /// Sentinel returned when no header is present.
    pub const ZERO: Token = Token([0; 16]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 16]
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Structured payload header (56 bytes)
///
/// The header is a prefix of the ingested buffer, not a separate allocation:
///
/// ```text
/// ┌───────────────┬─────────────────────────────────────────┐
/// │ PayloadHeader │ sub-field bytes at header-declared       │
/// │ (56 bytes)    │ offsets (initiator/target/connection/    │
/// │               │ name), each a name:value parameter run   │
/// └───────────────┴─────────────────────────────────────────┘
/// ```
///
/// Native byte order; the channel never crosses a host boundary.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct PayloadHeader {
    pub total_length: u32,      // Whole payload in bytes, header included
    pub header_length: u32,     // Declared header span, must cover SIZE
    pub initiator_offset: u32,
    pub initiator_length: u32,
    pub target_offset: u32,
    pub target_length: u32,
    pub connection_offset: u32,
    pub connection_length: u32,
    pub name_offset: u32,
    pub name_length: u32,
    pub token: Token,           // Opaque peer-assigned id
}

impl PayloadHeader {
    /// Header size in bytes; also the minimum accepted `header_length`.
    pub const SIZE: usize = 56;

    /// Create a header with no located sub-fields.
    pub fn new(total_length: u32, token: Token) -> Self {
        Self {
            total_length,
            header_length: Self::SIZE as u32,
            initiator_offset: 0,
            initiator_length: 0,
            target_offset: 0,
            target_length: 0,
            connection_offset: 0,
            connection_length: 0,
            name_offset: 0,
            name_length: 0,
            token,
        }
    }

    /// Point `kind` at `length` bytes starting `offset` into the payload.
    pub fn set_field(&mut self, kind: FieldKind, offset: u32, length: u32) {
        match kind {
            FieldKind::Initiator => {
                self.initiator_offset = offset;
                self.initiator_length = length;
            }
            FieldKind::Target => {
                self.target_offset = offset;
                self.target_length = length;
            }
            FieldKind::Connection => {
                self.connection_offset = offset;
                self.connection_length = length;
            }
            FieldKind::Name => {
                self.name_offset = offset;
                self.name_length = length;
            }
        }
    }

    /// Offset/length locator for `kind`, exactly as the peer declared it.
    ///
    /// Not range-checked here; `select_field` on the context rejects
    /// locators that leave the payload.
    pub fn field_range(&self, kind: FieldKind) -> (u32, u32) {
        match kind {
            FieldKind::Initiator => (self.initiator_offset, self.initiator_length),
            FieldKind::Target => (self.target_offset, self.target_length),
            FieldKind::Connection => (self.connection_offset, self.connection_length),
            FieldKind::Name => (self.name_offset, self.name_length),
        }
    }

    /// Validate the header's length relationships against the bytes actually
    /// ingested.
    ///
    /// Checks run in a fixed order and the first failure wins:
    /// `total_length` must equal the ingested byte count, must be at least
    /// `header_length`, and `header_length` must cover the fixed layout.
    /// Sub-field locators are deliberately not checked here.
    pub fn validate(&self, ingested: usize) -> ParseResult<()> {
        let total_length = self.total_length;
        let header_length = self.header_length;

        if total_length as usize != ingested {
            return Err(ParseError::LengthMismatch {
                declared: total_length,
                ingested,
            });
        }

        if total_length < header_length {
            return Err(ParseError::HeaderExceedsTotal {
                total: total_length,
                header: header_length,
            });
        }

        if (header_length as usize) < Self::SIZE {
            return Err(ParseError::HeaderTooSmall {
                got: header_length,
                min: Self::SIZE,
            });
        }

        Ok(())
    }
}

/// Parse a payload header from the front of an ingested buffer
pub fn parse_header(data: &[u8]) -> ParseResult<&PayloadHeader> {
    if data.len() < PayloadHeader::SIZE {
        return Err(ParseError::PayloadTooSmall {
            need: PayloadHeader::SIZE,
            got: data.len(),
        });
    }

    let header = Ref::<_, PayloadHeader>::new(&data[..PayloadHeader::SIZE])
        .ok_or(ParseError::PayloadTooSmall {
            need: PayloadHeader::SIZE,
            got: data.len(),
        })?
        .into_ref();

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(size_of::<PayloadHeader>(), PayloadHeader::SIZE);
        assert_eq!(PayloadHeader::SIZE, 56);
        assert_eq!(size_of::<Token>(), 16);
    }

    #[test]
    fn test_header_creation() {
        let token = Token(*b"0123456789abcdef");
        let header = PayloadHeader::new(200, token);

        let total_length = header.total_length;
        let header_length = header.header_length;
        let stored = header.token;
        assert_eq!(total_length, 200);
        assert_eq!(header_length, PayloadHeader::SIZE as u32);
        assert_eq!(stored, token);
    }

    #[test]
    fn test_header_validation() {
        let mut header = PayloadHeader::new(200, Token::ZERO);
        assert!(header.validate(200).is_ok());

        // Declared total must match the ingested byte count
        let result = header.validate(199);
        assert!(matches!(
            result,
            Err(ParseError::LengthMismatch {
                declared: 200,
                ingested: 199
            })
        ));

        // Header span larger than the whole payload
        header.header_length = 201;
        assert!(matches!(
            header.validate(200),
            Err(ParseError::HeaderExceedsTotal {
                total: 200,
                header: 201
            })
        ));

        // Header span below the fixed layout
        header.header_length = 40;
        assert!(matches!(
            header.validate(200),
            Err(ParseError::HeaderTooSmall { got: 40, min: 56 })
        ));
    }

    #[test]
    fn test_validation_order() {
        // A payload wrong in every way reports the length mismatch first
        let mut header = PayloadHeader::new(10, Token::ZERO);
        header.header_length = 999;
        assert!(matches!(
            header.validate(200),
            Err(ParseError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_header_too_small() {
        let data = [0u8; PayloadHeader::SIZE - 1];
        let result = parse_header(&data);
        assert!(matches!(
            result,
            Err(ParseError::PayloadTooSmall { need: 56, got: 55 })
        ));
    }

    #[test]
    fn test_parse_header_round_trip() {
        let mut header = PayloadHeader::new(300, Token(*b"fedcba9876543210"));
        header.set_field(FieldKind::Name, 56, 44);

        let mut data = header.as_bytes().to_vec();
        data.resize(300, 0);

        let parsed = parse_header(&data).unwrap();
        let total_length = parsed.total_length;
        let token = parsed.token;
        assert_eq!(total_length, 300);
        assert_eq!(token, Token(*b"fedcba9876543210"));
        assert_eq!(parsed.field_range(FieldKind::Name), (56, 44));
        assert_eq!(parsed.field_range(FieldKind::Target), (0, 0));
    }

    #[test]
    fn test_field_locators() {
        let mut header = PayloadHeader::new(400, Token::ZERO);
        header.set_field(FieldKind::Initiator, 56, 10);
        header.set_field(FieldKind::Target, 66, 20);
        header.set_field(FieldKind::Connection, 86, 30);
        header.set_field(FieldKind::Name, 116, 40);

        assert_eq!(header.field_range(FieldKind::Initiator), (56, 10));
        assert_eq!(header.field_range(FieldKind::Target), (66, 20));
        assert_eq!(header.field_range(FieldKind::Connection), (86, 30));
        assert_eq!(header.field_range(FieldKind::Name), (116, 40));
    }

    #[test]
    fn test_token_display() {
        assert_eq!(Token::ZERO.to_string(), "0".repeat(32));
        assert!(Token::ZERO.is_zero());

        let token = Token([
            0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01,
        ]);
        assert_eq!(token.to_string(), "deadbeef000000000000000000000001");
        assert!(!token.is_zero());
    }
}
