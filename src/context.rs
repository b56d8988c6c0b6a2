//! Parse contexts: owned payload copies with budget-gated ingestion.
//!
//! One ingestion call produces one [`ParamContext`]. The context copies the
//! payload out of its source, holds the budget reservation for its lifetime,
//! and releases it exactly once on drop. Structured contexts are handed back
//! only after the header passed validation; a context in any other state
//! never escapes this module.

use std::ffi::CStr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::header::{parse_header, PayloadHeader, Token};
use crate::throttle::PayloadBudget;
use crate::tokenizer::{self, Cursor, ParamPair};
use crate::transport::PayloadSource;
use crate::{FieldKind, ParseError, ParseResult, PayloadError, Result, DEFAULT_NAME_CAP};

/// A single ingested payload, structured or byte-stream.
///
/// Single-owner, sequential access: all cursor movement goes through
/// `&mut self`. Dropping the context returns its bytes to the budget.
#[derive(Debug)]
pub struct ParamContext {
    buf: Vec<u8>,
    payload_len: usize,
    byte_stream: bool,
    header: Option<PayloadHeader>,
    cursor: Cursor,
    budget: Arc<PayloadBudget>,
}

impl ParamContext {
    /// Ingest a structured payload and validate its header.
    ///
    /// The declared `length` covers the whole payload, header included. On
    /// any failure after admission the reservation is released before the
    /// error surfaces; no partially valid context is ever returned.
    pub fn structured<S: PayloadSource>(
        source: &mut S,
        length: u32,
        budget: Arc<PayloadBudget>,
    ) -> Result<Self> {
        let mut ctx = Self::ingest(source, length, false, budget)?;

        let header = *parse_header(&ctx.buf).map_err(|err| {
            warn!("rejected structured payload: {}", err);
            err
        })?;
        header.validate(ctx.payload_len).map_err(|err| {
            warn!("rejected structured payload: {}", err);
            err
        })?;
        ctx.header = Some(header);

        let token = header.token;
        debug!(
            "structured context ready: {} bytes, token {}",
            ctx.payload_len, token
        );
        Ok(ctx)
    }

    /// Ingest an opaque byte-stream payload.
    ///
    /// The buffer gets one extra byte past the declared length, kept at
    /// `0x00`, so `as_c_str` is always terminator-bounded.
    pub fn byte_stream<S: PayloadSource>(
        source: &mut S,
        length: u32,
        budget: Arc<PayloadBudget>,
    ) -> Result<Self> {
        let ctx = Self::ingest(source, length, true, budget)?;
        debug!("byte-stream context ready: {} bytes", ctx.payload_len);
        Ok(ctx)
    }

    fn ingest<S: PayloadSource>(
        source: &mut S,
        length: u32,
        byte_stream: bool,
        budget: Arc<PayloadBudget>,
    ) -> Result<Self> {
        let payload_len = length as usize;
        let alloc = payload_len + usize::from(byte_stream);

        budget.try_reserve(payload_len)?;

        // The context owns the reservation from here on; every failure path
        // below releases it through Drop.
        let mut ctx = Self {
            buf: Vec::new(),
            payload_len,
            byte_stream,
            header: None,
            cursor: Cursor::empty(),
            budget,
        };

        if ctx.buf.try_reserve_exact(alloc).is_err() {
            return Err(PayloadError::AllocationFailed { bytes: alloc });
        }
        ctx.buf.resize(alloc, 0);

        source.read_at(0, &mut ctx.buf[..payload_len])?;
        Ok(ctx)
    }

    /// Declared payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload_len
    }

    pub fn is_empty(&self) -> bool {
        self.payload_len == 0
    }

    pub fn is_byte_stream(&self) -> bool {
        self.byte_stream
    }

    /// The validated header, absent for byte-stream contexts.
    pub fn header(&self) -> Option<&PayloadHeader> {
        self.header.as_ref()
    }

    /// The header's identifying token, or the zero sentinel when the context
    /// carries no header.
    pub fn token(&self) -> Token {
        match &self.header {
            Some(header) => header.token,
            None => Token::ZERO,
        }
    }

    /// Point the active cursor at one of the header-located sub-fields.
    ///
    /// The peer-declared locator is range-checked against the ingested
    /// payload before the cursor moves; a locator that walks outside the
    /// buffer fails with [`ParseError::FieldOutOfRange`] and leaves the
    /// cursor unmodified.
    pub fn select_field(&mut self, kind: FieldKind) -> ParseResult<()> {
        let header = self.header.as_ref().ok_or(ParseError::NotStructured)?;
        let (offset, length) = header.field_range(kind);

        if u64::from(offset) + u64::from(length) > self.payload_len as u64 {
            warn!(
                "rejected {:?} field locator: offset {} + length {} exceeds {} payload bytes",
                kind, offset, length, self.payload_len
            );
            return Err(ParseError::FieldOutOfRange {
                kind,
                offset,
                length,
            });
        }

        self.cursor = Cursor::new(offset as usize, length as usize);
        debug!("selected {:?} field: {} bytes at offset {}", kind, length, offset);
        Ok(())
    }

    /// Extract the next `name:value` pair from the selected field.
    ///
    /// `Ok(None)` is the normal end of the field; errors mean the remaining
    /// field content is unparsable and the context should be discarded.
    pub fn next_pair(&mut self) -> ParseResult<Option<ParamPair>> {
        self.next_pair_bounded(DEFAULT_NAME_CAP)
    }

    /// Same as `next_pair` with a caller-chosen cap on the name length.
    pub fn next_pair_bounded(&mut self, name_cap: usize) -> ParseResult<Option<ParamPair>> {
        tokenizer::next_pair(&self.buf, &mut self.cursor, name_cap).map_err(|err| {
            debug!("parameter field unparsable: {}", err);
            err
        })
    }

    /// Terminator-bounded text of a byte-stream payload.
    ///
    /// `None` for structured contexts. Never fails for byte-stream contexts
    /// because ingestion appends the terminator.
    pub fn as_c_str(&self) -> Option<&CStr> {
        if !self.byte_stream {
            return None;
        }
        CStr::from_bytes_until_nul(&self.buf).ok()
    }

    /// Raw bytes of a byte-stream payload at the declared length, without
    /// the appended terminator. `None` for structured contexts.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.byte_stream.then(|| &self.buf[..self.payload_len])
    }

    /// Owned copy of the selected field's bytes up to the first terminator
    /// or the end of the window.
    ///
    /// `None` when no field window is active (nothing selected yet, or a
    /// byte-stream context). The cursor does not move.
    pub fn extract_string(&self) -> Option<Vec<u8>> {
        let window = self.cursor.remaining(&self.buf);
        if window.is_empty() {
            return None;
        }
        let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
        Some(window[..end].to_vec())
    }
}

impl Drop for ParamContext {
    fn drop(&mut self) {
        self.budget.release(self.payload_len);
    }
}
