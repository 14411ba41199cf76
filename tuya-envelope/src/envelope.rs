use crate::error::{EnvelopeError, Result};
use std::ops::Range;

/// Size of the vendor header that precedes the ciphertext.
pub const HEADER_LEN: usize = 64;
/// Byte range of the IV inside the header.
pub const IV_RANGE: Range<usize> = 4..20;
/// AES block size.
pub const BLOCK_LEN: usize = 16;
/// Smallest envelope that can hold a header and one cipher block.
pub const MIN_ENVELOPE_LEN: usize = HEADER_LEN + BLOCK_LEN;

/// Borrowed view over a downloaded envelope.
///
/// Layout is fixed: bytes `[4, 20)` are the IV and everything from byte 64 onwards is
/// ciphertext. The remaining header bytes are vendor metadata and are never read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub iv: [u8; 16],
    pub ciphertext: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Split `data` into IV and ciphertext without looking at the first four header bytes.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        EnvelopeParser::new().parse(data)
    }
}

/// Container parser with an optional header check.
///
/// The default parser accepts any front matter. [`EnvelopeParser::magic`] turns on a strict
/// comparison of the first four header bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnvelopeParser {
    magic: Option<[u8; 4]>,
}

impl EnvelopeParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the header to start with `magic`.
    pub fn magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = Some(magic);
        self
    }

    pub fn is_strict(&self) -> bool {
        self.magic.is_some()
    }

    pub fn parse<'a>(&self, data: &'a [u8]) -> Result<Envelope<'a>> {
        check_len(data.len())?;

        if let Some(expected) = self.magic {
            let mut found = [0_u8; 4];
            found.copy_from_slice(&data[..4]);

            if found != expected {
                return Err(EnvelopeError::HeaderMismatch { expected, found });
            }
        }

        let mut iv = [0_u8; 16];
        iv.copy_from_slice(&data[IV_RANGE]);

        Ok(Envelope {
            iv,
            ciphertext: &data[HEADER_LEN..],
        })
    }
}

/// Fails with [`EnvelopeError::TooSmall`] when `len` cannot hold a header and one block.
pub fn check_len(len: usize) -> Result<()> {
    if len < MIN_ENVELOPE_LEN {
        return Err(EnvelopeError::TooSmall {
            actual: len,
            minimum: MIN_ENVELOPE_LEN,
        });
    }

    Ok(())
}
