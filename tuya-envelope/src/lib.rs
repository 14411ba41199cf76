//! This crate splits and decrypts the media envelopes that Tuya cameras and doorbells upload
//! to cloud storage.
//!
//! An envelope is a 64 byte vendor header followed by AES-CBC ciphertext. The IV sits at
//! bytes `[4, 20)` of the header and the AES variant is picked from the key length
//! (16, 24 or 32 bytes).
//!
//! # Example
//!
//! ```no_run
//! use tuya_envelope::Envelope;
//!
//! let data = std::fs::read("snapshot.jpg.enc")?;
//! let envelope = Envelope::parse(&data)?;
//! let image = envelope.decrypt(b"0123456789abcdef")?;
//! std::fs::write("snapshot.jpg", image)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod cipher;
mod envelope;
mod error;

pub use cipher::{Algorithm, decrypt, encrypt};
pub use envelope::{
    BLOCK_LEN, Envelope, EnvelopeParser, HEADER_LEN, IV_RANGE, MIN_ENVELOPE_LEN, check_len,
};
pub use error::{EnvelopeError, Result};

impl Envelope<'_> {
    /// Decrypt the ciphertext region with `key`.
    pub fn decrypt(&self, key: &[u8]) -> Result<Vec<u8>> {
        cipher::decrypt(self.ciphertext, key, &self.iv)
    }

    /// Serialize back into the on-wire layout with a zeroed header.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = vec![0_u8; HEADER_LEN];
        data[IV_RANGE].copy_from_slice(&self.iv);
        data.extend_from_slice(self.ciphertext);
        data
    }
}
