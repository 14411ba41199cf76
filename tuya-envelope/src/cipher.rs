use crate::{
    envelope::BLOCK_LEN,
    error::{EnvelopeError, Result},
};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use std::fmt;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// AES-CBC variant, chosen only by key length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
}

impl Algorithm {
    pub fn from_key_len(len: usize) -> Result<Self> {
        Ok(match len {
            16 => Self::Aes128Cbc,
            24 => Self::Aes192Cbc,
            32 => Self::Aes256Cbc,
            actual => return Err(EnvelopeError::InvalidKeyLength { actual }),
        })
    }

    pub fn key_len(&self) -> usize {
        match self {
            Self::Aes128Cbc => 16,
            Self::Aes192Cbc => 24,
            Self::Aes256Cbc => 32,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Aes128Cbc => "aes-128-cbc",
            Self::Aes192Cbc => "aes-192-cbc",
            Self::Aes256Cbc => "aes-256-cbc",
        })
    }
}

/// Decrypt `ciphertext` with AES-CBC and strip PKCS#7 padding.
///
/// The key length is checked before the ciphertext is looked at, then block alignment,
/// then padding. A padding failure almost always means a wrong key or IV offset.
pub fn decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8; 16]) -> Result<Vec<u8>> {
    let algorithm = Algorithm::from_key_len(key.len())?;

    if ciphertext.len() % BLOCK_LEN != 0 {
        return Err(EnvelopeError::CiphertextNotBlockAligned {
            len: ciphertext.len(),
        });
    }

    match algorithm {
        Algorithm::Aes128Cbc => decrypt_padded::<Aes128CbcDec>(ciphertext, key, iv),
        Algorithm::Aes192Cbc => decrypt_padded::<Aes192CbcDec>(ciphertext, key, iv),
        Algorithm::Aes256Cbc => decrypt_padded::<Aes256CbcDec>(ciphertext, key, iv),
    }
}

/// Pad `plaintext` with PKCS#7 and encrypt it with AES-CBC.
pub fn encrypt(plaintext: &[u8], key: &[u8], iv: &[u8; 16]) -> Result<Vec<u8>> {
    match Algorithm::from_key_len(key.len())? {
        Algorithm::Aes128Cbc => encrypt_padded::<Aes128CbcEnc>(plaintext, key, iv),
        Algorithm::Aes192Cbc => encrypt_padded::<Aes192CbcEnc>(plaintext, key, iv),
        Algorithm::Aes256Cbc => encrypt_padded::<Aes256CbcEnc>(plaintext, key, iv),
    }
}

fn decrypt_padded<C>(ciphertext: &[u8], key: &[u8], iv: &[u8; 16]) -> Result<Vec<u8>>
where
    C: BlockDecryptMut + KeyIvInit,
{
    C::new_from_slices(key, iv)
        .map_err(|_| EnvelopeError::InvalidKeyLength { actual: key.len() })?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| EnvelopeError::PaddingInvalid)
}

fn encrypt_padded<C>(plaintext: &[u8], key: &[u8], iv: &[u8; 16]) -> Result<Vec<u8>>
where
    C: BlockEncryptMut + KeyIvInit,
{
    Ok(C::new_from_slices(key, iv)
        .map_err(|_| EnvelopeError::InvalidKeyLength { actual: key.len() })?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}
