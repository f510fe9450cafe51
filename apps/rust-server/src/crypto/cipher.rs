// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Content cipher for file bytes in transit.
//!
//! AES in CBC mode with PKCS#7 padding. Clients upload content encrypted
//! under a key of their choosing (AES-128/192/256); the server answers
//! every view or download with content encrypted under a fresh AES-256 key
//! and IV. The transport key travels with the ciphertext to the authorized
//! recipient and is never persisted server-side.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use super::random_bytes;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// CBC initialization vector length in bytes.
pub const IV_LEN: usize = 16;

/// Key length used for server-generated transport keys (AES-256).
pub const TRANSPORT_KEY_LEN: usize = 32;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Cryptographic failure. Messages never contain key material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    #[error("invalid key length {0} bytes (expected 16, 24 or 32)")]
    InvalidKeyLength(usize),

    #[error("invalid IV length {0} bytes (expected {IV_LEN})")]
    InvalidIvLength(usize),

    #[error("ciphertext length {0} is not a positive multiple of the block size")]
    InvalidCiphertextLength(usize),

    #[error("invalid padding")]
    InvalidPadding,

    #[error("content is encrypted at rest but no at-rest key is configured")]
    MissingAtRestKey,

    #[error("stored content is truncated")]
    TruncatedContent,

    #[error("system random number generator failure")]
    Rng,
}

/// Ciphertext plus the one-time key and IV that decrypt it.
pub struct TransportEnvelope {
    pub ciphertext: Vec<u8>,
    pub key: [u8; TRANSPORT_KEY_LEN],
    pub iv: [u8; IV_LEN],
}

impl std::fmt::Debug for TransportEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportEnvelope")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("key", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

/// Encrypt `plaintext` under a freshly generated AES-256 key and IV.
pub fn encrypt_for_transport(plaintext: &[u8]) -> Result<TransportEnvelope, CipherError> {
    let key = random_bytes::<TRANSPORT_KEY_LEN>()?;
    let iv = random_bytes::<IV_LEN>()?;
    let ciphertext = encrypt(plaintext, &key, &iv)?;
    Ok(TransportEnvelope {
        ciphertext,
        key,
        iv,
    })
}

/// Decrypt client-supplied transport ciphertext.
pub fn decrypt_from_transport(
    ciphertext: &[u8],
    key: &[u8],
    iv: &[u8],
) -> Result<Vec<u8>, CipherError> {
    decrypt(ciphertext, key, iv)
}

/// AES-CBC encrypt with PKCS#7 padding. The key size selects AES-128/192/256.
pub fn encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CipherError> {
    check_iv(iv)?;
    let bad_key = |_| CipherError::InvalidKeyLength(key.len());
    let ciphertext = match key.len() {
        16 => Aes128CbcEnc::new_from_slices(key, iv)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        24 => Aes192CbcEnc::new_from_slices(key, iv)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        32 => Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        other => return Err(CipherError::InvalidKeyLength(other)),
    };
    Ok(ciphertext)
}

/// AES-CBC decrypt and strip PKCS#7 padding.
///
/// Fails closed on a bad key/IV length, a ciphertext that is empty or not
/// block aligned, and on malformed padding.
pub fn decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CipherError> {
    check_iv(iv)?;
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CipherError::InvalidCiphertextLength(ciphertext.len()));
    }

    let bad_key = |_| CipherError::InvalidKeyLength(key.len());
    let plaintext = match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        24 => Aes192CbcDec::new_from_slices(key, iv)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        other => return Err(CipherError::InvalidKeyLength(other)),
    };
    plaintext.map_err(|_| CipherError::InvalidPadding)
}

fn check_iv(iv: &[u8]) -> Result<(), CipherError> {
    if iv.len() != IV_LEN {
        return Err(CipherError::InvalidIvLength(iv.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::block_padding::NoPadding;

    // NIST SP 800-38A, F.2.1 and F.2.5 (first block).
    const NIST_IV: &str = "000102030405060708090a0b0c0d0e0f";
    const NIST_PLAINTEXT: &str = "6bc1bee22e409f96e93d7e117393172a";

    #[test]
    fn aes128_matches_nist_vector() {
        let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
        let iv = hex::decode(NIST_IV).unwrap();
        let plaintext = hex::decode(NIST_PLAINTEXT).unwrap();

        let ciphertext = encrypt(&plaintext, &key, &iv).unwrap();
        assert_eq!(ciphertext.len(), 32, "one data block plus one padding block");
        assert_eq!(hex::encode(&ciphertext[..16]), "7649abac8119b246cee98e9b12e9197d");
    }

    #[test]
    fn aes256_matches_nist_vector() {
        let key =
            hex::decode("603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4").unwrap();
        let iv = hex::decode(NIST_IV).unwrap();
        let plaintext = hex::decode(NIST_PLAINTEXT).unwrap();

        let ciphertext = encrypt(&plaintext, &key, &iv).unwrap();
        assert_eq!(hex::encode(&ciphertext[..16]), "f58c4c04d6e5f1ba779eabfb5f7bfbd6");
        assert_eq!(decrypt(&ciphertext, &key, &iv).unwrap(), plaintext);
    }

    #[test]
    fn round_trip_for_all_key_sizes_and_lengths() {
        let iv = [7u8; IV_LEN];
        for key_len in [16usize, 24, 32] {
            let key = vec![0x42u8; key_len];
            for len in [0usize, 1, 15, 16, 17, 31, 32, 1000] {
                let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
                let ciphertext = encrypt(&plaintext, &key, &iv).unwrap();
                assert_eq!(ciphertext.len() % BLOCK_SIZE, 0);
                assert!(ciphertext.len() > plaintext.len());
                assert_eq!(decrypt(&ciphertext, &key, &iv).unwrap(), plaintext);
            }
        }
    }

    #[test]
    fn transport_round_trip_uses_fresh_key_and_iv() {
        let plaintext = b"quarterly report contents";
        let first = encrypt_for_transport(plaintext).unwrap();
        let second = encrypt_for_transport(plaintext).unwrap();

        assert_ne!(first.key, second.key);
        assert_ne!(first.iv, second.iv);
        assert_ne!(first.ciphertext, second.ciphertext);

        let decrypted = decrypt_from_transport(&first.ciphertext, &first.key, &first.iv).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn rejects_bad_key_and_iv_lengths() {
        assert_eq!(
            encrypt(b"x", &[0u8; 20], &[0u8; IV_LEN]),
            Err(CipherError::InvalidKeyLength(20))
        );
        assert_eq!(
            decrypt(&[0u8; 16], &[0u8; 32], &[0u8; 8]),
            Err(CipherError::InvalidIvLength(8))
        );
    }

    #[test]
    fn rejects_unaligned_or_empty_ciphertext() {
        let key = [1u8; 32];
        let iv = [2u8; IV_LEN];
        assert_eq!(
            decrypt(&[0u8; 17], &key, &iv),
            Err(CipherError::InvalidCiphertextLength(17))
        );
        assert_eq!(
            decrypt(&[], &key, &iv),
            Err(CipherError::InvalidCiphertextLength(0))
        );
    }

    #[test]
    fn rejects_invalid_padding() {
        let key = [3u8; 32];
        let iv = [4u8; IV_LEN];
        // A block whose last byte is 0x00 can never carry valid PKCS#7 padding.
        let raw = Aes256CbcEnc::new_from_slices(&key, &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<NoPadding>(&[0u8; BLOCK_SIZE]);

        assert_eq!(decrypt(&raw, &key, &iv), Err(CipherError::InvalidPadding));
    }

    #[test]
    fn envelope_debug_redacts_key_material() {
        let envelope = encrypt_for_transport(b"secret").unwrap();
        let debug = format!("{envelope:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(&format!("{:?}", envelope.key)));
    }
}
