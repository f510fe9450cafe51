// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Cryptography
//!
//! - `cipher` - AES-CBC content encryption for transport
//! - `reference` - keyed, reversible encoding of file ids into opaque references
//! - `at_rest` - optional server-key protection of stored content
//!
//! All randomness comes from the operating system CSPRNG via `ring`.

pub mod at_rest;
pub mod cipher;
pub mod reference;

pub use at_rest::{AtRestPolicy, SealedContent};
pub use cipher::{CipherError, TransportEnvelope};
pub use reference::{ReferenceError, ReferenceKey, ReferenceTokenizer};

use ring::rand::{SecureRandom, SystemRandom};

/// Fill a fixed-size array with bytes from the system CSPRNG.
pub fn random_bytes<const N: usize>() -> Result<[u8; N], CipherError> {
    let mut buf = [0u8; N];
    SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| CipherError::Rng)?;
    Ok(buf)
}
