// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # AEAD Encryption Implementation
//!
//! This module is part of the Infrastructure layer, providing the concrete
//! implementation of the domain's `EncryptionService` port plus the raw
//! AEAD helpers the seal controller and transit engine key with their own
//! material.
//!
//! ## Overview
//!
//! - **[`AesGcmEncryption`]** — the master-keyed service every engine
//!   encrypts through. It holds no key material; each call fetches the
//!   master key from the seal controller and fails with `Sealed` while
//!   sealed.
//! - **[`seal_aes256_gcm`] / [`open_aes256_gcm`]** — envelope helpers keyed
//!   explicitly. The seal controller uses them with the KEK; the transit
//!   engine uses them with unwrapped version material.
//! - **[`seal_chacha20_poly1305`] / [`open_chacha20_poly1305`]** — the
//!   transit engine's alternative symmetric suite.
//!
//! ## Security Properties
//!
//! - Fresh 96-bit nonce from the system CSPRNG per encryption; the nonce
//!   rides in the envelope.
//! - All decryption failures — wrong key, wrong AAD, truncation, flipped
//!   bits, unknown version byte — surface uniformly as `InvalidCiphertext`.
//!   There is no oracle distinguishing them.
//! - Plaintext comes back in a zeroizing buffer.

use aes_gcm::{AeadInPlace, Aes256Gcm, Key, KeyInit, Nonce};
use chacha20poly1305::{ChaCha20Poly1305, Key as ChaChaKey, Nonce as ChaChaNonce};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use zeroize::Zeroizing;

use strongroom_domain::services::{EncryptionService, MasterKeyProvider};
use strongroom_domain::value_objects::{CiphertextEnvelope, ENVELOPE_VERSION_AES256_GCM, NONCE_LEN};
use strongroom_domain::VaultError;

/// Envelope version byte for ChaCha20-Poly1305 (transit inner envelopes).
pub const ENVELOPE_VERSION_CHACHA20: u8 = 0x02;

/// Draws a fresh 96-bit nonce from the system CSPRNG.
fn random_nonce() -> Result<[u8; NONCE_LEN], VaultError> {
    let mut nonce = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| VaultError::Internal("nonce generation failed".into()))?;
    Ok(nonce)
}

/// Fills a buffer with CSPRNG bytes (key and token generation).
pub fn random_bytes(len: usize) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let mut bytes = Zeroizing::new(vec![0u8; len]);
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| VaultError::Internal("random generation failed".into()))?;
    Ok(bytes)
}

/// Encrypts with AES-256-GCM under an explicit 32-byte key.
pub fn seal_aes256_gcm(
    key: &[u8; 32],
    plaintext: &[u8],
    aad: Option<&[u8]>,
) -> Result<CiphertextEnvelope, VaultError> {
    let nonce = random_nonce()?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut buffer = plaintext.to_vec();
    cipher
        .encrypt_in_place(Nonce::from_slice(&nonce), aad.unwrap_or(b""), &mut buffer)
        .map_err(|_| VaultError::Internal("AES-256-GCM encryption failed".into()))?;

    Ok(CiphertextEnvelope::new(
        ENVELOPE_VERSION_AES256_GCM,
        nonce,
        buffer,
    ))
}

/// Decrypts an AES-256-GCM envelope under an explicit key.
pub fn open_aes256_gcm(
    key: &[u8; 32],
    envelope: &CiphertextEnvelope,
    aad: Option<&[u8]>,
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    if envelope.version() != ENVELOPE_VERSION_AES256_GCM {
        return Err(VaultError::InvalidCiphertext);
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut buffer = envelope.ciphertext().to_vec();
    cipher
        .decrypt_in_place(
            Nonce::from_slice(envelope.nonce()),
            aad.unwrap_or(b""),
            &mut buffer,
        )
        .map_err(|_| VaultError::InvalidCiphertext)?;

    Ok(Zeroizing::new(buffer))
}

/// Encrypts with ChaCha20-Poly1305 under an explicit 32-byte key.
pub fn seal_chacha20_poly1305(
    key: &[u8; 32],
    plaintext: &[u8],
    aad: Option<&[u8]>,
) -> Result<CiphertextEnvelope, VaultError> {
    let nonce = random_nonce()?;
    let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(key));

    let mut buffer = plaintext.to_vec();
    cipher
        .encrypt_in_place(
            ChaChaNonce::from_slice(&nonce),
            aad.unwrap_or(b""),
            &mut buffer,
        )
        .map_err(|_| VaultError::Internal("ChaCha20-Poly1305 encryption failed".into()))?;

    Ok(CiphertextEnvelope::new(ENVELOPE_VERSION_CHACHA20, nonce, buffer))
}

/// Decrypts a ChaCha20-Poly1305 envelope under an explicit key.
pub fn open_chacha20_poly1305(
    key: &[u8; 32],
    envelope: &CiphertextEnvelope,
    aad: Option<&[u8]>,
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    if envelope.version() != ENVELOPE_VERSION_CHACHA20 {
        return Err(VaultError::InvalidCiphertext);
    }
    let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(key));

    let mut buffer = envelope.ciphertext().to_vec();
    cipher
        .decrypt_in_place(
            ChaChaNonce::from_slice(envelope.nonce()),
            aad.unwrap_or(b""),
            &mut buffer,
        )
        .map_err(|_| VaultError::InvalidCiphertext)?;

    Ok(Zeroizing::new(buffer))
}

/// Master-keyed AEAD service implementing the domain port.
pub struct AesGcmEncryption {
    master: Arc<dyn MasterKeyProvider>,
}

impl AesGcmEncryption {
    pub fn new(master: Arc<dyn MasterKeyProvider>) -> Self {
        Self { master }
    }
}

impl EncryptionService for AesGcmEncryption {
    fn encrypt(
        &self,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<CiphertextEnvelope, VaultError> {
        let key = self.master.master_key()?;
        seal_aes256_gcm(key.as_bytes(), plaintext, aad)
    }

    fn decrypt(
        &self,
        envelope: &CiphertextEnvelope,
        aad: Option<&[u8]>,
    ) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        let key = self.master.master_key()?;
        open_aes256_gcm(key.as_bytes(), envelope, aad)
    }
}
