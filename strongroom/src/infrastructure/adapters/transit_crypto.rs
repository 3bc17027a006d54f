// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transit Key-Type Cryptography
//!
//! Material generation and sign/verify dispatch for the transit engine's
//! key-type table. The engine stores raw material wrapped under the master
//! key; this module defines what "raw material" means per type and which
//! signature algorithm each asymmetric type uses:
//!
//! | Key type            | Material            | Signature            |
//! |---------------------|---------------------|----------------------|
//! | aes256-gcm96        | 32 random bytes     | —                    |
//! | chacha20-poly1305   | 32 random bytes     | —                    |
//! | rsa-2048/3072/4096  | PKCS#8 DER          | RSA-PSS over SHA-256 |
//! | ecdsa-p256          | 32-byte scalar      | ECDSA/SHA-256, DER   |
//! | ecdsa-p384          | 48-byte scalar      | ECDSA/SHA-384, DER   |
//! | ed25519             | 32-byte seed        | pure Ed25519         |
//!
//! Verification failures of any shape — malformed signature bytes included —
//! report `Ok(false)`; corrupt *material* (which only this system ever
//! writes) reports `Internal`.

use rand::thread_rng;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::RsaPrivateKey;
use sha2::Sha256;
use signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};
use zeroize::Zeroizing;

use strongroom_domain::value_objects::TransitKeyType;
use strongroom_domain::VaultError;

use super::encryption::random_bytes;

fn material_error(key_type: TransitKeyType) -> VaultError {
    VaultError::Internal(format!("corrupt key material for {key_type}"))
}

/// Generates fresh raw material for one key version.
pub fn generate_material(key_type: TransitKeyType) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    match key_type {
        TransitKeyType::Aes256Gcm | TransitKeyType::ChaCha20Poly1305 => random_bytes(32),
        TransitKeyType::Rsa2048 | TransitKeyType::Rsa3072 | TransitKeyType::Rsa4096 => {
            let bits = key_type
                .rsa_bits()
                .ok_or_else(|| material_error(key_type))?;
            let private_key = RsaPrivateKey::new(&mut thread_rng(), bits)
                .map_err(|e| VaultError::Internal(format!("RSA key generation: {e}")))?;
            let der = private_key
                .to_pkcs8_der()
                .map_err(|e| VaultError::Internal(format!("RSA key encoding: {e}")))?;
            Ok(Zeroizing::new(der.as_bytes().to_vec()))
        }
        TransitKeyType::EcdsaP256 => {
            let signing_key = p256::ecdsa::SigningKey::random(&mut thread_rng());
            Ok(Zeroizing::new(signing_key.to_bytes().to_vec()))
        }
        TransitKeyType::EcdsaP384 => {
            let signing_key = p384::ecdsa::SigningKey::random(&mut thread_rng());
            Ok(Zeroizing::new(signing_key.to_bytes().to_vec()))
        }
        TransitKeyType::Ed25519 => {
            let signing_key = ed25519_dalek::SigningKey::generate(&mut thread_rng());
            Ok(Zeroizing::new(signing_key.to_bytes().to_vec()))
        }
    }
}

/// Signs `data` with an asymmetric key's raw material.
pub fn sign(
    key_type: TransitKeyType,
    material: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, VaultError> {
    match key_type {
        TransitKeyType::Aes256Gcm | TransitKeyType::ChaCha20Poly1305 => {
            Err(VaultError::InvalidArgument(format!(
                "key type {key_type} does not support signing"
            )))
        }
        TransitKeyType::Rsa2048 | TransitKeyType::Rsa3072 | TransitKeyType::Rsa4096 => {
            let private_key = RsaPrivateKey::from_pkcs8_der(material)
                .map_err(|_| material_error(key_type))?;
            let signing_key = rsa::pss::BlindedSigningKey::<Sha256>::new(private_key);
            let signature = signing_key.sign_with_rng(&mut thread_rng(), data);
            Ok(signature.to_vec())
        }
        TransitKeyType::EcdsaP256 => {
            let signing_key = p256::ecdsa::SigningKey::from_slice(material)
                .map_err(|_| material_error(key_type))?;
            let signature: p256::ecdsa::Signature = signing_key.sign(data);
            Ok(signature.to_der().as_bytes().to_vec())
        }
        TransitKeyType::EcdsaP384 => {
            let signing_key = p384::ecdsa::SigningKey::from_slice(material)
                .map_err(|_| material_error(key_type))?;
            let signature: p384::ecdsa::Signature = signing_key.sign(data);
            Ok(signature.to_der().as_bytes().to_vec())
        }
        TransitKeyType::Ed25519 => {
            let seed: [u8; 32] = material.try_into().map_err(|_| material_error(key_type))?;
            let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
            Ok(signing_key.sign(data).to_bytes().to_vec())
        }
    }
}

/// Verifies a signature produced by [`sign`]. Any parse or verification
/// failure is `Ok(false)`.
pub fn verify(
    key_type: TransitKeyType,
    material: &[u8],
    data: &[u8],
    signature: &[u8],
) -> Result<bool, VaultError> {
    match key_type {
        TransitKeyType::Aes256Gcm | TransitKeyType::ChaCha20Poly1305 => {
            Err(VaultError::InvalidArgument(format!(
                "key type {key_type} does not support verification"
            )))
        }
        TransitKeyType::Rsa2048 | TransitKeyType::Rsa3072 | TransitKeyType::Rsa4096 => {
            let private_key = RsaPrivateKey::from_pkcs8_der(material)
                .map_err(|_| material_error(key_type))?;
            let verifying_key =
                rsa::pss::VerifyingKey::<Sha256>::new(rsa::RsaPublicKey::from(&private_key));
            let Ok(signature) = rsa::pss::Signature::try_from(signature) else {
                return Ok(false);
            };
            Ok(verifying_key.verify(data, &signature).is_ok())
        }
        TransitKeyType::EcdsaP256 => {
            let signing_key = p256::ecdsa::SigningKey::from_slice(material)
                .map_err(|_| material_error(key_type))?;
            let verifying_key = p256::ecdsa::VerifyingKey::from(&signing_key);
            let Ok(signature) = p256::ecdsa::Signature::from_der(signature) else {
                return Ok(false);
            };
            Ok(verifying_key.verify(data, &signature).is_ok())
        }
        TransitKeyType::EcdsaP384 => {
            let signing_key = p384::ecdsa::SigningKey::from_slice(material)
                .map_err(|_| material_error(key_type))?;
            let verifying_key = p384::ecdsa::VerifyingKey::from(&signing_key);
            let Ok(signature) = p384::ecdsa::Signature::from_der(signature) else {
                return Ok(false);
            };
            Ok(verifying_key.verify(data, &signature).is_ok())
        }
        TransitKeyType::Ed25519 => {
            let seed: [u8; 32] = material.try_into().map_err(|_| material_error(key_type))?;
            let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
            let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
                return Ok(false);
            };
            Ok(signing_key.verifying_key().verify(data, &signature).is_ok())
        }
    }
}
