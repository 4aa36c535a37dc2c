//! Wallet addresses and message signatures.
//!
//! An address is the hex-encoded Ed25519 verifying key; a message signature is
//! the base64-encoded Ed25519 signature over the UTF-8 message bytes.
use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("key is not valid hex: {0}")]
    KeyEncoding(#[from] hex::FromHexError),
    #[error("key must be {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },
    #[error("address is not a valid Ed25519 public key")]
    InvalidAddress(#[source] ed25519_dalek::SignatureError),
    #[error("signature is not valid base64: {0}")]
    SignatureEncoding(#[from] base64::DecodeError),
    #[error("malformed signature")]
    MalformedSignature(#[source] ed25519_dalek::SignatureError),
    #[error("signature does not match message and address")]
    Mismatch(#[source] ed25519_dalek::SignatureError),
}

pub fn generate_wallet() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

pub fn address_of(key: &SigningKey) -> String {
    hex::encode(key.verifying_key().as_bytes())
}

pub fn secret_hex(key: &SigningKey) -> String {
    hex::encode(key.to_bytes())
}

pub fn signing_key_from_hex(secret: &str) -> Result<SigningKey, WalletError> {
    let bytes: [u8; SECRET_KEY_LENGTH] = decode_fixed(secret)?;
    Ok(SigningKey::from_bytes(&bytes))
}

pub fn sign_message(key: &SigningKey, message: &str) -> String {
    STANDARD.encode(key.sign(message.as_bytes()).to_bytes())
}

/// Verify that `signature` was produced over `message` by the key behind `address`.
pub fn verify_message(address: &str, message: &str, signature: &str) -> Result<(), WalletError> {
    let key_bytes: [u8; PUBLIC_KEY_LENGTH] = decode_fixed(address)?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(WalletError::InvalidAddress)?;
    let sig_bytes = STANDARD.decode(signature.trim())?;
    let signature =
        Signature::from_slice(&sig_bytes).map_err(WalletError::MalformedSignature)?;
    key.verify_strict(message.as_bytes(), &signature)
        .map_err(WalletError::Mismatch)
}

fn decode_fixed<const N: usize>(encoded: &str) -> Result<[u8; N], WalletError> {
    let bytes = hex::decode(encoded.trim())?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| WalletError::KeyLength {
        expected: N,
        actual,
    })
}
