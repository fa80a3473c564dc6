//! AES-GCM open/seal under a per-request session key.
//!
//! The session key length selects the cipher: 16 bytes → AES-128-GCM,
//! 32 bytes → AES-256-GCM. Nonces are 12 bytes; 16-byte nonces are only
//! reachable when the request IV policy is [`IvPolicy::Extended`] and are
//! processed with standard GCM for that nonce size (GHASH-derived counter).
//!
//! Tags are always 16 bytes and are carried detached from the ciphertext.
//!
//! [`IvPolicy::Extended`]: super::envelope::IvPolicy::Extended

use aes_gcm::{
    aead::{
        consts::U16, generic_array::typenum::Unsigned, AeadCore, AeadInPlace, KeyInit, Nonce,
        Tag,
    },
    aes::{Aes128, Aes256},
    Aes128Gcm, Aes256Gcm, AesGcm,
};
use common::FlowError;
use zeroize::Zeroize;

/// Standard GCM nonce length.
pub const NONCE_LEN: usize = 12;

/// Extended nonce length accepted under the lenient IV policy.
pub const EXTENDED_NONCE_LEN: usize = 16;

/// GCM authentication tag length.
pub const TAG_LEN: usize = 16;

type Aes128GcmNonce16 = AesGcm<Aes128, U16>;
type Aes256GcmNonce16 = AesGcm<Aes256, U16>;

/// Authenticated cipher selected by session key length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherVariant {
    Aes128Gcm,
    Aes256Gcm,
}

impl CipherVariant {
    /// Name used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            CipherVariant::Aes128Gcm => "aes-128-gcm",
            CipherVariant::Aes256Gcm => "aes-256-gcm",
        }
    }
}

/// Symmetric key recovered from one request envelope.
///
/// Lives for a single request/response cycle. The bytes are overwritten with
/// zeroes on drop and never printed.
pub enum SessionKey {
    Aes128([u8; 16]),
    Aes256([u8; 32]),
}

impl SessionKey {
    /// Build a session key from unwrapped key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidKeyLength`] unless `bytes` is 16 or 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FlowError> {
        match bytes.len() {
            16 => {
                let mut key = [0u8; 16];
                key.copy_from_slice(bytes);
                Ok(SessionKey::Aes128(key))
            }
            32 => {
                let mut key = [0u8; 32];
                key.copy_from_slice(bytes);
                Ok(SessionKey::Aes256(key))
            }
            n => Err(FlowError::InvalidKeyLength(n)),
        }
    }

    pub fn variant(&self) -> CipherVariant {
        match self {
            SessionKey::Aes128(_) => CipherVariant::Aes128Gcm,
            SessionKey::Aes256(_) => CipherVariant::Aes256Gcm,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SessionKey::Aes128(k) => k,
            SessionKey::Aes256(k) => k,
        }
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        match self {
            SessionKey::Aes128(k) => k.zeroize(),
            SessionKey::Aes256(k) => k.zeroize(),
        }
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        write!(f, "SessionKey({}, [REDACTED])", self.variant().as_str())
    }
}

/// Authenticate and decrypt `ciphertext` with a detached `tag`.
///
/// # Errors
///
/// - [`FlowError::MalformedEnvelope`] if the IV or tag has an unsupported length.
/// - [`FlowError::AuthenticationFailed`] if the tag does not verify. No
///   plaintext is returned in that case.
pub fn open(
    key: &SessionKey,
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, FlowError> {
    match (key, iv.len()) {
        (SessionKey::Aes128(k), NONCE_LEN) => open_with::<Aes128Gcm>(k, iv, ciphertext, tag),
        (SessionKey::Aes256(k), NONCE_LEN) => open_with::<Aes256Gcm>(k, iv, ciphertext, tag),
        (SessionKey::Aes128(k), EXTENDED_NONCE_LEN) => {
            open_with::<Aes128GcmNonce16>(k, iv, ciphertext, tag)
        }
        (SessionKey::Aes256(k), EXTENDED_NONCE_LEN) => {
            open_with::<Aes256GcmNonce16>(k, iv, ciphertext, tag)
        }
        _ => Err(FlowError::MalformedEnvelope("unsupported IV length")),
    }
}

/// Encrypt `plaintext`, returning `(ciphertext, tag)`.
///
/// # Errors
///
/// - [`FlowError::MalformedEnvelope`] if the IV has an unsupported length.
/// - [`FlowError::EncryptionFailed`] on an internal AEAD error.
pub fn seal(
    key: &SessionKey,
    iv: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_LEN]), FlowError> {
    match (key, iv.len()) {
        (SessionKey::Aes128(k), NONCE_LEN) => seal_with::<Aes128Gcm>(k, iv, plaintext),
        (SessionKey::Aes256(k), NONCE_LEN) => seal_with::<Aes256Gcm>(k, iv, plaintext),
        (SessionKey::Aes128(k), EXTENDED_NONCE_LEN) => {
            seal_with::<Aes128GcmNonce16>(k, iv, plaintext)
        }
        (SessionKey::Aes256(k), EXTENDED_NONCE_LEN) => {
            seal_with::<Aes256GcmNonce16>(k, iv, plaintext)
        }
        _ => Err(FlowError::MalformedEnvelope("unsupported IV length")),
    }
}

fn open_with<C>(
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, FlowError>
where
    C: KeyInit + AeadInPlace,
{
    if iv.len() != <C as AeadCore>::NonceSize::USIZE {
        return Err(FlowError::MalformedEnvelope("unsupported IV length"));
    }
    if tag.len() != <C as AeadCore>::TagSize::USIZE {
        return Err(FlowError::MalformedEnvelope("authentication tag has wrong length"));
    }
    let cipher = C::new_from_slice(key).map_err(|_| FlowError::InvalidKeyLength(key.len()))?;

    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::<C>::from_slice(iv),
            b"",
            &mut buffer,
            Tag::<C>::from_slice(tag),
        )
        .map_err(|_| FlowError::AuthenticationFailed)?;
    Ok(buffer)
}

fn seal_with<C>(
    key: &[u8],
    iv: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_LEN]), FlowError>
where
    C: KeyInit + AeadInPlace,
{
    if iv.len() != <C as AeadCore>::NonceSize::USIZE {
        return Err(FlowError::MalformedEnvelope("unsupported IV length"));
    }
    let cipher = C::new_from_slice(key).map_err(|_| FlowError::InvalidKeyLength(key.len()))?;

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::<C>::from_slice(iv), b"", &mut buffer)
        .map_err(|_| FlowError::EncryptionFailed)?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_slice());
    Ok((buffer, tag_bytes))
}
