use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use chacha20poly1305::{AeadInPlace, ChaCha20Poly1305, Key, KeyInit, Nonce, Tag, XChaCha20Poly1305, XNonce};
use rand_core::{OsRng, RngCore};

use crate::{
    TokenError, NETCODE_CONNECT_TOKEN_SEQUENCE_BYTES, NETCODE_CONNECT_TOKEN_XNONCE_BYTES, NETCODE_KEY_BYTES, NETCODE_MAC_BYTES,
    NETCODE_SEQUENCE_VERSION_INFO, NETCODE_VERSION_INFO, NETCODE_VERSION_INFO_BYTES,
};

/// Key shared by the token issuer and the dedicated servers, used only to seal and open the
/// private part of connect tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey([u8; NETCODE_KEY_BYTES]);

impl PrivateKey {
    pub const fn from_bytes(bytes: [u8; NETCODE_KEY_BYTES]) -> Self {
        Self(bytes)
    }

    /// Generate a new key with randomness from the operating system.
    pub fn generate() -> Self {
        Self(generate_random_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; NETCODE_KEY_BYTES] {
        &self.0
    }
}

impl TryFrom<&[u8]> for PrivateKey {
    type Error = std::array::TryFromSliceError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(bytes.try_into()?))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// How the nonce of the private part is chosen. A deployment picks one, the version info of
/// each token says which one was used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NonceScheme {
    /// 24 random bytes per token with XChaCha20-Poly1305.
    #[default]
    Extended,
    /// Monotonic 64 bit sequence zero-extended to the 12 byte ChaCha20-Poly1305 nonce.
    Sequence,
}

impl NonceScheme {
    pub fn version_info(&self) -> &'static [u8; NETCODE_VERSION_INFO_BYTES] {
        match self {
            NonceScheme::Extended => NETCODE_VERSION_INFO,
            NonceScheme::Sequence => NETCODE_SEQUENCE_VERSION_INFO,
        }
    }

    pub fn from_version_info(version_info: &[u8]) -> Option<Self> {
        if version_info == NETCODE_VERSION_INFO {
            Some(NonceScheme::Extended)
        } else if version_info == NETCODE_SEQUENCE_VERSION_INFO {
            Some(NonceScheme::Sequence)
        } else {
            None
        }
    }

    /// Bytes the nonce takes in the public token.
    pub const fn nonce_bytes(&self) -> usize {
        match self {
            NonceScheme::Extended => NETCODE_CONNECT_TOKEN_XNONCE_BYTES,
            NonceScheme::Sequence => NETCODE_CONNECT_TOKEN_SEQUENCE_BYTES,
        }
    }
}

/// Nonce used to seal one private connect token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenNonce {
    Sequence(u64),
    Extended([u8; NETCODE_CONNECT_TOKEN_XNONCE_BYTES]),
}

impl TokenNonce {
    /// Draw a random extended nonce.
    pub fn random() -> Self {
        TokenNonce::Extended(generate_random_bytes())
    }

    pub fn scheme(&self) -> NonceScheme {
        match self {
            TokenNonce::Sequence(_) => NonceScheme::Sequence,
            TokenNonce::Extended(_) => NonceScheme::Extended,
        }
    }

    /// The nonce as it is written in the public token.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            TokenNonce::Sequence(sequence) => sequence.to_le_bytes().to_vec(),
            TokenNonce::Extended(xnonce) => xnonce.to_vec(),
        }
    }
}

/// Source of sequence nonces. Every value is handed out once and the sequence never wraps, so
/// a key must be replaced once it is exhausted.
#[derive(Debug, Default)]
pub struct NonceSequence {
    last: AtomicU64,
}

impl NonceSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue after `last`, for a key whose earlier sequence values are already used.
    pub fn starting_after(last: u64) -> Self {
        Self { last: AtomicU64::new(last) }
    }

    /// Reserve the next sequence value, `None` when exhausted.
    pub fn next(&self) -> Option<u64> {
        self.last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| last.checked_add(1))
            .ok()
            .map(|previous| previous + 1)
    }
}

fn sequence_nonce(sequence: u64) -> Nonce {
    let mut nonce = [0; 12];
    nonce[4..12].copy_from_slice(&sequence.to_le_bytes());
    Nonce::from(nonce)
}

/// Seal `buffer` in place. The last 16 bytes of the buffer receive the tag, everything before
/// them is encrypted.
pub fn seal_in_place(buffer: &mut [u8], aad: &[u8], nonce: &TokenNonce, key: &PrivateKey) -> Result<(), TokenError> {
    if buffer.len() < NETCODE_MAC_BYTES {
        return Err(TokenError::SealFailed);
    }
    let (buffer, buffer_tag) = buffer.split_at_mut(buffer.len() - NETCODE_MAC_BYTES);
    let key = Key::from_slice(key.as_bytes());

    let tag = match nonce {
        TokenNonce::Sequence(sequence) => ChaCha20Poly1305::new(key).encrypt_in_place_detached(&sequence_nonce(*sequence), aad, buffer),
        TokenNonce::Extended(xnonce) => XChaCha20Poly1305::new(key).encrypt_in_place_detached(XNonce::from_slice(xnonce), aad, buffer),
    }
    .map_err(|_| TokenError::SealFailed)?;
    buffer_tag.copy_from_slice(&tag);

    Ok(())
}

/// Open a buffer sealed by [`seal_in_place`]. The tag is checked before anything is decrypted,
/// on failure the buffer is left as it was.
pub fn open_in_place(buffer: &mut [u8], aad: &[u8], nonce: &TokenNonce, key: &PrivateKey) -> Result<(), TokenError> {
    if buffer.len() < NETCODE_MAC_BYTES {
        return Err(TokenError::AuthenticationFailed);
    }
    let (buffer, tag) = buffer.split_at_mut(buffer.len() - NETCODE_MAC_BYTES);
    let tag = Tag::from_slice(tag);
    let key = Key::from_slice(key.as_bytes());

    match nonce {
        TokenNonce::Sequence(sequence) => {
            ChaCha20Poly1305::new(key).decrypt_in_place_detached(&sequence_nonce(*sequence), aad, buffer, tag)
        }
        TokenNonce::Extended(xnonce) => {
            XChaCha20Poly1305::new(key).decrypt_in_place_detached(XNonce::from_slice(xnonce), aad, buffer, tag)
        }
    }
    .map_err(|_| TokenError::AuthenticationFailed)
}

/// Generate a buffer with random bytes using randomness from the operating system.
///
/// The implementation is provided by the `getrandom` crate. Refer to
/// `getrandom` documentation for details.
pub fn generate_random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
