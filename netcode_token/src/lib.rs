//! Netcode token is the issuing side of the netcode connect token: a fixed size, encrypted and
//! signed credential that a client carries to a dedicated server. The server validates the token
//! on its own with the private key it shares with the issuer, without contacting the issuer.
//!
//! Has the following features:
//! - Fixed size tokens of 2048 bytes with an AEAD sealed private part of 1024 bytes
//! - Version, protocol id and expire timestamp bound to the ciphertext as additional data
//! - Fresh session keys for every token
//! - Either a random 24 byte nonce (XChaCha20-Poly1305) or a monotonic sequence nonce
//!   (ChaCha20-Poly1305), never mixed
//!
//! The layout follows the Netcode [standard][standard].
//!
//! [standard]: https://github.com/networkprotocol/netcode/blob/master/STANDARD.md
pub mod address;
mod crypto;
mod error;
mod issuer;
mod layout;
mod private;
mod serialize;
mod token;

pub use address::ServerAddresses;
pub use crypto::{generate_random_bytes, open_in_place, seal_in_place, NonceScheme, NonceSequence, PrivateKey, TokenNonce};
pub use error::{DecodeError, IssuanceError, TokenError};
pub use issuer::{Expiry, TokenIssuer};
pub use layout::{Field, TokenLayout};
pub use private::PrivateConnectToken;
pub use token::ConnectToken;

/// Version tag of tokens sealed with a random extended nonce.
pub const NETCODE_VERSION_INFO: &[u8; NETCODE_VERSION_INFO_BYTES] = b"NETCODE 1.02\0";
/// Version tag of tokens sealed with a sequence nonce.
pub const NETCODE_SEQUENCE_VERSION_INFO: &[u8; NETCODE_VERSION_INFO_BYTES] = b"NETCODE 1.01\0";
pub const NETCODE_VERSION_INFO_BYTES: usize = 13;

const NETCODE_ADDRESS_IPV4: u8 = 1;
const NETCODE_ADDRESS_IPV6: u8 = 2;

/// The maximum number of server addresses a token can carry.
pub const NETCODE_MAX_SERVERS_PER_CONNECT: usize = 8;

/// The number of bytes of a serialized connect token.
pub const NETCODE_CONNECT_TOKEN_BYTES: usize = 2048;
/// The number of bytes of the sealed private part, tag included.
pub const NETCODE_CONNECT_TOKEN_PRIVATE_BYTES: usize = 1024;
/// The number of bytes available to the private part before sealing.
pub const NETCODE_CONNECT_TOKEN_PRIVATE_PLAINTEXT_BYTES: usize = NETCODE_CONNECT_TOKEN_PRIVATE_BYTES - NETCODE_MAC_BYTES;

/// The number of bytes in a private key.
pub const NETCODE_KEY_BYTES: usize = 32;
pub const NETCODE_MAC_BYTES: usize = 16;
/// The number of bytes that an user data can contain in the ConnectToken.
pub const NETCODE_USER_DATA_BYTES: usize = 256;

const NETCODE_CONNECT_TOKEN_XNONCE_BYTES: usize = 24;
const NETCODE_CONNECT_TOKEN_SEQUENCE_BYTES: usize = 8;

const NETCODE_ADDITIONAL_DATA_SIZE: usize = NETCODE_VERSION_INFO_BYTES + 8 + 8;
