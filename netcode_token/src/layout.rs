use std::ops::Range;

use crate::{
    address::MAX_ENCODED_ADDRESSES_BYTES, NonceScheme, NETCODE_CONNECT_TOKEN_BYTES, NETCODE_CONNECT_TOKEN_PRIVATE_BYTES,
    NETCODE_CONNECT_TOKEN_SEQUENCE_BYTES, NETCODE_CONNECT_TOKEN_XNONCE_BYTES, NETCODE_KEY_BYTES, NETCODE_VERSION_INFO_BYTES,
};

/// A fixed position field of the public connect token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub offset: usize,
    pub len: usize,
}

impl Field {
    const fn first(len: usize) -> Self {
        Self { offset: 0, len }
    }

    const fn then(self, len: usize) -> Self {
        Self { offset: self.end(), len }
    }

    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}

/// Positions of the fixed fields of a public connect token:
///
/// ```text
/// [version info] (13 bytes)
/// [protocol id] (uint64)
/// [create timestamp] (uint64)
/// [expire timestamp] (uint64)
/// [nonce] (24 bytes extended nonce, or uint64 sequence)
/// [encrypted private connect token] (1024 bytes)
/// [timeout seconds] (int32)
/// -- trailer, variable --
/// [server addresses]
/// [client to server key] (32 bytes)
/// [server to client key] (32 bytes)
/// <zero pad to 2048 bytes>
/// ```
///
/// Encoding and decoding both go through these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLayout {
    pub version_info: Field,
    pub protocol_id: Field,
    pub create_timestamp: Field,
    pub expire_timestamp: Field,
    pub nonce: Field,
    pub private_data: Field,
    pub timeout_seconds: Field,
}

impl TokenLayout {
    pub const EXTENDED: TokenLayout = TokenLayout::with_nonce(NETCODE_CONNECT_TOKEN_XNONCE_BYTES);
    pub const SEQUENCE: TokenLayout = TokenLayout::with_nonce(NETCODE_CONNECT_TOKEN_SEQUENCE_BYTES);

    const fn with_nonce(nonce_bytes: usize) -> Self {
        let version_info = Field::first(NETCODE_VERSION_INFO_BYTES);
        let protocol_id = version_info.then(8);
        let create_timestamp = protocol_id.then(8);
        let expire_timestamp = create_timestamp.then(8);
        let nonce = expire_timestamp.then(nonce_bytes);
        let private_data = nonce.then(NETCODE_CONNECT_TOKEN_PRIVATE_BYTES);
        let timeout_seconds = private_data.then(4);

        Self {
            version_info,
            protocol_id,
            create_timestamp,
            expire_timestamp,
            nonce,
            private_data,
            timeout_seconds,
        }
    }

    pub const fn for_scheme(scheme: NonceScheme) -> &'static TokenLayout {
        match scheme {
            NonceScheme::Extended => &Self::EXTENDED,
            NonceScheme::Sequence => &Self::SEQUENCE,
        }
    }

    /// Where the server addresses start.
    pub const fn trailer_offset(&self) -> usize {
        self.timeout_seconds.end()
    }

    pub const fn trailer_capacity(&self) -> usize {
        NETCODE_CONNECT_TOKEN_BYTES - self.trailer_offset()
    }
}

const MAX_TRAILER_BYTES: usize = MAX_ENCODED_ADDRESSES_BYTES + 2 * NETCODE_KEY_BYTES;
const _: () = assert!(TokenLayout::EXTENDED.trailer_capacity() >= MAX_TRAILER_BYTES);
const _: () = assert!(TokenLayout::SEQUENCE.trailer_capacity() >= MAX_TRAILER_BYTES);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_layout_offsets() {
        let layout = TokenLayout::EXTENDED;
        assert_eq!(layout.version_info.range(), 0..13);
        assert_eq!(layout.protocol_id.range(), 13..21);
        assert_eq!(layout.create_timestamp.range(), 21..29);
        assert_eq!(layout.expire_timestamp.range(), 29..37);
        assert_eq!(layout.nonce.range(), 37..61);
        assert_eq!(layout.private_data.range(), 61..1085);
        assert_eq!(layout.timeout_seconds.range(), 1085..1089);
        assert_eq!(layout.trailer_offset(), 1089);
    }

    #[test]
    fn sequence_layout_shifts_by_sixteen() {
        let extended = TokenLayout::EXTENDED;
        let sequence = TokenLayout::SEQUENCE;
        assert_eq!(sequence.nonce.range(), 37..45);
        assert_eq!(sequence.private_data.offset + 16, extended.private_data.offset);
        assert_eq!(sequence.timeout_seconds.offset + 16, extended.timeout_seconds.offset);
        assert_eq!(sequence.trailer_offset() + 16, extended.trailer_offset());
        assert_eq!(TokenLayout::for_scheme(NonceScheme::Sequence), &sequence);
    }
}
