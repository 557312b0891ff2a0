use std::{
    io::{self, Cursor},
    time::Duration,
};

use crate::{
    address::{read_server_addresses, write_server_addresses},
    serialize::*,
    DecodeError, Field, NonceScheme, PrivateConnectToken, PrivateKey, ServerAddresses, TokenError, TokenLayout, TokenNonce,
    NETCODE_CONNECT_TOKEN_BYTES, NETCODE_CONNECT_TOKEN_PRIVATE_BYTES, NETCODE_KEY_BYTES, NETCODE_VERSION_INFO_BYTES,
};

/// A public connect token that the client receives to start connecting to the server.
/// How the client receives ConnectToken is up to you, could be from a matchmaking
/// system or from a call to a REST API as an example.
///
/// The version info is not stored, it follows from the nonce scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectToken {
    pub protocol_id: u64,
    pub create_timestamp: u64,
    pub expire_timestamp: u64,
    pub nonce: TokenNonce,
    pub private_data: [u8; NETCODE_CONNECT_TOKEN_PRIVATE_BYTES],
    pub timeout_seconds: i32,
    pub server_addresses: ServerAddresses,
    pub client_to_server_key: [u8; NETCODE_KEY_BYTES],
    pub server_to_client_key: [u8; NETCODE_KEY_BYTES],
}

impl ConnectToken {
    /// Seal the private token and copy its public fields next to it. The private key and the
    /// protocol id must be the same used by the servers.
    pub fn seal(
        private_token: &PrivateConnectToken,
        protocol_id: u64,
        create_timestamp: u64,
        expire_timestamp: u64,
        nonce: TokenNonce,
        private_key: &PrivateKey,
    ) -> Result<Self, TokenError> {
        let private_data = private_token.seal(protocol_id, expire_timestamp, &nonce, private_key)?;

        Ok(Self {
            protocol_id,
            create_timestamp,
            expire_timestamp,
            nonce,
            private_data,
            timeout_seconds: private_token.timeout_seconds,
            server_addresses: private_token.server_addresses.clone(),
            client_to_server_key: private_token.client_to_server_key,
            server_to_client_key: private_token.server_to_client_key,
        })
    }

    pub fn version_info(&self) -> &'static [u8; NETCODE_VERSION_INFO_BYTES] {
        self.nonce.scheme().version_info()
    }

    fn layout(&self) -> &'static TokenLayout {
        TokenLayout::for_scheme(self.nonce.scheme())
    }

    /// Serialize into the fixed size token, unused bytes are zero.
    pub fn to_bytes(&self) -> Result<[u8; NETCODE_CONNECT_TOKEN_BYTES], TokenError> {
        let layout = self.layout();
        let mut buffer = [0u8; NETCODE_CONNECT_TOKEN_BYTES];

        buffer[layout.version_info.range()].copy_from_slice(self.version_info());
        buffer[layout.protocol_id.range()].copy_from_slice(&self.protocol_id.to_le_bytes());
        buffer[layout.create_timestamp.range()].copy_from_slice(&self.create_timestamp.to_le_bytes());
        buffer[layout.expire_timestamp.range()].copy_from_slice(&self.expire_timestamp.to_le_bytes());
        buffer[layout.nonce.range()].copy_from_slice(&self.nonce.to_bytes());
        buffer[layout.private_data.range()].copy_from_slice(&self.private_data);
        buffer[layout.timeout_seconds.range()].copy_from_slice(&self.timeout_seconds.to_le_bytes());

        let mut trailer = Vec::with_capacity(layout.trailer_capacity());
        self.write_trailer(&mut trailer)?;
        if trailer.len() > layout.trailer_capacity() {
            return Err(TokenError::TokenOverflow(layout.trailer_offset() + trailer.len()));
        }
        buffer[layout.trailer_offset()..layout.trailer_offset() + trailer.len()].copy_from_slice(&trailer);

        Ok(buffer)
    }

    pub fn write(&self, writer: &mut impl io::Write) -> Result<(), TokenError> {
        writer.write_all(&self.to_bytes()?).map_err(|err| TokenError::WriteFailed(err.kind()))
    }

    fn write_trailer(&self, writer: &mut impl io::Write) -> Result<(), io::Error> {
        write_server_addresses(writer, &self.server_addresses)?;
        writer.write_all(&self.client_to_server_key)?;
        writer.write_all(&self.server_to_client_key)?;

        Ok(())
    }

    /// Parse a received token. Anything but an exact, well formed token is rejected.
    pub fn parse(buffer: &[u8]) -> Result<Self, TokenError> {
        if buffer.len() != NETCODE_CONNECT_TOKEN_BYTES {
            return Err(DecodeError::InvalidLength(buffer.len()).into());
        }

        let scheme = NonceScheme::from_version_info(&buffer[..NETCODE_VERSION_INFO_BYTES]).ok_or(DecodeError::InvalidVersion)?;
        let layout = TokenLayout::for_scheme(scheme);

        let nonce = match scheme {
            NonceScheme::Extended => TokenNonce::Extended(field(buffer, layout.nonce)),
            NonceScheme::Sequence => TokenNonce::Sequence(u64::from_le_bytes(field(buffer, layout.nonce))),
        };

        let src = &mut Cursor::new(&buffer[layout.trailer_offset()..]);
        let server_addresses = read_server_addresses(src)?;
        let client_to_server_key = read_bytes(src)?;
        let server_to_client_key = read_bytes(src)?;

        let trailer_end = src.position() as usize;
        if src.get_ref()[trailer_end..].iter().any(|b| *b != 0) {
            return Err(DecodeError::NonZeroPadding.into());
        }

        Ok(Self {
            protocol_id: u64::from_le_bytes(field(buffer, layout.protocol_id)),
            create_timestamp: u64::from_le_bytes(field(buffer, layout.create_timestamp)),
            expire_timestamp: u64::from_le_bytes(field(buffer, layout.expire_timestamp)),
            nonce,
            private_data: field(buffer, layout.private_data),
            timeout_seconds: i32::from_le_bytes(field(buffer, layout.timeout_seconds)),
            server_addresses,
            client_to_server_key,
            server_to_client_key,
        })
    }

    /// Open the private part with the fields it was sealed with.
    pub fn open_private(&self, private_key: &PrivateKey) -> Result<PrivateConnectToken, TokenError> {
        PrivateConnectToken::open(&self.private_data, self.protocol_id, self.expire_timestamp, &self.nonce, private_key)
    }

    pub fn is_expired(&self, current_time: Duration) -> bool {
        current_time.as_secs() >= self.expire_timestamp
    }
}

fn field<const N: usize>(buffer: &[u8], field: Field) -> [u8; N] {
    debug_assert_eq!(field.len, N);
    let mut data = [0u8; N];
    data.copy_from_slice(&buffer[field.range()]);
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate_random_bytes;
    use std::net::SocketAddr;

    const KEY: PrivateKey = PrivateKey::from_bytes(*b"an example very very secret key."); // 32-bytes

    fn connect_token(server_addresses: Vec<SocketAddr>, nonce: TokenNonce) -> ConnectToken {
        let private_token = PrivateConnectToken::build(
            4,
            5,
            ServerAddresses::new(server_addresses).unwrap(),
            &generate_random_bytes::<256>(),
            generate_random_bytes(),
            generate_random_bytes(),
        )
        .unwrap();
        ConnectToken::seal(&private_token, 2, 10, 13, nonce, &KEY).unwrap()
    }

    fn addresses(count: usize) -> Vec<SocketAddr> {
        (0..count).map(|i| format!("[::{}]:{}", i + 1, 4000 + i).parse().unwrap()).collect()
    }

    #[test]
    fn connect_token_serialization() {
        for nonce in [TokenNonce::random(), TokenNonce::Sequence(9)] {
            let token = connect_token(vec!["127.0.0.1:8080".parse().unwrap(), "127.0.0.2:3000".parse().unwrap()], nonce);
            let buffer = token.to_bytes().unwrap();
            let result = ConnectToken::parse(&buffer).unwrap();
            assert_eq!(token, result);

            let private = result.open_private(&KEY).unwrap();
            assert_eq!(private.client_id, 4);
            assert_eq!(private.timeout_seconds, token.timeout_seconds);
            assert_eq!(private.server_addresses, token.server_addresses);
            assert_eq!(private.client_to_server_key, token.client_to_server_key);
            assert_eq!(private.server_to_client_key, token.server_to_client_key);
        }
    }

    #[test]
    fn fixed_header_offsets() {
        let token = connect_token(addresses(1), TokenNonce::Extended([7; 24]));
        let buffer = token.to_bytes().unwrap();
        assert_eq!(&buffer[0..13], b"NETCODE 1.02\0");
        assert_eq!(&buffer[13..21], &2u64.to_le_bytes());
        assert_eq!(&buffer[21..29], &10u64.to_le_bytes());
        assert_eq!(&buffer[29..37], &13u64.to_le_bytes());
        assert_eq!(&buffer[37..61], &[7; 24]);
        assert_eq!(&buffer[61..1085], &token.private_data[..]);
        assert_eq!(&buffer[1085..1089], &5i32.to_le_bytes());
        assert_eq!(&buffer[1089..1093], &1u32.to_le_bytes());

        let token = connect_token(addresses(1), TokenNonce::Sequence(3));
        let buffer = token.to_bytes().unwrap();
        assert_eq!(&buffer[0..13], b"NETCODE 1.01\0");
        assert_eq!(&buffer[37..45], &3u64.to_le_bytes());
        assert_eq!(&buffer[45..1069], &token.private_data[..]);
    }

    #[test]
    fn token_size_is_fixed() {
        for count in [1, 8] {
            let token = connect_token(addresses(count), TokenNonce::random());
            let mut written = vec![];
            token.write(&mut written).unwrap();
            assert_eq!(written.len(), NETCODE_CONNECT_TOKEN_BYTES);

            let trailer_end = TokenLayout::EXTENDED.trailer_offset() + token.server_addresses.encoded_len() + 2 * NETCODE_KEY_BYTES;
            assert!(written[trailer_end..].iter().all(|b| *b == 0));
        }
    }

    #[test]
    fn write_reports_writer_errors() {
        let token = connect_token(addresses(1), TokenNonce::random());
        let mut small = [0u8; 16];
        let result = token.write(&mut &mut small[..]);
        assert_eq!(result, Err(TokenError::WriteFailed(io::ErrorKind::WriteZero)));
    }

    #[test]
    fn parse_rejects_malformed_tokens() {
        let buffer = connect_token(addresses(2), TokenNonce::random()).to_bytes().unwrap();

        assert_eq!(ConnectToken::parse(&buffer[..2047]), Err(TokenError::Decode(DecodeError::InvalidLength(2047))));
        let mut longer = buffer.to_vec();
        longer.push(0);
        assert_eq!(ConnectToken::parse(&longer), Err(TokenError::Decode(DecodeError::InvalidLength(2049))));

        let mut wrong_version = buffer;
        wrong_version[11] = b'3';
        assert_eq!(ConnectToken::parse(&wrong_version), Err(TokenError::Decode(DecodeError::InvalidVersion)));

        let mut dirty_padding = buffer;
        dirty_padding[NETCODE_CONNECT_TOKEN_BYTES - 1] = 1;
        assert_eq!(ConnectToken::parse(&dirty_padding), Err(TokenError::Decode(DecodeError::NonZeroPadding)));

        let mut no_addresses = buffer;
        let trailer_offset = TokenLayout::EXTENDED.trailer_offset();
        no_addresses[trailer_offset..trailer_offset + 4].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(ConnectToken::parse(&no_addresses), Err(TokenError::InvalidAddressCount(0)));
    }

    #[test]
    fn tampered_header_fails_to_open() {
        let buffer = connect_token(addresses(1), TokenNonce::random()).to_bytes().unwrap();
        let layout = TokenLayout::EXTENDED;

        for offset in [layout.protocol_id.offset, layout.expire_timestamp.offset, layout.nonce.offset, layout.private_data.offset] {
            let mut tampered = buffer;
            tampered[offset] ^= 0x01;
            let token = ConnectToken::parse(&tampered).unwrap();
            assert_eq!(token.open_private(&KEY), Err(TokenError::AuthenticationFailed));
        }

        let mut swapped_version = buffer;
        swapped_version[..13].copy_from_slice(NonceScheme::Sequence.version_info());
        assert!(ConnectToken::parse(&swapped_version).map_or(true, |token| token.open_private(&KEY).is_err()));
    }

    #[test]
    fn expiry() {
        let token = connect_token(addresses(1), TokenNonce::random());
        assert!(!token.is_expired(Duration::from_secs(12)));
        assert!(token.is_expired(Duration::from_secs(13)));
    }
}
