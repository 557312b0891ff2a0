use std::io::{self, Cursor};

use crate::{
    address::{read_server_addresses, write_server_addresses},
    crypto::{open_in_place, seal_in_place},
    serialize::*,
    PrivateKey, ServerAddresses, TokenError, TokenNonce, NETCODE_ADDITIONAL_DATA_SIZE, NETCODE_CONNECT_TOKEN_PRIVATE_BYTES,
    NETCODE_CONNECT_TOKEN_PRIVATE_PLAINTEXT_BYTES, NETCODE_KEY_BYTES, NETCODE_USER_DATA_BYTES, NETCODE_VERSION_INFO_BYTES,
};

/*
   The private part of the connect token, encrypted and signed with the private key shared between
   the issuer and the dedicated servers. Before encryption it has the following binary format:

       [client id] (uint64) // globally unique identifier for an authenticated client
       [timeout seconds] (int32) // timeout in seconds. negative values disable timeout (dev only)
       [server addresses] // see the address module
       [client to server key] (32 bytes)
       [server to client key] (32 bytes)
       [user data] (256 bytes) // user defined data specific to this protocol id
       <zero pad to 1008 bytes>

   Sealing appends the 16 bytes tag, so the sealed part always takes 1024 bytes.
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateConnectToken {
    pub client_id: u64,
    pub timeout_seconds: i32,
    pub server_addresses: ServerAddresses,
    pub client_to_server_key: [u8; NETCODE_KEY_BYTES],
    pub server_to_client_key: [u8; NETCODE_KEY_BYTES],
    pub user_data: [u8; NETCODE_USER_DATA_BYTES],
}

impl PrivateConnectToken {
    /// User data shorter than 256 bytes is zero padded, longer user data is rejected.
    pub fn build(
        client_id: u64,
        timeout_seconds: i32,
        server_addresses: ServerAddresses,
        user_data: &[u8],
        client_to_server_key: [u8; NETCODE_KEY_BYTES],
        server_to_client_key: [u8; NETCODE_KEY_BYTES],
    ) -> Result<Self, TokenError> {
        if user_data.len() > NETCODE_USER_DATA_BYTES {
            return Err(TokenError::UserDataTooLarge(user_data.len()));
        }
        let mut padded_user_data = [0u8; NETCODE_USER_DATA_BYTES];
        padded_user_data[..user_data.len()].copy_from_slice(user_data);

        Ok(Self {
            client_id,
            timeout_seconds,
            server_addresses,
            client_to_server_key,
            server_to_client_key,
            user_data: padded_user_data,
        })
    }

    fn write(&self, writer: &mut impl io::Write) -> Result<(), io::Error> {
        writer.write_all(&self.client_id.to_le_bytes())?;
        writer.write_all(&self.timeout_seconds.to_le_bytes())?;
        write_server_addresses(writer, &self.server_addresses)?;
        writer.write_all(&self.client_to_server_key)?;
        writer.write_all(&self.server_to_client_key)?;
        writer.write_all(&self.user_data)?;

        Ok(())
    }

    fn read(src: &mut Cursor<&[u8]>) -> Result<Self, TokenError> {
        let client_id = read_u64(src)?;
        let timeout_seconds = read_i32(src)?;
        let server_addresses = read_server_addresses(src)?;
        let client_to_server_key = read_bytes(src)?;
        let server_to_client_key = read_bytes(src)?;
        let user_data = read_bytes(src)?;

        Ok(Self {
            client_id,
            timeout_seconds,
            server_addresses,
            client_to_server_key,
            server_to_client_key,
            user_data,
        })
    }

    /// Serialize into the zero padded plaintext block.
    pub fn serialize(&self) -> Result<[u8; NETCODE_CONNECT_TOKEN_PRIVATE_PLAINTEXT_BYTES], TokenError> {
        let mut written = Vec::with_capacity(NETCODE_CONNECT_TOKEN_PRIVATE_PLAINTEXT_BYTES);
        self.write(&mut written)?;
        if written.len() > NETCODE_CONNECT_TOKEN_PRIVATE_PLAINTEXT_BYTES {
            return Err(TokenError::PrivateBlockOverflow(written.len()));
        }

        let mut buffer = [0u8; NETCODE_CONNECT_TOKEN_PRIVATE_PLAINTEXT_BYTES];
        buffer[..written.len()].copy_from_slice(&written);
        Ok(buffer)
    }

    pub fn deserialize(buffer: &[u8; NETCODE_CONNECT_TOKEN_PRIVATE_PLAINTEXT_BYTES]) -> Result<Self, TokenError> {
        Self::read(&mut Cursor::new(&buffer[..]))
    }

    /// Serialize and seal, binding the version, protocol id and expire timestamp to the result.
    pub fn seal(
        &self,
        protocol_id: u64,
        expire_timestamp: u64,
        nonce: &TokenNonce,
        private_key: &PrivateKey,
    ) -> Result<[u8; NETCODE_CONNECT_TOKEN_PRIVATE_BYTES], TokenError> {
        let mut buffer = [0u8; NETCODE_CONNECT_TOKEN_PRIVATE_BYTES];
        buffer[..NETCODE_CONNECT_TOKEN_PRIVATE_PLAINTEXT_BYTES].copy_from_slice(&self.serialize()?);

        let aad = additional_data(nonce, protocol_id, expire_timestamp);
        seal_in_place(&mut buffer, &aad, nonce, private_key)?;

        Ok(buffer)
    }

    pub fn open(
        buffer: &[u8; NETCODE_CONNECT_TOKEN_PRIVATE_BYTES],
        protocol_id: u64,
        expire_timestamp: u64,
        nonce: &TokenNonce,
        private_key: &PrivateKey,
    ) -> Result<Self, TokenError> {
        let aad = additional_data(nonce, protocol_id, expire_timestamp);

        let mut temp_buffer = *buffer;
        open_in_place(&mut temp_buffer, &aad, nonce, private_key)?;

        Self::read(&mut Cursor::new(&temp_buffer[..NETCODE_CONNECT_TOKEN_PRIVATE_PLAINTEXT_BYTES]))
    }
}

fn additional_data(nonce: &TokenNonce, protocol_id: u64, expire_timestamp: u64) -> [u8; NETCODE_ADDITIONAL_DATA_SIZE] {
    let mut buffer = [0; NETCODE_ADDITIONAL_DATA_SIZE];
    buffer[..NETCODE_VERSION_INFO_BYTES].copy_from_slice(nonce.scheme().version_info());
    buffer[NETCODE_VERSION_INFO_BYTES..NETCODE_VERSION_INFO_BYTES + 8].copy_from_slice(&protocol_id.to_le_bytes());
    buffer[NETCODE_VERSION_INFO_BYTES + 8..].copy_from_slice(&expire_timestamp.to_le_bytes());

    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{generate_random_bytes, NETCODE_VERSION_INFO};
    use std::net::SocketAddr;

    fn private_token() -> PrivateConnectToken {
        let hosts: Vec<SocketAddr> = vec!["127.0.0.1:8080".parse().unwrap(), "[::1]:3000".parse().unwrap()];
        PrivateConnectToken::build(
            1,
            5,
            ServerAddresses::new(hosts).unwrap(),
            b"some user data",
            generate_random_bytes(),
            generate_random_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn private_connect_token_serialization() {
        let token = private_token();
        let buffer = token.serialize().unwrap();
        assert_eq!(&buffer[..8], &1u64.to_le_bytes());
        assert_eq!(&buffer[8..12], &5i32.to_le_bytes());

        let result = PrivateConnectToken::deserialize(&buffer).unwrap();
        assert_eq!(token, result);
        assert_eq!(&result.user_data[..14], b"some user data");
        assert!(result.user_data[14..].iter().all(|b| *b == 0));
    }

    #[test]
    fn serialized_tail_is_zero() {
        let token = private_token();
        let buffer = token.serialize().unwrap();
        let used = 8 + 4 + token.server_addresses.encoded_len() + 2 * NETCODE_KEY_BYTES + NETCODE_USER_DATA_BYTES;
        assert!(buffer[used..].iter().all(|b| *b == 0));
    }

    #[test]
    fn user_data_too_large() {
        let hosts = ServerAddresses::new(vec!["127.0.0.1:8080".parse().unwrap()]).unwrap();
        let user_data = [1u8; NETCODE_USER_DATA_BYTES + 1];
        let result = PrivateConnectToken::build(1, 5, hosts, &user_data, [0; 32], [0; 32]);
        assert_eq!(result, Err(TokenError::UserDataTooLarge(NETCODE_USER_DATA_BYTES + 1)));
    }

    #[test]
    fn private_connect_token_seal_open() {
        let token = private_token();
        let key = PrivateKey::from_bytes(*b"an example very very secret key."); // 32-bytes
        let protocol_id = 12;
        let expire_timestamp = 0;

        for nonce in [TokenNonce::random(), TokenNonce::Sequence(1)] {
            let buffer = token.seal(protocol_id, expire_timestamp, &nonce, &key).unwrap();
            let result = PrivateConnectToken::open(&buffer, protocol_id, expire_timestamp, &nonce, &key).unwrap();
            assert_eq!(token, result);

            assert_eq!(
                PrivateConnectToken::open(&buffer, protocol_id + 1, expire_timestamp, &nonce, &key),
                Err(TokenError::AuthenticationFailed)
            );
            assert_eq!(
                PrivateConnectToken::open(&buffer, protocol_id, expire_timestamp + 1, &nonce, &key),
                Err(TokenError::AuthenticationFailed)
            );
        }
    }

    #[test]
    fn additional_data_layout() {
        let aad = additional_data(&TokenNonce::random(), 0x12341561, 45);
        assert_eq!(&aad[..13], NETCODE_VERSION_INFO);
        assert_eq!(&aad[13..21], &0x12341561u64.to_le_bytes());
        assert_eq!(&aad[21..29], &45u64.to_le_bytes());
    }
}
