use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use log::{debug, error};

use crate::{
    generate_random_bytes, ConnectToken, IssuanceError, NonceScheme, NonceSequence, PrivateConnectToken, PrivateKey, ServerAddresses,
    TokenError, TokenNonce, NETCODE_CONNECT_TOKEN_BYTES,
};

/// How long a connect token can be used to start a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Seconds(u64),
    /// The token expires at the maximum timestamp.
    Never,
}

impl Expiry {
    pub fn from_seconds(seconds: i64) -> Result<Self, IssuanceError> {
        u64::try_from(seconds).map(Expiry::Seconds).map_err(|_| IssuanceError::NegativeExpiry(seconds))
    }

    /// `u64::MAX` is reserved for [`Expiry::Never`], a finite expiry reaching it is an error.
    pub fn expire_timestamp(&self, create_timestamp: u64) -> Result<u64, IssuanceError> {
        match *self {
            Expiry::Seconds(seconds) => create_timestamp
                .checked_add(seconds)
                .filter(|timestamp| *timestamp != u64::MAX)
                .ok_or(IssuanceError::ExpiryOverflow { create_timestamp, seconds }),
            Expiry::Never => Ok(u64::MAX),
        }
    }
}

/// Issues connect tokens sealed with the private key shared with the dedicated servers.
///
/// Issuing only needs `&self`, an issuer can be shared between threads. With
/// [`NonceScheme::Sequence`] every token takes the next value of the issuer's
/// [`NonceSequence`].
#[derive(Debug)]
pub struct TokenIssuer {
    private_key: PrivateKey,
    scheme: NonceScheme,
    sequence: Arc<NonceSequence>,
}

impl TokenIssuer {
    pub fn new(private_key: PrivateKey, scheme: NonceScheme) -> Self {
        Self {
            private_key,
            scheme,
            sequence: Arc::default(),
        }
    }

    /// Issuer using the sequence scheme with a given sequence, for when the sequence must
    /// outlive the issuer or continue from a previous run.
    pub fn with_sequence(private_key: PrivateKey, sequence: Arc<NonceSequence>) -> Self {
        Self {
            private_key,
            scheme: NonceScheme::Sequence,
            sequence,
        }
    }

    pub fn scheme(&self) -> NonceScheme {
        self.scheme
    }

    pub fn sequence(&self) -> &Arc<NonceSequence> {
        &self.sequence
    }

    fn next_nonce(&self) -> Result<TokenNonce, IssuanceError> {
        match self.scheme {
            NonceScheme::Extended => Ok(TokenNonce::random()),
            NonceScheme::Sequence => self.sequence.next().map(TokenNonce::Sequence).ok_or(IssuanceError::SequenceExhausted),
        }
    }

    /// Issue a serialized token with the current system time.
    pub fn issue(
        &self,
        client_id: u64,
        protocol_id: u64,
        server_addresses: &[SocketAddr],
        expiry: Expiry,
        timeout_seconds: i32,
        user_data: &[u8],
    ) -> Result<[u8; NETCODE_CONNECT_TOKEN_BYTES], IssuanceError> {
        self.issue_at(current_time()?, client_id, protocol_id, server_addresses, expiry, timeout_seconds, user_data)
    }

    /// Issue a token with the current system time without serializing it.
    pub fn issue_token(
        &self,
        client_id: u64,
        protocol_id: u64,
        server_addresses: &[SocketAddr],
        expiry: Expiry,
        timeout_seconds: i32,
        user_data: &[u8],
    ) -> Result<ConnectToken, IssuanceError> {
        self.issue_token_at(current_time()?, client_id, protocol_id, server_addresses, expiry, timeout_seconds, user_data)
    }

    /// Issue a serialized token, `current_time` is the duration since the unix epoch.
    #[allow(clippy::too_many_arguments)]
    pub fn issue_at(
        &self,
        current_time: Duration,
        client_id: u64,
        protocol_id: u64,
        server_addresses: &[SocketAddr],
        expiry: Expiry,
        timeout_seconds: i32,
        user_data: &[u8],
    ) -> Result<[u8; NETCODE_CONNECT_TOKEN_BYTES], IssuanceError> {
        let connect_token =
            self.issue_token_at(current_time, client_id, protocol_id, server_addresses, expiry, timeout_seconds, user_data)?;
        connect_token
            .to_bytes()
            .map_err(log_overflow)
            .map_err(IssuanceError::at("assembling connect token"))
    }

    /// Issue a token without serializing it, for callers that also hand the session keys to the
    /// client. The session keys are fresh random bytes for every token.
    #[allow(clippy::too_many_arguments)]
    pub fn issue_token_at(
        &self,
        current_time: Duration,
        client_id: u64,
        protocol_id: u64,
        server_addresses: &[SocketAddr],
        expiry: Expiry,
        timeout_seconds: i32,
        user_data: &[u8],
    ) -> Result<ConnectToken, IssuanceError> {
        let server_addresses = ServerAddresses::try_from(server_addresses).map_err(IssuanceError::at("validating server addresses"))?;

        let create_timestamp = current_time.as_secs();
        let expire_timestamp = expiry.expire_timestamp(create_timestamp)?;

        let private_token = PrivateConnectToken::build(
            client_id,
            timeout_seconds,
            server_addresses,
            user_data,
            generate_random_bytes(),
            generate_random_bytes(),
        )
        .map_err(IssuanceError::at("building private connect token"))?;

        let nonce = self.next_nonce()?;
        let connect_token = ConnectToken::seal(&private_token, protocol_id, create_timestamp, expire_timestamp, nonce, &self.private_key)
            .map_err(log_overflow)
            .map_err(IssuanceError::at("sealing private connect token"))?;

        debug!(
            "Issued connect token for client {:016x} with protocol id {}, {} server addresses, expire timestamp {}",
            client_id,
            protocol_id,
            connect_token.server_addresses.len(),
            expire_timestamp
        );

        Ok(connect_token)
    }
}

fn current_time() -> Result<Duration, IssuanceError> {
    SystemTime::now().duration_since(UNIX_EPOCH).map_err(|_| IssuanceError::ClockBeforeEpoch)
}

fn log_overflow(err: TokenError) -> TokenError {
    if let TokenError::PrivateBlockOverflow(_) | TokenError::TokenOverflow(_) = err {
        error!("Connect token does not fit its fixed size: {}", err);
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: PrivateKey = PrivateKey::from_bytes(*b"an example very very secret key."); // 32-bytes

    fn server_addresses() -> Vec<SocketAddr> {
        vec!["127.0.0.1:40000".parse().unwrap()]
    }

    #[test]
    fn expiry_from_seconds() {
        assert_eq!(Expiry::from_seconds(45), Ok(Expiry::Seconds(45)));
        assert_eq!(Expiry::from_seconds(0), Ok(Expiry::Seconds(0)));
        assert_eq!(Expiry::from_seconds(-1), Err(IssuanceError::NegativeExpiry(-1)));
        assert_eq!(Expiry::Seconds(45).expire_timestamp(10), Ok(55));
        assert_eq!(Expiry::Seconds(u64::MAX - 11).expire_timestamp(10), Ok(u64::MAX - 1));
        assert_eq!(Expiry::Never.expire_timestamp(10), Ok(u64::MAX));
    }

    #[test]
    fn never_expiring_token() {
        let issuer = TokenIssuer::new(KEY, NonceScheme::Extended);
        let token = issuer
            .issue_token_at(Duration::from_secs(100), 1, 2, &server_addresses(), Expiry::Never, 5, &[])
            .unwrap();
        assert_eq!(token.expire_timestamp, u64::MAX);
        assert!(!token.is_expired(Duration::from_secs(u64::MAX - 1)));
        assert!(token.open_private(&KEY).is_ok());
    }

    #[test]
    fn finite_expiry_never_reaches_never() {
        let issuer = TokenIssuer::new(KEY, NonceScheme::Extended);
        let now = Duration::from_secs(1_700_000_000);

        for seconds in [u64::MAX - 10, u64::MAX - 1_700_000_000, u64::MAX] {
            let result = issuer.issue_at(now, 1, 2, &server_addresses(), Expiry::Seconds(seconds), 5, &[]);
            assert_eq!(
                result,
                Err(IssuanceError::ExpiryOverflow {
                    create_timestamp: 1_700_000_000,
                    seconds
                })
            );
        }

        let finite = issuer
            .issue_token_at(now, 1, 2, &server_addresses(), Expiry::Seconds(u64::MAX - 1_700_000_001), 5, &[])
            .unwrap();
        let never = issuer.issue_token_at(now, 1, 2, &server_addresses(), Expiry::Never, 5, &[]).unwrap();
        assert_eq!(finite.expire_timestamp, u64::MAX - 1);
        assert_ne!(finite.expire_timestamp, never.expire_timestamp);
    }

    #[test]
    fn fresh_session_keys() {
        let issuer = TokenIssuer::new(KEY, NonceScheme::Extended);
        let first = issuer.issue_token_at(Duration::ZERO, 1, 2, &server_addresses(), Expiry::Seconds(30), 5, &[]).unwrap();
        let second = issuer.issue_token_at(Duration::ZERO, 1, 2, &server_addresses(), Expiry::Seconds(30), 5, &[]).unwrap();

        assert_ne!(first.client_to_server_key, second.client_to_server_key);
        assert_ne!(first.server_to_client_key, second.server_to_client_key);
        assert_ne!(first.client_to_server_key, first.server_to_client_key);
        assert_ne!(first.nonce, second.nonce);
    }

    #[test]
    fn sequence_nonces() {
        let sequence = Arc::new(NonceSequence::starting_after(41));
        let issuer = TokenIssuer::with_sequence(KEY, sequence.clone());

        let token = issuer.issue_token_at(Duration::ZERO, 1, 2, &server_addresses(), Expiry::Seconds(30), 5, &[]).unwrap();
        assert_eq!(token.nonce, TokenNonce::Sequence(42));
        assert_eq!(sequence.next(), Some(43));

        let token = issuer.issue_token_at(Duration::ZERO, 1, 2, &server_addresses(), Expiry::Seconds(30), 5, &[]).unwrap();
        assert_eq!(token.nonce, TokenNonce::Sequence(44));
    }

    #[test]
    fn exhausted_sequence() {
        let issuer = TokenIssuer::with_sequence(KEY, Arc::new(NonceSequence::starting_after(u64::MAX)));
        let result = issuer.issue(1, 2, &server_addresses(), Expiry::Seconds(30), 5, &[]);
        assert_eq!(result, Err(IssuanceError::SequenceExhausted));
    }

    #[test]
    fn invalid_requests() {
        let issuer = TokenIssuer::new(KEY, NonceScheme::Extended);

        let result = issuer.issue(1, 2, &[], Expiry::Seconds(30), 5, &[]);
        assert_eq!(
            result,
            Err(IssuanceError::Token {
                stage: "validating server addresses",
                source: TokenError::InvalidAddressCount(0)
            })
        );

        let too_many: Vec<SocketAddr> = (0..9).map(|i| SocketAddr::from(([127, 0, 0, 1], 4000 + i))).collect();
        let result = issuer.issue(1, 2, &too_many, Expiry::Seconds(30), 5, &[]);
        assert!(matches!(
            result,
            Err(IssuanceError::Token {
                source: TokenError::InvalidAddressCount(9),
                ..
            })
        ));

        let result = issuer.issue(1, 2, &server_addresses(), Expiry::Seconds(30), 5, &[0u8; 257]);
        assert!(matches!(
            result,
            Err(IssuanceError::Token {
                source: TokenError::UserDataTooLarge(257),
                ..
            })
        ));
    }
}
