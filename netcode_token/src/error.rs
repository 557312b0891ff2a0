use std::{error, fmt, io};

use crate::{
    NETCODE_CONNECT_TOKEN_BYTES, NETCODE_CONNECT_TOKEN_PRIVATE_PLAINTEXT_BYTES, NETCODE_MAX_SERVERS_PER_CONNECT, NETCODE_USER_DATA_BYTES,
};

/// Errors from encoding, sealing, opening or decoding a connect token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// The address list is empty or has more than 8 entries.
    InvalidAddressCount(usize),
    InvalidAddressType(u8),
    /// The buffer ended before the declared content.
    TruncatedBuffer,
    UserDataTooLarge(usize),
    /// The serialized private part does not fit before the tag.
    PrivateBlockOverflow(usize),
    /// The serialized public part does not fit in the token.
    TokenOverflow(usize),
    /// The writer given to [`ConnectToken::write`](crate::ConnectToken::write) failed.
    WriteFailed(io::ErrorKind),
    SealFailed,
    AuthenticationFailed,
    Decode(DecodeError),
}

/// A received token that is rejected before any decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    InvalidLength(usize),
    InvalidVersion,
    NonZeroPadding,
}

/// Errors from [`TokenIssuer`](crate::TokenIssuer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceError {
    /// Expiry must be a non-negative number of seconds, use `Expiry::Never` for no expiry.
    NegativeExpiry(i64),
    /// The expire timestamp does not fit before the never expiring timestamp.
    ExpiryOverflow { create_timestamp: u64, seconds: u64 },
    /// The nonce sequence reached its end, the private key must be replaced.
    SequenceExhausted,
    ClockBeforeEpoch,
    Token { stage: &'static str, source: TokenError },
}

impl fmt::Display for TokenError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use TokenError::*;

        match *self {
            InvalidAddressCount(count) => write!(
                fmt,
                "connect token must have between 1 and {} server addresses, got {}",
                NETCODE_MAX_SERVERS_PER_CONNECT, count
            ),
            InvalidAddressType(tag) => write!(fmt, "unknown server address type {}", tag),
            TruncatedBuffer => write!(fmt, "buffer is too small for its declared content"),
            UserDataTooLarge(len) => write!(fmt, "user data has {} bytes, the limit is {}", len, NETCODE_USER_DATA_BYTES),
            PrivateBlockOverflow(len) => write!(
                fmt,
                "private connect token has {} bytes, the limit is {}",
                len, NETCODE_CONNECT_TOKEN_PRIVATE_PLAINTEXT_BYTES
            ),
            TokenOverflow(len) => write!(fmt, "connect token has {} bytes, the limit is {}", len, NETCODE_CONNECT_TOKEN_BYTES),
            WriteFailed(kind) => write!(fmt, "failed to write connect token: {}", kind),
            SealFailed => write!(fmt, "failed to seal the private connect token"),
            AuthenticationFailed => write!(fmt, "private connect token failed authentication"),
            Decode(ref err) => write!(fmt, "{}", err),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use DecodeError::*;

        match *self {
            InvalidLength(len) => write!(fmt, "connect token has {} bytes, expected {}", len, NETCODE_CONNECT_TOKEN_BYTES),
            InvalidVersion => write!(fmt, "invalid version info"),
            NonZeroPadding => write!(fmt, "connect token padding is not zeroed"),
        }
    }
}

impl fmt::Display for IssuanceError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use IssuanceError::*;

        match *self {
            NegativeExpiry(seconds) => write!(fmt, "expiry must not be negative, got {} seconds", seconds),
            ExpiryOverflow {
                create_timestamp,
                seconds,
            } => write!(fmt, "expiry of {} seconds from timestamp {} overflows", seconds, create_timestamp),
            SequenceExhausted => write!(fmt, "connect token sequence is exhausted"),
            ClockBeforeEpoch => write!(fmt, "system clock is before the unix epoch"),
            Token { stage, ref source } => write!(fmt, "failed {}: {}", stage, source),
        }
    }
}

impl error::Error for TokenError {}

impl error::Error for DecodeError {}

impl error::Error for IssuanceError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            IssuanceError::Token { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DecodeError> for TokenError {
    fn from(inner: DecodeError) -> Self {
        TokenError::Decode(inner)
    }
}

// Tokens are only read from in-memory slices, the only failure is running out of bytes.
impl From<io::Error> for TokenError {
    fn from(_: io::Error) -> Self {
        TokenError::TruncatedBuffer
    }
}

impl IssuanceError {
    pub(crate) fn at(stage: &'static str) -> impl FnOnce(TokenError) -> Self {
        move |source| IssuanceError::Token { stage, source }
    }
}
