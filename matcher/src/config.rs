use std::{
    env, error, fmt, fs, io,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use netcode_token::{Expiry, NonceScheme, PrivateKey, NETCODE_KEY_BYTES};

pub const BIND_ADDRESS_VAR: &str = "MATCHER_BIND";
pub const SERVER_ADDRESSES_VAR: &str = "MATCHER_SERVER_ADDRESSES";
pub const TIMEOUT_SECONDS_VAR: &str = "MATCHER_TIMEOUT_SECONDS";
pub const EXPIRY_SECONDS_VAR: &str = "MATCHER_EXPIRY_SECONDS";
pub const NONCE_SCHEME_VAR: &str = "MATCHER_NONCE_SCHEME";
pub const PRIVATE_KEY_VAR: &str = "MATCHER_PRIVATE_KEY";
pub const PRIVATE_KEY_FILE_VAR: &str = "MATCHER_PRIVATE_KEY_FILE";
pub const TLS_CERT_VAR: &str = "MATCHER_TLS_CERT";
pub const TLS_KEY_VAR: &str = "MATCHER_TLS_KEY";

/// Policy used for every token the matcher issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherConfig {
    pub bind_address: SocketAddr,
    pub server_addresses: Vec<SocketAddr>,
    /// Timeout in seconds of the game connection, negative values disable it.
    pub timeout_seconds: i32,
    pub expiry: Expiry,
    pub nonce_scheme: NonceScheme,
    /// Serve over HTTPS. Without it the session keys travel in cleartext, TLS must then be
    /// terminated in front of the matcher.
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the certificate file, must be DER encoded
    pub cert: PathBuf,
    /// Path to the certificate-key file, must be DER encoded
    pub key: PathBuf,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8081)),
            server_addresses: vec![SocketAddr::from(([127, 0, 0, 1], 40000))],
            timeout_seconds: 5,
            expiry: Expiry::Seconds(45),
            nonce_scheme: NonceScheme::Extended,
            tls: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid { var: &'static str, value: String },
    MissingPrivateKey,
    InvalidPrivateKey { source: &'static str },
    IoError(io::Error),
    Tls(rustls::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use ConfigError::*;

        match *self {
            Invalid { var, ref value } => write!(fmt, "invalid value for {}: {:?}", var, value),
            MissingPrivateKey => write!(fmt, "private key must be set with {} or {}", PRIVATE_KEY_VAR, PRIVATE_KEY_FILE_VAR),
            InvalidPrivateKey { source } => write!(fmt, "private key from {} must have {} bytes", source, NETCODE_KEY_BYTES),
            IoError(ref err) => write!(fmt, "failed to read file: {}", err),
            Tls(ref err) => write!(fmt, "invalid tls configuration: {}", err),
        }
    }
}

impl error::Error for ConfigError {}

impl From<rustls::Error> for ConfigError {
    fn from(inner: rustls::Error) -> Self {
        ConfigError::Tls(inner)
    }
}

impl From<io::Error> for ConfigError {
    fn from(inner: io::Error) -> Self {
        ConfigError::IoError(inner)
    }
}

impl MatcherConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|var| env::var(var).ok())
    }

    /// Start from the defaults and override every variable that is set.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = var(BIND_ADDRESS_VAR) {
            config.bind_address = parse(BIND_ADDRESS_VAR, &value)?;
        }
        if let Some(value) = var(SERVER_ADDRESSES_VAR) {
            config.server_addresses = value
                .split(',')
                .map(|address| parse(SERVER_ADDRESSES_VAR, address))
                .collect::<Result<_, _>>()?;
        }
        if let Some(value) = var(TIMEOUT_SECONDS_VAR) {
            config.timeout_seconds = parse(TIMEOUT_SECONDS_VAR, &value)?;
        }
        if let Some(value) = var(EXPIRY_SECONDS_VAR) {
            config.expiry = parse_expiry(&value)?;
        }
        if let Some(value) = var(NONCE_SCHEME_VAR) {
            config.nonce_scheme = match value.trim() {
                "extended" => NonceScheme::Extended,
                "sequence" => NonceScheme::Sequence,
                _ => return Err(invalid(NONCE_SCHEME_VAR, &value)),
            };
        }
        config.tls = match (var(TLS_CERT_VAR), var(TLS_KEY_VAR)) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(invalid(TLS_KEY_VAR, "")),
            (None, Some(_)) => return Err(invalid(TLS_CERT_VAR, "")),
        };

        Ok(config)
    }
}

fn invalid(var: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid { var, value: value.to_owned() }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(var, value))
}

fn parse_expiry(value: &str) -> Result<Expiry, ConfigError> {
    if value.trim() == "never" {
        return Ok(Expiry::Never);
    }
    let seconds: i64 = parse(EXPIRY_SECONDS_VAR, value)?;
    Expiry::from_seconds(seconds).map_err(|_| invalid(EXPIRY_SECONDS_VAR, value))
}

impl TlsConfig {
    pub fn server_config(&self) -> Result<rustls::ServerConfig, ConfigError> {
        let cert = rustls::Certificate(fs::read(&self.cert)?);
        let key = rustls::PrivateKey(fs::read(&self.key)?);

        let tls_config = rustls::ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(vec![cert], key)?;

        Ok(tls_config)
    }
}

/// Load the private key from the environment, as base64 text or from a file.
pub fn private_key_from_env() -> Result<PrivateKey, ConfigError> {
    private_key_from_vars(|var| env::var(var).ok())
}

pub fn private_key_from_vars(var: impl Fn(&str) -> Option<String>) -> Result<PrivateKey, ConfigError> {
    if let Some(value) = var(PRIVATE_KEY_VAR) {
        return decode_private_key(value.trim().as_bytes(), PRIVATE_KEY_VAR);
    }
    if let Some(path) = var(PRIVATE_KEY_FILE_VAR) {
        return read_private_key_file(Path::new(&path));
    }

    Err(ConfigError::MissingPrivateKey)
}

/// The file holds either the raw key or its base64 text.
fn read_private_key_file(path: &Path) -> Result<PrivateKey, ConfigError> {
    let content = fs::read(path)?;
    if content.len() == NETCODE_KEY_BYTES {
        return PrivateKey::try_from(&content[..]).map_err(|_| ConfigError::InvalidPrivateKey { source: PRIVATE_KEY_FILE_VAR });
    }

    let text = String::from_utf8_lossy(&content);
    decode_private_key(text.trim().as_bytes(), PRIVATE_KEY_FILE_VAR)
}

fn decode_private_key(encoded: &[u8], source: &'static str) -> Result<PrivateKey, ConfigError> {
    let bytes = BASE64_STANDARD.decode(encoded).map_err(|_| ConfigError::InvalidPrivateKey { source })?;
    PrivateKey::try_from(&bytes[..]).map_err(|_| ConfigError::InvalidPrivateKey { source })
}
