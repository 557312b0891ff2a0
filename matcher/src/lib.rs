use std::{fmt, net::SocketAddr};

use actix_web::{
    get,
    http::{
        header::{self, ContentType},
        StatusCode,
    },
    web::{self, Data},
    HttpResponse, HttpResponseBuilder, ResponseError,
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use log::{error, info};
use netcode_token::{ConnectToken, IssuanceError, PrivateKey, TokenIssuer, NETCODE_USER_DATA_BYTES};
use serde::{Deserialize, Serialize};

pub mod config;

pub use config::{ConfigError, MatcherConfig};

/// Token issuer with the policy every match uses.
pub struct Matcher {
    config: MatcherConfig,
    issuer: TokenIssuer,
}

/// Connect token together with its public fields, for clients that do not parse the token.
/// Must only be served over HTTPS, it carries the session keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub connect_token: String,
    pub server_addresses: Vec<SocketAddr>,
    pub client_to_server_key: String,
    pub server_to_client_key: String,
    pub expire_timestamp: u64,
}

#[derive(Debug)]
pub enum MatchError {
    InvalidId { name: &'static str, value: String },
    Issuance(IssuanceError),
}

impl fmt::Display for MatchError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MatchError::InvalidId { name, ref value } => write!(fmt, "Unable to parse {}: {}", name, value),
            MatchError::Issuance(ref err) => write!(fmt, "Failed to generate connect token: {}", err),
        }
    }
}

impl std::error::Error for MatchError {}

impl From<IssuanceError> for MatchError {
    fn from(inner: IssuanceError) -> Self {
        MatchError::Issuance(inner)
    }
}

impl ResponseError for MatchError {
    fn status_code(&self) -> StatusCode {
        match self {
            MatchError::InvalidId { .. } => StatusCode::BAD_REQUEST,
            MatchError::Issuance(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        plain_text(HttpResponse::build(self.status_code())).body(self.to_string())
    }
}

impl Matcher {
    pub fn new(config: MatcherConfig, private_key: PrivateKey) -> Self {
        let issuer = TokenIssuer::new(private_key, config.nonce_scheme);
        Self { config, issuer }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    fn issue(&self, client_id: u64, protocol_id: u64) -> Result<ConnectToken, MatchError> {
        let user_data = [0u8; NETCODE_USER_DATA_BYTES];
        self.issuer
            .issue_token(
                client_id,
                protocol_id,
                &self.config.server_addresses,
                self.config.expiry,
                self.config.timeout_seconds,
                &user_data,
            )
            .map_err(|err| {
                error!("Failed to generate connect token for client {:016x}: {}", client_id, err);
                MatchError::Issuance(err)
            })
    }
}

fn plain_text(mut builder: HttpResponseBuilder) -> HttpResponseBuilder {
    builder
        .content_type(ContentType::plaintext())
        .insert_header((header::X_CONTENT_TYPE_OPTIONS, "nosniff"));
    builder
}

fn parse_id(name: &'static str, value: &str) -> Result<u64, MatchError> {
    value.parse().map_err(|_| MatchError::InvalidId {
        name,
        value: value.to_owned(),
    })
}

fn encode_token(connect_token: &ConnectToken) -> Result<String, MatchError> {
    let bytes = connect_token.to_bytes().map_err(|source| {
        error!("Failed to serialize connect token: {}", source);
        IssuanceError::Token {
            stage: "assembling connect token",
            source,
        }
    })?;
    Ok(BASE64_STANDARD.encode(bytes))
}

fn log_match(client_id: u64, connect_token: &ConnectToken) {
    if let Some(server_address) = connect_token.server_addresses.first() {
        info!("Matched client {:016x} to {}", client_id, server_address);
    }
}

#[get("/match/{protocol_id}/{client_id}")]
async fn match_token(path: web::Path<(String, String)>, matcher: Data<Matcher>) -> Result<HttpResponse, MatchError> {
    let (protocol_id, client_id) = path.into_inner();
    let protocol_id = parse_id("protocolID", &protocol_id)?;
    let client_id = parse_id("clientID", &client_id)?;

    let connect_token = matcher.issue(client_id, protocol_id)?;
    let body = encode_token(&connect_token)?;
    log_match(client_id, &connect_token);

    Ok(plain_text(HttpResponse::Ok()).body(body))
}

#[get("/match/{protocol_id}/{client_id}/json")]
async fn match_response(path: web::Path<(String, String)>, matcher: Data<Matcher>) -> Result<HttpResponse, MatchError> {
    let (protocol_id, client_id) = path.into_inner();
    let protocol_id = parse_id("protocolID", &protocol_id)?;
    let client_id = parse_id("clientID", &client_id)?;

    let connect_token = matcher.issue(client_id, protocol_id)?;
    let response = MatchResponse {
        connect_token: encode_token(&connect_token)?,
        server_addresses: connect_token.server_addresses.to_vec(),
        client_to_server_key: BASE64_STANDARD.encode(connect_token.client_to_server_key),
        server_to_client_key: BASE64_STANDARD.encode(connect_token.server_to_client_key),
        expire_timestamp: connect_token.expire_timestamp,
    };
    log_match(client_id, &connect_token);

    Ok(HttpResponse::Ok().json(response))
}

/// Register the matcher routes, the app must provide a `Data<Matcher>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(match_token).service(match_response);
}
