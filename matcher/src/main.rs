use std::io;

use actix_web::{middleware, web::Data, App, HttpServer};
use log::{info, warn};

use matcher::{
    config::{private_key_from_env, MatcherConfig},
    configure, Matcher,
};

fn invalid_config(err: matcher::ConfigError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, err)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let config = MatcherConfig::from_env().map_err(invalid_config)?;
    let private_key = private_key_from_env().map_err(invalid_config)?;
    let bind_address = config.bind_address;
    let tls_config = config.tls.as_ref().map(|tls| tls.server_config()).transpose().map_err(invalid_config)?;

    info!(
        "Started matchmaker on {}, issuing {:?} tokens for {:?}",
        bind_address, config.nonce_scheme, config.server_addresses
    );

    let matcher = Data::new(Matcher::new(config, private_key));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(matcher.clone())
            .configure(configure)
    });

    // Responses carry the session keys, plain HTTP is only for a TLS terminating proxy in front.
    let server = match tls_config {
        Some(tls_config) => server.bind_rustls_021(bind_address, tls_config)?,
        None => {
            warn!("Serving plain HTTP, TLS must be terminated in front of the matcher");
            server.bind(bind_address)?
        }
    };

    server.run().await
}
