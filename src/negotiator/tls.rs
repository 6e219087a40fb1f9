//! TLS channel setup: loads a certificate chain and private key into a
//! [`rustls::ServerConfig`] configured with ALPN tokens `h2` and
//! `http/1.1`, then exposes the negotiated protocol after the handshake.

use std::io::BufReader;
use std::sync::Arc;

use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::config::{ClientAuth, TlsConfig};
use crate::error::Error;
use crate::negotiator::Protocol;

const ALPN_H2: &[u8] = b"h2";
const ALPN_HTTP1: &[u8] = b"http/1.1";

/// Builds a [`rustls::ServerConfig`] from PEM-encoded certificate chain and
/// private key bytes, honoring `cfg`'s client-auth mode and ALPN protocol
/// offer (`h2` only when `offer_h2` is set, always `http/1.1`).
pub fn server_config(
    cfg: &TlsConfig,
    cert_chain_pem: &[u8],
    private_key_pem: &[u8],
    offer_h2: bool,
) -> Result<rustls::ServerConfig, Error> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(cert_chain_pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::new_io)?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(private_key_pem))
        .map_err(Error::new_io)?
        .ok_or_else(|| {
            Error::new_io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "no private key found in PEM input",
            ))
        })?;

    let builder = rustls::ServerConfig::builder();
    let mut config = match cfg.client_auth {
        ClientAuth::None => builder
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(tls_error)?,
        ClientAuth::Requested | ClientAuth::Required => {
            let mut roots = RootCertStore::empty();
            if let Some(trust_store) = &cfg.trust_store {
                for cert in
                    rustls_pemfile::certs(&mut BufReader::new(trust_store.as_bytes()))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(Error::new_io)?
                {
                    roots.add(cert).map_err(tls_error)?;
                }
            }
            let verifier = if cfg.client_auth == ClientAuth::Required {
                WebPkiClientVerifier::builder(Arc::new(roots))
                    .build()
                    .map_err(tls_error)?
            } else {
                WebPkiClientVerifier::builder(Arc::new(roots))
                    .allow_unauthenticated()
                    .build()
                    .map_err(tls_error)?
            };
            builder
                .with_client_cert_verifier(verifier)
                .with_single_cert(certs, key)
                .map_err(tls_error)?
        }
    };

    config.alpn_protocols = if offer_h2 {
        vec![ALPN_H2.to_vec(), ALPN_HTTP1.to_vec()]
    } else {
        vec![ALPN_HTTP1.to_vec()]
    };
    Ok(config)
}

fn tls_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
    Error::new_io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}

/// Performs the server-side TLS handshake, honoring `cfg.handshake_timeout`.
pub async fn accept<T>(acceptor: &TlsAcceptor, io: T, cfg: &TlsConfig) -> Result<TlsStream<T>, Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    tokio::time::timeout(cfg.handshake_timeout, acceptor.accept(io))
        .await
        .map_err(|_| Error::new_idle_timeout())?
        .map_err(Error::new_io)
}

/// Reads back the protocol ALPN negotiated, defaulting to HTTP/1.x when the
/// peer didn't offer `h2` or no ALPN extension was sent at all.
pub fn negotiated_protocol<T>(stream: &TlsStream<T>) -> Protocol {
    match stream.get_ref().1.alpn_protocol() {
        Some(proto) if proto == ALPN_H2 => Protocol::Http2,
        _ => Protocol::Http1,
    }
}
