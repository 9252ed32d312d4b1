//! Integration tests for HTTPS upstreams: server certificate checks,
//! `tls_insecure_verify`, and client certificates.
//!
//! Fixtures under `tests/fixtures/tls` come from one throwaway CA:
//! `server.crt` (localhost, 127.0.0.1), `client.crt` (clientAuth), and
//! `other.key`, which matches neither certificate.

use std::convert::Infallible;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use prom2json_gateway::error::{ClientError, FetchError};
use prom2json_gateway::upstream::{MetricsSource, UpstreamClient, UpstreamSpec};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

const EXPOSITION: &str = "\
# TYPE up gauge
up 1
";

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/tls")
        .join(name)
}

fn certs(name: &str) -> Vec<CertificateDer<'static>> {
    let mut reader = BufReader::new(File::open(fixture(name)).unwrap());
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn key(name: &str) -> PrivateKeyDer<'static> {
    let mut reader = BufReader::new(File::open(fixture(name)).unwrap());
    rustls_pemfile::private_key(&mut reader).unwrap().unwrap()
}

fn server_config(require_client_cert: bool) -> ServerConfig {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .unwrap();

    let builder = if require_client_cert {
        let mut roots = RootCertStore::empty();
        for cert in certs("ca.crt") {
            roots.add(cert).unwrap();
        }
        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .unwrap();
        builder.with_client_cert_verifier(verifier)
    } else {
        builder.with_no_client_auth()
    };

    builder
        .with_single_cert(certs("server.crt"), key("server.key"))
        .unwrap()
}

async fn exposition(_req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(Response::new(Full::new(Bytes::from_static(
        EXPOSITION.as_bytes(),
    ))))
}

async fn start_https_upstream(require_client_cert: bool) -> SocketAddr {
    let acceptor = TlsAcceptor::from(Arc::new(server_config(require_client_cert)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(tls) = acceptor.accept(stream).await else {
                    return;
                };
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(tls), service_fn(exposition))
                    .await;
            });
        }
    });

    addr
}

fn https_spec(addr: SocketAddr) -> UpstreamSpec {
    UpstreamSpec {
        path: "/metrics".into(),
        url: format!("https://{addr}/metrics"),
        timeout: Duration::from_secs(5),
        tls_cert: None,
        tls_key: None,
        tls_insecure_verify: false,
    }
}

#[tokio::test]
async fn insecure_verify_accepts_private_ca() {
    let addr = start_https_upstream(false).await;
    let mut spec = https_spec(addr);
    spec.tls_insecure_verify = true;

    let families = UpstreamClient::new(&spec).unwrap().fetch().await.unwrap();
    assert_eq!(families.len(), 1);
    assert_eq!(families[0].name, "up");
}

#[tokio::test]
async fn private_ca_is_rejected_by_default() {
    let addr = start_https_upstream(false).await;

    let err = UpstreamClient::new(&https_spec(addr))
        .unwrap()
        .fetch()
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)), "{err}");
}

#[tokio::test]
async fn client_certificate_is_presented() {
    let addr = start_https_upstream(true).await;
    let mut spec = https_spec(addr);
    spec.tls_insecure_verify = true;
    spec.tls_cert = Some(fixture("client.crt"));
    spec.tls_key = Some(fixture("client.key"));

    let families = UpstreamClient::new(&spec).unwrap().fetch().await.unwrap();
    assert_eq!(families[0].name, "up");
}

#[tokio::test]
async fn missing_client_certificate_is_refused() {
    let addr = start_https_upstream(true).await;
    let mut spec = https_spec(addr);
    spec.tls_insecure_verify = true;

    let result = UpstreamClient::new(&spec).unwrap().fetch().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn mismatched_client_key_fails_at_construction() {
    let mut spec = https_spec("127.0.0.1:9".parse().unwrap());
    spec.tls_cert = Some(fixture("client.crt"));
    spec.tls_key = Some(fixture("other.key"));

    let err = UpstreamClient::new(&spec).unwrap_err();
    assert!(matches!(err, ClientError::Tls(_)), "{err}");
}
