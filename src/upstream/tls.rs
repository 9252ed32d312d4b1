//! Per-upstream rustls client configuration.
//!
//! Each upstream gets its own [`ClientConfig`]: webpki roots, an optional
//! client identity loaded from PEM files for mutual TLS, and optionally a
//! verifier that accepts any server certificate.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::ClientError;

/// Client certificate chain and its private key.
pub struct ClientIdentity {
    pub certs: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

impl ClientIdentity {
    /// Load a PEM certificate chain and private key.
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self, ClientError> {
        let read_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ClientError::ReadPem { path, source }
        };

        let mut cert_file = BufReader::new(File::open(cert_path).map_err(read_err(cert_path))?);
        let certs = rustls_pemfile::certs(&mut cert_file)
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_err(cert_path))?;
        if certs.is_empty() {
            return Err(ClientError::NoCertificate {
                path: cert_path.to_path_buf(),
            });
        }

        let mut key_file = BufReader::new(File::open(key_path).map_err(read_err(key_path))?);
        let key = rustls_pemfile::private_key(&mut key_file)
            .map_err(read_err(key_path))?
            .ok_or_else(|| ClientError::NoPrivateKey {
                path: key_path.to_path_buf(),
            })?;

        Ok(Self { certs, key })
    }
}

pub fn client_config(
    identity: Option<ClientIdentity>,
    insecure_skip_verify: bool,
) -> Result<ClientConfig, ClientError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots);

    let mut config = match identity {
        Some(ClientIdentity { certs, key }) => builder.with_client_auth_cert(certs, key)?,
        None => builder.with_no_client_auth(),
    };

    if insecure_skip_verify {
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)));
    }

    Ok(config)
}

/// Skips chain and hostname checks; handshake signatures are still verified.
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
