//! TLS acceptor construction (§3, §5)
//!
//! `certificate_path` points at a single PEM bundle containing the
//! certificate chain followed by the private key. There is no PKCS#12 or
//! keychain integration here — provisioning the bundle itself is out of
//! scope; this just turns a readable file into a `TlsAcceptor`.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig as RustlsServerConfig;
use rustls_pemfile::{certs, private_key};
use tokio_rustls::TlsAcceptor;

/// Builds a `TlsAcceptor` from a PEM bundle at `path`. Returns `Ok(None)`
/// when `path` is empty — TLS is opt-in (§6).
pub fn load_acceptor(path: &str) -> anyhow::Result<Option<TlsAcceptor>> {
    if path.is_empty() {
        return Ok(None);
    }

    let pem = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("certificate bundle '{path}' unreadable: {e}"))?;

    let cert_chain = parse_certificates(&pem)?;
    if cert_chain.is_empty() {
        anyhow::bail!("certificate bundle '{path}' contains no certificates");
    }
    let key = parse_private_key(&pem)?;

    let tls_config = RustlsServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| anyhow::anyhow!("invalid TLS certificate/key: {e}"))?;

    Ok(Some(TlsAcceptor::from(Arc::new(tls_config))))
}

fn parse_certificates(pem: &str) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let mut cursor = std::io::Cursor::new(pem.as_bytes());
    certs(&mut cursor)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!("certificate parsing failed: {e}"))
}

fn parse_private_key(pem: &str) -> anyhow::Result<PrivateKeyDer<'static>> {
    let mut cursor = std::io::Cursor::new(pem.as_bytes());
    private_key(&mut cursor)
        .map_err(|e| anyhow::anyhow!("private key parsing failed: {e}"))?
        .ok_or_else(|| anyhow::anyhow!("no private key found in certificate bundle"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_disables_tls() {
        let acceptor = load_acceptor("").unwrap();
        assert!(acceptor.is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = load_acceptor("/nonexistent/whispr-cert-bundle.pem");
        assert!(result.is_err());
    }
}
