//! Client-certificate authentication and trust material.
//!
//! The credential adapter swaps a connection's transport session for one that
//! presents a passphrase-protected PKCS#12 certificate to the coordinator. It is
//! only active when a [`CertificateBundle`] is configured.

use super::engine::RawConnection;
use super::session::HttpSession;
use crate::client::ConnectionParams;
use crate::config::{CertificateBundle, TrustOverrides};
use crate::{Error, Result};
use reqwest::{Certificate, Identity};
use rustls_pemfile::Item;
use std::fs;
use std::path::{Path, PathBuf};

/// PKCS#12 client identity, ready to mount on an [`HttpSession`]
#[derive(Clone)]
pub struct Pkcs12Adapter {
    pfx_path: PathBuf,
    identity: Identity,
}

impl Pkcs12Adapter {
    /// Load the bundle and its passphrase from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credential`] if either file cannot be read or the
    /// bundle cannot be decrypted with the passphrase.
    pub async fn from_bundle(bundle: &CertificateBundle) -> Result<Self> {
        let passphrase = read_passphrase(&bundle.password_path).await?;
        let der = tokio::fs::read(&bundle.pfx_path).await.map_err(|e| {
            Error::Credential(format!(
                "Failed to read PKCS#12 bundle '{}': {}",
                bundle.pfx_path.display(),
                e
            ))
        })?;
        Self::from_der(&bundle.pfx_path, &der, &passphrase)
    }

    /// Build an adapter from DER-encoded PKCS#12 bytes
    pub fn from_der(pfx_path: impl Into<PathBuf>, der: &[u8], passphrase: &str) -> Result<Self> {
        let pfx_path = pfx_path.into();
        let identity = Identity::from_pkcs12_der(der, passphrase).map_err(|e| {
            Error::Credential(format!(
                "Failed to decode PKCS#12 bundle '{}': {}",
                pfx_path.display(),
                e
            ))
        })?;
        Ok(Self { pfx_path, identity })
    }

    /// Path the bundle was loaded from
    pub fn pfx_path(&self) -> &Path {
        &self.pfx_path
    }

    pub(crate) fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl std::fmt::Debug for Pkcs12Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pkcs12Adapter")
            .field("pfx_path", &self.pfx_path)
            .field("identity", &"<Identity>")
            .finish()
    }
}

/// Read a passphrase file, dropping trailing whitespace and newlines.
pub async fn read_passphrase(path: &Path) -> Result<String> {
    let raw = tokio::fs::read(path).await.map_err(|e| {
        Error::Credential(format!(
            "Failed to read certificate passphrase file '{}': {}",
            path.display(),
            e
        ))
    })?;
    let passphrase = String::from_utf8(raw).map_err(|_| {
        Error::Credential(format!(
            "Certificate passphrase file '{}' is not valid UTF-8",
            path.display()
        ))
    })?;
    Ok(passphrase.trim_end().to_string())
}

/// Replace the connection's transport with one authenticating via `bundle`.
///
/// The new session mounts the certificate on `scheme://host:port` of `params`.
/// Must run before any statement is issued on the connection.
pub async fn adapt_connection<C: RawConnection>(
    conn: &mut C,
    params: &ConnectionParams,
    bundle: &CertificateBundle,
) -> Result<()> {
    let adapter = Pkcs12Adapter::from_bundle(bundle).await?;

    let mut session = HttpSession::new(conn.session().settings().clone())?;
    session.mount(params.base_url(), adapter)?;
    conn.install_session(session);

    tracing::info!(
        host = %params.host,
        pfx_path = %bundle.pfx_path.display(),
        "client certificate authentication enabled"
    );
    Ok(())
}

/// Apply the host's trust override, if the table has one.
///
/// Returns whether an override was installed.
pub fn apply_trust_override<C: RawConnection>(
    conn: &mut C,
    host: &str,
    overrides: &TrustOverrides,
) -> Result<bool> {
    match overrides.lookup(host) {
        Some(cert_file) => {
            conn.session_mut().set_verify(&cert_file)?;
            tracing::debug!(host = %host, cert_file = %cert_file.display(), "trust override applied");
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Load every certificate from a PEM file.
///
/// # Errors
///
/// Returns [`Error::Credential`] if the file cannot be read, is not valid PEM,
/// or contains no certificates.
pub fn load_trust_anchors(path: &Path) -> Result<Vec<Certificate>> {
    let data = fs::read(path).map_err(|e| {
        Error::Credential(format!(
            "Failed to read CA certificate file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let mut reader = std::io::Cursor::new(&data);
    let mut anchors = Vec::new();

    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(Item::X509Certificate(cert))) => {
                let cert = Certificate::from_der(cert.as_ref()).map_err(|e| {
                    Error::Credential(format!(
                        "Invalid certificate in '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                anchors.push(cert);
            }
            Ok(Some(_)) => {
                // keys and CRLs are not trust anchors
            }
            Ok(None) => break,
            Err(_) => {
                return Err(Error::Credential(format!(
                    "Failed to parse CA certificate from '{}'",
                    path.display()
                )));
            }
        }
    }

    if anchors.is_empty() {
        return Err(Error::Credential(format!(
            "No valid certificates found in '{}'",
            path.display()
        )));
    }

    Ok(anchors)
}
