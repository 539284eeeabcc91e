//! Client configuration
//!
//! Certificate authentication is switched on by the presence of a
//! [`CertificateBundle`] in [`ClientConfig`]. [`ClientConfig::from_env`] reads the
//! same bundle from the `PFX_PATH` / `PFX_PASSWORD_PATH` environment variables for
//! command-line use.

use crate::connection::SessionSettings;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the PKCS#12 bundle
pub const PFX_PATH_ENV: &str = "PFX_PATH";

/// Environment variable naming the file that holds the bundle passphrase
pub const PFX_PASSWORD_PATH_ENV: &str = "PFX_PASSWORD_PATH";

/// Rows requested per batch once the eager first fetch is consumed
pub const DEFAULT_BATCH_SIZE: usize = 1_000_000;

/// Value sent as `X-Presto-Source`
pub const DEFAULT_SOURCE: &str = "presto-stream";

// Hosts whose intermediate CA is missing from common system trust stores.
const BUILTIN_TRUST_OVERRIDES: &[(&str, &str)] = &[
    (
        "providerplus.emishealthinsights.co.uk",
        "providerplus.emishealthinsights.co.uk/2.crt",
    ),
    (
        "directoraccess-cert.emishealthinsights.co.uk",
        "providerplus.emishealthinsights.co.uk/2.crt",
    ),
];

/// Location of a passphrase-protected PKCS#12 client certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateBundle {
    /// Path to the `.pfx` / `.p12` file
    pub pfx_path: PathBuf,
    /// Path to a file whose contents (minus trailing whitespace) are the passphrase
    pub password_path: PathBuf,
}

impl CertificateBundle {
    /// Create a bundle description
    pub fn new(pfx_path: impl Into<PathBuf>, password_path: impl Into<PathBuf>) -> Self {
        Self {
            pfx_path: pfx_path.into(),
            password_path: password_path.into(),
        }
    }
}

/// Hostname-keyed certificate files that replace system trust for those hosts.
///
/// Entries are consulted once per connection, by exact host match. Relative
/// paths resolve against `certs_root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustOverrides {
    certs_root: PathBuf,
    entries: BTreeMap<String, PathBuf>,
}

impl TrustOverrides {
    /// Table with no entries
    pub fn empty() -> Self {
        Self {
            certs_root: default_certs_root(),
            entries: BTreeMap::new(),
        }
    }

    /// Directory that relative certificate paths resolve against
    pub fn certs_root(&self) -> &Path {
        &self.certs_root
    }

    /// Change the directory relative entries resolve against
    pub fn with_certs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.certs_root = root.into();
        self
    }

    /// Add or replace an entry. Host names are case-insensitive.
    pub fn insert(&mut self, host: impl Into<String>, cert_file: impl Into<PathBuf>) {
        self.entries
            .insert(host.into().to_ascii_lowercase(), cert_file.into());
    }

    /// Certificate file overriding verification for `host`, if any
    pub fn lookup(&self, host: &str) -> Option<PathBuf> {
        self.entries
            .get(&host.to_ascii_lowercase())
            .map(|file| self.certs_root.join(file))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TrustOverrides {
    /// The built-in table: both `*.emishealthinsights.co.uk` coordinators verify
    /// against `providerplus.emishealthinsights.co.uk/2.crt` under the crate's
    /// `certs/` directory.
    ///
    /// That certificate is not distributed with the crate. Until the operator
    /// places it there, connecting to either host fails with
    /// [`Error::Credential`](crate::Error::Credential) ("Failed to read CA
    /// certificate file ..."). Use [`TrustOverrides::with_certs_root`] to point
    /// at another directory, or [`TrustOverrides::empty`] to disable overrides.
    fn default() -> Self {
        let mut overrides = Self::empty();
        for (host, file) in BUILTIN_TRUST_OVERRIDES {
            overrides.insert(*host, *file);
        }
        overrides
    }
}

fn default_certs_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("certs")
}

/// Configuration passed to [`connect`](crate::connect)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Client certificate; `None` leaves the credential adapter inactive
    pub certificate: Option<CertificateBundle>,
    /// Rows per batch fetched while iterating a cursor
    pub batch_size: usize,
    /// Per-host trust overrides
    pub trust_overrides: TrustOverrides,
    /// `X-Presto-Source` header value
    pub source: String,
    /// HTTP `User-Agent`
    pub user_agent: String,
    /// Timeout applied to each HTTP request (default: none, transport defaults apply)
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            certificate: None,
            batch_size: DEFAULT_BATCH_SIZE,
            trust_overrides: TrustOverrides::default(),
            source: DEFAULT_SOURCE.to_string(),
            user_agent: format!("presto-stream/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Create a builder starting from defaults
    ///
    /// # Examples
    ///
    /// ```
    /// use presto_stream::{CertificateBundle, ClientConfig};
    ///
    /// let config = ClientConfig::builder()
    ///     .certificate(CertificateBundle::new("/secrets/client.pfx", "/secrets/pfx-password"))
    ///     .batch_size(50_000)
    ///     .build();
    /// assert_eq!(config.batch_size, 50_000);
    /// ```
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: ClientConfig::default(),
        }
    }

    /// Build configuration from `PFX_PATH` and `PFX_PASSWORD_PATH`.
    ///
    /// `PFX_PATH` unset means no client certificate. `PFX_PATH` set without
    /// `PFX_PASSWORD_PATH` is a credential error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var_os(key).map(PathBuf::from))
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        let mut config = Self::default();
        if let Some(pfx_path) = lookup(PFX_PATH_ENV) {
            let password_path = lookup(PFX_PASSWORD_PATH_ENV).ok_or_else(|| {
                Error::Credential(format!(
                    "{} is set but {} is not",
                    PFX_PATH_ENV, PFX_PASSWORD_PATH_ENV
                ))
            })?;
            config.certificate = Some(CertificateBundle::new(pfx_path, password_path));
        }
        Ok(config)
    }

    /// HTTP session settings derived from this configuration
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            user_agent: self.user_agent.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Authenticate with a PKCS#12 client certificate
    pub fn certificate(mut self, bundle: CertificateBundle) -> Self {
        self.config.certificate = Some(bundle);
        self
    }

    /// Set the batch size used while iterating cursors
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Replace the trust-override table
    pub fn trust_overrides(mut self, overrides: TrustOverrides) -> Self {
        self.config.trust_overrides = overrides;
        self
    }

    /// Add a trust override on top of the current table
    pub fn trust_override(mut self, host: impl Into<String>, cert_file: impl Into<PathBuf>) -> Self {
        self.config.trust_overrides.insert(host, cert_file);
        self
    }

    /// Set the `X-Presto-Source` header value
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.config.source = source.into();
        self
    }

    /// Set the HTTP `User-Agent`
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set a per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
