//! HTTP transport session
//!
//! An [`HttpSession`] is the transport a raw connection sends every request
//! through. It holds a default client plus any number of prefix-mounted clients
//! (the longest matching prefix wins), and an optional verification override
//! that replaces system trust with certificates loaded from a single file.

use super::tls::{load_trust_anchors, Pkcs12Adapter};
use crate::Result;
use reqwest::{Certificate, Client, ClientBuilder};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings applied to every client a session builds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// HTTP `User-Agent`
    pub user_agent: String,
    /// Per-request timeout
    pub request_timeout: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            user_agent: format!("presto-stream/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: None,
        }
    }
}

#[derive(Clone)]
struct Mount {
    prefix: String,
    adapter: Pkcs12Adapter,
    client: Client,
}

#[derive(Clone)]
struct VerifyOverride {
    path: PathBuf,
    anchors: Vec<Certificate>,
}

/// Transport session used by a raw connection
#[derive(Clone)]
pub struct HttpSession {
    settings: SessionSettings,
    verify: Option<VerifyOverride>,
    default_client: Client,
    mounts: Vec<Mount>,
}

impl HttpSession {
    /// Create a session with no mounts and system trust
    pub fn new(settings: SessionSettings) -> Result<Self> {
        let default_client = build_client(&settings, None, None)?;
        Ok(Self {
            settings,
            verify: None,
            default_client,
            mounts: Vec::new(),
        })
    }

    /// Settings this session was created with
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Route every request whose URL starts with `prefix` through a client
    /// presenting the adapter's certificate. Mounting the same prefix twice
    /// replaces the earlier adapter.
    pub fn mount(&mut self, prefix: impl Into<String>, adapter: Pkcs12Adapter) -> Result<()> {
        let prefix = prefix.into();
        let client = build_client(&self.settings, self.verify.as_ref(), Some(&adapter))?;
        self.mounts.retain(|m| m.prefix != prefix);
        self.mounts.push(Mount {
            prefix,
            adapter,
            client,
        });
        // longest prefix first, so `client_for` takes the first match
        self.mounts
            .sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        tracing::debug!(mounts = self.mounts.len(), "mounted client certificate adapter");
        Ok(())
    }

    /// Verify server certificates against the certificates in `path` only,
    /// replacing system trust for every client in this session.
    pub fn set_verify(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let verify = VerifyOverride {
            path: path.to_path_buf(),
            anchors: load_trust_anchors(path)?,
        };

        self.default_client = build_client(&self.settings, Some(&verify), None)?;
        for mount in &mut self.mounts {
            mount.client = build_client(&self.settings, Some(&verify), Some(&mount.adapter))?;
        }
        self.verify = Some(verify);
        tracing::debug!(path = %path.display(), "installed certificate verification override");
        Ok(())
    }

    /// Verification override currently in force
    pub fn verify_path(&self) -> Option<&Path> {
        self.verify.as_ref().map(|v| v.path.as_path())
    }

    /// Mounted prefixes, longest first
    pub fn mounted_prefixes(&self) -> Vec<&str> {
        self.mounts.iter().map(|m| m.prefix.as_str()).collect()
    }

    /// Client that handles requests to `url`
    pub fn client_for(&self, url: &str) -> &Client {
        self.mounts
            .iter()
            .find(|m| url.starts_with(&m.prefix))
            .map(|m| &m.client)
            .unwrap_or(&self.default_client)
    }
}

impl std::fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSession")
            .field("settings", &self.settings)
            .field("verify", &self.verify_path())
            .field("mounts", &self.mounted_prefixes())
            .finish()
    }
}

fn build_client(
    settings: &SessionSettings,
    verify: Option<&VerifyOverride>,
    adapter: Option<&Pkcs12Adapter>,
) -> Result<Client> {
    let mut builder = ClientBuilder::new()
        .use_native_tls()
        .user_agent(settings.user_agent.clone());

    if let Some(timeout) = settings.request_timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(verify) = verify {
        builder = builder.tls_built_in_root_certs(false);
        for anchor in &verify.anchors {
            builder = builder.add_root_certificate(anchor.clone());
        }
    }

    if let Some(adapter) = adapter {
        builder = builder.identity(adapter.identity().clone());
    }

    Ok(builder.build()?)
}
