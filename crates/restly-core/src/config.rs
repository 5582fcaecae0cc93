// ── Runtime entity configuration ──
//
// These types describe *how* an entity talks to its resource and what it
// leaves out of the wire representation. The embedding application builds
// an `EntityConfig` and hands it in; nothing here reads files or the
// environment.

use std::time::Duration;

use restly_api::{TlsMode, TransportConfig};
use url::Url;

use crate::graph::IgnoreList;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed development servers).
    DangerAcceptInvalid,
}

/// Configuration for one entity.
#[derive(Debug, Clone)]
pub struct EntityConfig {
    /// Base for relative resource URLs. `None` means URLs must be absolute.
    pub base_url: Option<Url>,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Overrides the transport's default `User-Agent`.
    pub user_agent: Option<String>,
    /// Field names kept out of serialized bodies and change snapshots.
    pub ignore: IgnoreList,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            user_agent: None,
            ignore: IgnoreList::default(),
        }
    }
}

impl EntityConfig {
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn with_ignore(mut self, ignore: IgnoreList) -> Self {
        self.ignore = ignore;
        self
    }

    /// Translate into the api crate's transport settings.
    pub fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        let mut transport = TransportConfig {
            tls,
            timeout: self.timeout,
            ..TransportConfig::default()
        };
        if let Some(agent) = &self.user_agent {
            transport.user_agent.clone_from(agent);
        }
        transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_inherits_timeout_and_tls() {
        let config = EntityConfig {
            tls: TlsVerification::DangerAcceptInvalid,
            timeout: Duration::from_secs(5),
            user_agent: Some("tests/1.0".into()),
            ..EntityConfig::default()
        };
        let transport = config.transport();
        assert_eq!(transport.timeout, Duration::from_secs(5));
        assert!(matches!(transport.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(transport.user_agent, "tests/1.0");
    }

    #[test]
    fn default_ignores_lifecycle_flags() {
        let config = EntityConfig::default();
        for name in ["isUpdating", "isLoaded", "isGot", "isError"] {
            assert!(config.ignore.contains(name), "{name} should be ignored");
        }
        assert!(config.base_url.is_none());
    }
}
