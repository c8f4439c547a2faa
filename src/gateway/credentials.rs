//! Per-call credential selection over the injected configuration.

use crate::cli::globals::Config;
use secrecy::SecretString;

/// Trust tier a backend call is made under; determines the credential and the
/// API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Consumer,
    Admin,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

impl ApiVersion {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

impl Audience {
    /// Consumer calls go to the default version, admin and system paths to the
    /// elevated one.
    #[must_use]
    pub const fn version(self) -> ApiVersion {
        match self {
            Self::Consumer => ApiVersion::V1,
            Self::Admin | Self::System => ApiVersion::V2,
        }
    }
}

/// Decides which credential string to attach to an outgoing backend call.
///
/// Ordinary proxied actions act as the consumer when a session token exists
/// and fall back to the fixed system token; administrative paths always use
/// the fixed admin token. Pure selection, no side effects.
#[derive(Debug, Clone)]
pub struct CredentialSelector {
    system_access_token: SecretString,
    admin_access_token: SecretString,
}

impl CredentialSelector {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            system_access_token: config.system_access_token.clone(),
            admin_access_token: config.admin_access_token.clone(),
        }
    }

    #[must_use]
    pub fn select(&self, audience: Audience, session_token: Option<&str>) -> SecretString {
        match audience {
            Audience::Consumer => session_token.map_or_else(
                || self.system_access_token.clone(),
                |token| SecretString::from(token.to_string()),
            ),
            Audience::System => self.system_access_token.clone(),
            Audience::Admin => self.admin_access_token.clone(),
        }
    }
}
