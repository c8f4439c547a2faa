use secrecy::SecretString;

/// Immutable process configuration, built once from the CLI/environment and
/// injected where needed; nothing in the core reads ambient env state.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the versioned backend API, e.g. `https://backend.tld:8443`.
    pub backend_url: String,
    /// Fixed credential attached to consumer-audience calls when no session
    /// token exists.
    pub system_access_token: SecretString,
    /// Fixed elevated credential for admin-audience calls.
    pub admin_access_token: SecretString,
    /// Email address identifying the super-admin consumer.
    pub admin_email: String,
}

impl Config {
    #[must_use]
    pub fn new(
        backend_url: String,
        system_access_token: SecretString,
        admin_access_token: SecretString,
        admin_email: String,
    ) -> Self {
        Self {
            backend_url,
            system_access_token,
            admin_access_token,
            admin_email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_config() {
        let config = Config::new(
            "https://backend.tld:8443".to_string(),
            SecretString::from("system".to_string()),
            SecretString::from("admin".to_string()),
            "admin@example.com".to_string(),
        );

        assert_eq!(config.backend_url, "https://backend.tld:8443");
        assert_eq!(config.system_access_token.expose_secret(), "system");
        assert_eq!(config.admin_access_token.expose_secret(), "admin");
        assert_eq!(config.admin_email, "admin@example.com");
    }
}
