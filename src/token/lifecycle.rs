//! Token lifecycle: Unissued -> Starter -> Valid -> Active, plus the reset
//! transition back to a fresh cycle.
//!
//! Starter and valid tokens are transient cleartext; the Argon2 digest of a
//! valid token is the only persisted form. Verification re-hashes a candidate
//! and compares, it never recovers cleartext.

use super::codec::{self, TokenStatus};
use crate::consumer::{Consumer, ConsumerStore};
use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::debug;

/// Which channel an inbound request arrived on. Determines where the token is
/// looked for and whether extraction alone is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    /// Browser session on the web app; bypasses the API admission check, so an
    /// extracted token must also verify.
    WebApp,
    /// Direct API call; admission happens upstream, extraction is enough.
    DirectApi,
}

/// The token-bearing parts of an inbound request, assembled by the caller.
#[derive(Debug, Default, Clone)]
pub struct RequestContext {
    /// Token held in the caller's session, if any (web-app channel).
    pub session_token: Option<String>,
    /// `api_access_token` query parameter, if any (direct-API channel).
    pub query_token: Option<String>,
}

/// Generates, hashes, verifies and resets bearer tokens against a consumer
/// store and a configured admin email.
pub struct TokenLifecycle<S> {
    store: S,
    admin_email: String,
}

impl<S: ConsumerStore> TokenLifecycle<S> {
    pub fn new(store: S, admin_email: String) -> Self {
        Self { store, admin_email }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Build the valid (submittable) token for a consumer by appending its id
    /// to the stored starter token.
    ///
    /// If the stored token field is not starter-shaped (re-issue after
    /// activation, or empty), a fresh starter token is generated first, so the
    /// result is always derived from a starter-shaped base.
    #[must_use]
    pub fn generate_valid_token(&self, consumer: &Consumer) -> String {
        let starter = match consumer.api_token.as_deref() {
            Some(token) if codec::classify(token) == TokenStatus::Starter => token.to_string(),
            _ => codec::generate_starter_token(),
        };

        format!("{starter}_{}", consumer.id)
    }

    /// Hash a valid token into its active (persistable) form.
    ///
    /// # Errors
    /// Returns an error if the Argon2 hashing primitive fails.
    pub fn activate(&self, valid_token: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(valid_token.as_bytes(), &salt)
            .map(|digest| digest.to_string())
            .map_err(|err| anyhow!("failed to hash token: {err}"))
    }

    /// Resolve the consumer a token belongs to by re-deriving the id embedded
    /// in the token itself; the id is never taken from anywhere else.
    ///
    /// A malformed token or a lookup miss is a normal negative result.
    ///
    /// # Errors
    /// Returns an error only when the store lookup itself fails.
    pub async fn resolve_consumer(&self, token: &str) -> Result<Option<Consumer>> {
        let Ok(parts) = codec::parse(token) else {
            return Ok(None);
        };

        let Ok(id) = parts.id.parse::<i64>() else {
            debug!("token id segment is not numeric");
            return Ok(None);
        };

        self.store.find_by_id(id).await
    }

    /// Verify a candidate token against the digest persisted for the consumer
    /// whose id it embeds. False on any failure, never an error.
    pub async fn verify(&self, token: &str) -> bool {
        let Ok(Some(consumer)) = self.resolve_consumer(token).await else {
            return false;
        };

        let Some(digest) = consumer.api_token.as_deref() else {
            return false;
        };

        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };

        // Argon2 verification compares in constant time.
        Argon2::default()
            .verify_password(token.as_bytes(), &parsed)
            .is_ok()
    }

    /// As `verify`, with the additional requirement that the resolved
    /// consumer's email exactly matches the configured admin email.
    /// Fails closed.
    pub async fn verify_admin(&self, token: &str) -> bool {
        let Ok(Some(consumer)) = self.resolve_consumer(token).await else {
            return false;
        };

        if consumer.email != self.admin_email {
            return false;
        }

        self.verify(token).await
    }

    #[must_use]
    pub fn token_status(&self, token: &str) -> TokenStatus {
        codec::classify(token)
    }

    /// Pull the caller's token out of the channel matching the request origin.
    ///
    /// Web-app tokens come from the session and must additionally verify,
    /// since that channel is not behind the API admission check. Direct-API
    /// tokens come from the query string as-is. `None` when no token is
    /// present or the web-app token fails verification.
    pub async fn extract_token(
        &self,
        origin: RequestOrigin,
        ctx: &RequestContext,
    ) -> Option<String> {
        match origin {
            RequestOrigin::WebApp => {
                let token = ctx.session_token.clone()?;

                if self.verify(&token).await {
                    Some(token)
                } else {
                    None
                }
            }
            RequestOrigin::DirectApi => ctx.query_token.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::MemoryConsumerStore;
    use crate::token::codec::generate_starter_token;

    fn lifecycle() -> TokenLifecycle<MemoryConsumerStore> {
        TokenLifecycle::new(MemoryConsumerStore::new(), "admin@example.com".to_string())
    }

    async fn register(
        lifecycle: &TokenLifecycle<MemoryConsumerStore>,
        email: &str,
    ) -> (Consumer, String) {
        let starter = generate_starter_token();
        let consumer = lifecycle
            .store()
            .create(email, &starter)
            .await
            .unwrap()
            .unwrap();
        let valid = lifecycle.generate_valid_token(&consumer);

        (consumer, valid)
    }

    async fn activate_and_persist(
        lifecycle: &TokenLifecycle<MemoryConsumerStore>,
        id: i64,
        valid: &str,
    ) {
        let digest = lifecycle.activate(valid).unwrap();
        lifecycle.store().update_token(id, &digest).await.unwrap();
    }

    #[test]
    fn valid_token_appends_id_to_starter() {
        let lifecycle = lifecycle();
        let consumer = Consumer {
            id: 42,
            email: "a@example.com".to_string(),
            api_token: Some("abcdefghi_1234567_jklmnopqr".to_string()),
        };

        assert_eq!(
            lifecycle.generate_valid_token(&consumer),
            "abcdefghi_1234567_jklmnopqr_42"
        );
    }

    #[test]
    fn valid_token_regenerates_non_starter_base() {
        let lifecycle = lifecycle();
        let consumer = Consumer {
            id: 7,
            email: "a@example.com".to_string(),
            api_token: Some("$argon2id$not-a-starter".to_string()),
        };

        let valid = lifecycle.generate_valid_token(&consumer);

        assert!(valid.ends_with("_7"));
        let parts = codec::parse(&valid).unwrap();
        assert_eq!(codec::classify(&parts.starter_token), TokenStatus::Starter);
    }

    #[tokio::test]
    async fn resolve_consumer_rederives_id_from_token() {
        let lifecycle = lifecycle();
        let (consumer, valid) = register(&lifecycle, "a@example.com").await;

        let resolved = lifecycle.resolve_consumer(&valid).await.unwrap().unwrap();

        assert_eq!(resolved.id, consumer.id);
    }

    #[tokio::test]
    async fn resolve_consumer_misses_are_not_errors() {
        let lifecycle = lifecycle();

        // Unknown id
        let starter = generate_starter_token();
        assert!(lifecycle
            .resolve_consumer(&format!("{starter}_999"))
            .await
            .unwrap()
            .is_none());

        // Malformed token, no delimiter
        assert!(lifecycle
            .resolve_consumer("nodelimiter")
            .await
            .unwrap()
            .is_none());

        // Non-numeric id segment
        assert!(lifecycle
            .resolve_consumer("abc_def")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn verify_round_trip() {
        let lifecycle = lifecycle();
        let (consumer, valid) = register(&lifecycle, "a@example.com").await;

        // Not yet activated: stored field still holds the cleartext starter.
        assert!(!lifecycle.verify(&valid).await);

        activate_and_persist(&lifecycle, consumer.id, &valid).await;

        assert!(lifecycle.verify(&valid).await);
    }

    #[tokio::test]
    async fn verify_rejects_mutated_cleartext() {
        let lifecycle = lifecycle();
        let (consumer, valid) = register(&lifecycle, "a@example.com").await;
        activate_and_persist(&lifecycle, consumer.id, &valid).await;

        // Flip the first character while keeping the embedded id valid.
        let mut chars: Vec<char> = valid.chars().collect();
        chars[0] = if chars[0] == 'x' { 'y' } else { 'x' };
        let mutated: String = chars.into_iter().collect();

        assert_ne!(mutated, valid);
        assert!(!lifecycle.verify(&mutated).await);
    }

    #[tokio::test]
    async fn verify_admin_requires_configured_email() {
        let lifecycle = lifecycle();

        let (admin, admin_valid) = register(&lifecycle, "admin@example.com").await;
        activate_and_persist(&lifecycle, admin.id, &admin_valid).await;

        let (other, other_valid) = register(&lifecycle, "user@example.com").await;
        activate_and_persist(&lifecycle, other.id, &other_valid).await;

        assert!(lifecycle.verify_admin(&admin_valid).await);
        // Valid token, wrong email: fails closed.
        assert!(lifecycle.verify(&other_valid).await);
        assert!(!lifecycle.verify_admin(&other_valid).await);
    }

    #[tokio::test]
    async fn reset_invalidates_prior_token() {
        let lifecycle = lifecycle();
        let (consumer, old_valid) = register(&lifecycle, "a@example.com").await;
        activate_and_persist(&lifecycle, consumer.id, &old_valid).await;
        assert!(lifecycle.verify(&old_valid).await);

        // Reset: a fresh starter replaces the digest, then a new cycle runs.
        let fresh_starter = generate_starter_token();
        lifecycle
            .store()
            .update_token(consumer.id, &fresh_starter)
            .await
            .unwrap();
        let consumer = lifecycle
            .store()
            .find_by_id(consumer.id)
            .await
            .unwrap()
            .unwrap();
        let new_valid = lifecycle.generate_valid_token(&consumer);
        activate_and_persist(&lifecycle, consumer.id, &new_valid).await;

        assert!(lifecycle.verify(&new_valid).await);
        assert!(!lifecycle.verify(&old_valid).await);
    }

    #[tokio::test]
    async fn extract_token_web_app_requires_verification() {
        let lifecycle = lifecycle();
        let (consumer, valid) = register(&lifecycle, "a@example.com").await;
        activate_and_persist(&lifecycle, consumer.id, &valid).await;

        let ctx = RequestContext {
            session_token: Some(valid.clone()),
            query_token: None,
        };
        assert_eq!(
            lifecycle.extract_token(RequestOrigin::WebApp, &ctx).await,
            Some(valid)
        );

        let stale = RequestContext {
            session_token: Some("abcdefghi_1234567_jklmnopqr_999".to_string()),
            query_token: None,
        };
        assert_eq!(
            lifecycle.extract_token(RequestOrigin::WebApp, &stale).await,
            None
        );
    }

    #[tokio::test]
    async fn extract_token_direct_api_takes_query_as_is() {
        let lifecycle = lifecycle();

        let ctx = RequestContext {
            session_token: None,
            query_token: Some("whatever_1".to_string()),
        };
        assert_eq!(
            lifecycle.extract_token(RequestOrigin::DirectApi, &ctx).await,
            Some("whatever_1".to_string())
        );

        let empty = RequestContext::default();
        assert_eq!(
            lifecycle
                .extract_token(RequestOrigin::DirectApi, &empty)
                .await,
            None
        );
    }
}
