pub mod health;
pub use self::health::health;

pub mod consumers;
pub use self::consumers::{activate, refresh_token, register, reset_key, verify};

pub mod webapp;
pub use self::webapp::{
    admin_index, destroy, login, logout, show, store_consumer, update,
};

// common pieces for the handlers
use crate::consumer::PgConsumerStore;
use crate::token::TokenLifecycle;
use regex::Regex;
use std::sync::Arc;

/// Lifecycle over the Postgres store, shared with handlers via `Extension`.
pub type SharedLifecycle = Arc<TokenLifecycle<PgConsumerStore>>;

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }
}
