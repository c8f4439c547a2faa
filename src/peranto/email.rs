//! Email delivery abstraction for out-of-band reset keys.
//!
//! Delivery mechanics live outside the core; the default sender logs the
//! payload instead of sending real email.

use anyhow::Result;
use tracing::info;

/// Email delivery collaborator; implementations decide how to deliver.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error so the caller can log the failure.
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Local dev sender that logs instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        info!(to = %to, subject = %subject, body = %body, "email send stub");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sender_always_succeeds() {
        let sender = LogEmailSender;

        assert!(sender
            .send("a@example.com", "Reset key", "key_12345")
            .is_ok());
    }
}
