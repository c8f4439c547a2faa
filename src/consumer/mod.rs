pub mod store;

pub use self::store::{ConsumerStore, MemoryConsumerStore, PgConsumerStore};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An external identity permitted to call the backend API.
///
/// `api_token` holds the Argon2 digest of the active token once activated;
/// before activation it carries the transient cleartext starter token. Only
/// the token lifecycle mutates it.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Consumer {
    pub id: i64,
    pub email: String,
    pub api_token: Option<String>,
}
