pub mod credentials;
pub mod dispatch;
pub mod normalize;

pub use self::credentials::{ApiVersion, Audience, CredentialSelector};
pub use self::dispatch::{CredentialMode, GatewayError, RequestDispatcher};
pub use self::normalize::{normalize, BackendResult, OutwardResponse};
