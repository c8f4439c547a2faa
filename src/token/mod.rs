pub mod codec;
pub mod lifecycle;

pub use self::codec::{TokenParts, TokenStatus};
pub use self::lifecycle::{RequestContext, RequestOrigin, TokenLifecycle};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The token carries no `_` delimiter, so no consumer id can be split off.
    #[error("malformed token: missing delimiter")]
    Malformed,
}
