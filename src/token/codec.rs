//! Pure token string generation, parsing and classification. No I/O.

use super::TokenError;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

/// Segment lengths of a starter token, joined with `_`.
pub const STARTER_SEGMENT_LENGTHS: [usize; 3] = [9, 7, 9];

/// Segment length of a reset key (three segments, joined with `_`).
pub const RESET_KEY_SEGMENT_LENGTH: usize = 5;

/// Fixed length of a freshly generated starter token: 9 + 1 + 7 + 1 + 9.
pub const STARTER_TOKEN_LENGTH: usize =
    STARTER_SEGMENT_LENGTHS[0] + STARTER_SEGMENT_LENGTHS[1] + STARTER_SEGMENT_LENGTHS[2] + 2;

/// Whether a token string is starter-shaped or active/valid-shaped.
///
/// Classification is by length only: a starter token has the fixed generated
/// length, anything longer or shorter is treated as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Starter,
    Active,
}

/// The two pieces of a valid token: the embedded consumer id and the
/// starter token it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParts {
    pub id: String,
    pub starter_token: String,
}

fn random_segment(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generate a random starter token for creating new API consumers.
///
/// The token is not usable until the consumer id has been appended and the
/// result activated.
#[must_use]
pub fn generate_starter_token() -> String {
    STARTER_SEGMENT_LENGTHS
        .iter()
        .map(|&length| random_segment(length))
        .collect::<Vec<_>>()
        .join("_")
}

/// Generate a reset key used to authorize a token refresh, delivered
/// out-of-band and never persisted.
#[must_use]
pub fn generate_reset_key() -> String {
    (0..3)
        .map(|_| random_segment(RESET_KEY_SEGMENT_LENGTH))
        .collect::<Vec<_>>()
        .join("_")
}

/// Classify a token by comparing its length against the fixed starter length.
#[must_use]
pub fn classify(token: &str) -> TokenStatus {
    if token.len() == STARTER_TOKEN_LENGTH {
        TokenStatus::Starter
    } else {
        TokenStatus::Active
    }
}

/// Split a valid token into its consumer id (final `_`-delimited segment) and
/// the starter token formed by the preceding segments.
///
/// # Errors
/// Returns `TokenError::Malformed` when the string carries no `_`, since no id
/// can be separated.
pub fn parse(token: &str) -> Result<TokenParts, TokenError> {
    let (starter_token, id) = token.rsplit_once('_').ok_or(TokenError::Malformed)?;

    Ok(TokenParts {
        id: id.to_string(),
        starter_token: starter_token.to_string(),
    })
}
