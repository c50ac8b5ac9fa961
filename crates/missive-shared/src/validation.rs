//! Business rules for message bodies.
//!
//! The bounds are enforced by the client before any network call and again
//! by the local store, so a programmatic caller cannot bypass them.

use crate::constants::{MESSAGE_MAX_LENGTH, MESSAGE_MIN_LENGTH};
use crate::error::BodyError;

/// Trim `body` and check its length in characters against
/// `[MESSAGE_MIN_LENGTH, MESSAGE_MAX_LENGTH]`. Returns the trimmed body.
pub fn validate_message_body(body: &str) -> Result<&str, BodyError> {
    let trimmed = body.trim();
    let len = trimmed.chars().count();

    if len < MESSAGE_MIN_LENGTH {
        return Err(BodyError::Empty);
    }
    if len > MESSAGE_MAX_LENGTH {
        return Err(BodyError::TooLong {
            len,
            max: MESSAGE_MAX_LENGTH,
        });
    }
    Ok(trimmed)
}
