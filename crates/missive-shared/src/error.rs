use thiserror::Error;

/// A notification kind string the backend sent that this client does not know.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown notification kind: {0}")]
pub struct ParseKindError(pub String);

/// Message body rejected by the length rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BodyError {
    #[error("Message body is empty")]
    Empty,

    #[error("Message body too long: {len} characters (max {max})")]
    TooLong { len: usize, max: usize },
}
