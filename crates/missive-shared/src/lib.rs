//! # missive-shared
//!
//! Domain types, backend row shapes and the business rules shared by the
//! store and the client.

pub mod constants;
pub mod error;
pub mod rows;
pub mod types;
pub mod validation;

pub use error::{BodyError, ParseKindError};
pub use types::*;
pub use validation::validate_message_body;
