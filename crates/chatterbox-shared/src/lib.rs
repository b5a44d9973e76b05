//! # chatterbox-shared
//!
//! Types and primitives shared by every Chatterbox crate: constants, error
//! enums, password hashing, conversation identifiers and the sealed
//! remembered-login snapshot.

pub mod constants;
pub mod crypto;
pub mod error;
pub mod password;
pub mod snapshot;
pub mod types;

pub use error::{ChatterboxError, CryptoError, PasswordError};
pub use types::ConversationId;
