//! Domain Layer
//!
//! Contains entities, value objects, and repository traits.

pub mod entity;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{
    account::Account, action_token::ActionToken, action_token::TokenKind, attempt::Attempt,
    session::Session,
};
pub use repository::{
    AccountRepository, AttemptRepository, DirectoryRepository, SessionRepository, TokenRepository,
};
