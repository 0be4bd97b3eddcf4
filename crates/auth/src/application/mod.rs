//! Application Layer
//!
//! Services and the credential facade.

pub mod attempts;
pub mod config;
pub mod service;
pub mod sessions;
pub mod tokens;

// Re-exports
pub use attempts::AttemptLedger;
pub use config::AuthConfig;
pub use service::{
    ClientContext, CredentialService, Identity, PurgeReport, RegisterInput, RegisterOutput,
};
pub use sessions::{SessionCheck, SessionVault};
pub use tokens::ActionTokens;
