//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (constant-time comparison)
//! - Password hashing (Argon2id with configurable work factor)
//! - Secure token generation behind an injectable source
//! - Injectable wall clock
//! - Mitigation-window policy for attempt throttling

pub mod clock;
pub mod crypto;
pub mod password;
pub mod rate_limit;
pub mod token;
