//! Order-aware secret redaction for the amber-relay platform.
//!
//! This crate provides:
//!
//! - **Credentials**: JSON credential bodies and scalar-leaf secret
//!   extraction
//! - **Scrubber**: line-oriented masking of secret values in the display
//!   form of a dataclip

pub mod credential;
pub mod scrubber;

pub use credential::{
    Credential, InMemorySecretsProvider, MIN_SECRET_LEN, SecretsError, SecretsProvider,
    secret_values,
};
pub use scrubber::Scrubber;
