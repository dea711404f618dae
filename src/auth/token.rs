//! Token models: the redacting secret wrapper and the cached credential.

pub mod credential;
pub mod secret;
