//! Client-credentials token acquisition and the process-wide credential cache.

pub mod token;

mod cache;

pub use cache::*;
pub use token::{credential::*, secret::*};
