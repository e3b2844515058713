//! Token value types.

pub mod pair;
pub mod secret;
