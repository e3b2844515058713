//! Token models: redacted secrets and the access/refresh pair issued at login or refresh.

pub mod token;

pub use token::{pair::*, secret::*};
