//! HTTP route handlers.

pub mod orders;
pub mod products;
pub mod system;
