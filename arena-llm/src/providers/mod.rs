//! Concrete gateway providers
//!
//! Providers are wired at startup; the rest of the system only ever sees the
//! [`ModelGateway`](crate::ModelGateway) trait.

pub mod openrouter;

pub use openrouter::OpenRouterGateway;
