//! HTTP middleware and request extractors.

pub mod auth;
pub mod request_id;

pub use auth::{OptionalPrincipal, Principal, RequireAdmin, RequireAuth};
pub use request_id::request_id_middleware;
