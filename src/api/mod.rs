//! HTTP control surface
//!
//! Exposes refresh, reload and state operations over a local REST API.

pub mod handlers;
pub mod server;
pub mod types;

pub use server::{router, ApiServer};
pub use types::{ApiResponse, Empty, ReloadQuery};
