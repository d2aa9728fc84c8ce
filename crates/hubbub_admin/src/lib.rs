//! hubbub_admin
//!
//! The administrative surface: a thin HTTP adapter translating
//! request/response calls into broker kernel operations. Topic lifecycle,
//! publishing, and observation only — streaming goes through
//! `hubbub_transport`.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod types;

pub use error::{AdminError, Result};
pub use handlers::AppState;
pub use routes::router;

#[cfg(test)]
mod tests;
