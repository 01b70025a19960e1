//! Authenticated client for the external board API.
//!
//! The wire layer is a [`Transport`] port so the service layer can be
//! exercised against a recording double; production uses the reqwest-backed
//! [`HttpTransport`] bound to one board's access token.

pub mod client;

#[cfg(test)]
pub mod recording;

pub use client::{ApiClient, ApiMethod, HttpTransport, Transport};
