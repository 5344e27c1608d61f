//! Network subsystem: the backend REST client

pub mod client;
#[cfg(test)]
pub(crate) mod testing;

pub use client::{attachment_filename, ApiClient};
