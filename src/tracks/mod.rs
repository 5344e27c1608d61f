//! Background track management

pub mod catalog;
pub mod upload;

pub use catalog::{resolve_url, TrackCatalog};
pub use upload::UploadCandidate;
