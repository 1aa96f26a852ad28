//! Relay Storage Library
//!
//! This crate provides the blob store abstraction used by the image pipeline and
//! its implementations for S3, the local filesystem and memory.
//!
//! # Blob names
//!
//! A store is bound to one container (`images` for fetched originals,
//! `publicimages` for published results). Blob names are flat, process
//! generated identifiers (see [`generate_blob_name`]); the same name is reused
//! across containers so an original and its published copy can be correlated.
//! Names must not contain `..` or a leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_blob_store;
pub use keys::generate_blob_name;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::InMemoryStorage;
pub use relay_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{BlobStore, StorageError, StorageResult, StoredBlob};
