//! Relay Core Library
//!
//! This crate provides the domain models, the partner wire codec, the error
//! taxonomy and configuration shared by every relay component.

pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use codec::{
    decode_image_update_request, decode_update, encode_image_update_request, encode_update,
};
pub use config::{LogFormat, RelayConfig, TransformKind};
pub use error::{LogLevel, RelayError, RelayResult};
pub use models::{
    Adjustment, ImageType, ImageUpdateRequest, OptimizeImageTask, ProductImageUpdate,
    ProductUpdate, TenantId, UpdateMessage,
};
pub use storage_types::StorageBackend;
