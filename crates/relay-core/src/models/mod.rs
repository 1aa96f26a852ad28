//! Data models for the relay
//!
//! Wire-form types (`UpdateMessage`, `ImageUpdateRequest`) only exist while a
//! partner message is decoded. Contract-form types are what the central system
//! receives, serialized as camelCase JSON.

mod image;
mod tenant;
mod update;

// Re-export all models for convenient imports
pub use image::{ImageType, ImageUpdateRequest, OptimizeImageTask, ProductImageUpdate};
pub use tenant::TenantId;
pub use update::{Adjustment, ProductUpdate, UpdateMessage};
