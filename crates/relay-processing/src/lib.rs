//! Relay Processing Library
//!
//! The image fetch/publish pipeline. Stage A fetches a product's three source
//! images into the working store; stage B reads one of them back, applies an
//! [`ImageTransform`] and publishes the result to the public store. The two
//! stages are chained through a queue, never called in-process back to back.

pub mod fetch;
pub mod pipeline;
pub mod transform;

pub use fetch::{FetchedImage, HttpImageFetcher, ImageFetcher};
pub use pipeline::ImagePipeline;
#[cfg(feature = "image")]
pub use transform::ReencodeTransform;
pub use transform::{transform_for, IdentityTransform, ImageTransform};
