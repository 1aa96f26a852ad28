//! Queue and container names used by the partner deployment.

/// Partner queue carrying one wire-form update line per message.
pub const UPDATE_QUEUE: &str = "update";

/// Partner queue carrying newline separated update lines.
pub const BATCH_UPDATE_QUEUE: &str = "batchupdate";

/// Partner queue carrying image update requests (3 URIs + product id).
pub const IMAGE_UPDATE_QUEUE: &str = "productimage";

/// Intermediate queue carrying one `OptimizeImageTask` per fetched image.
pub const OPTIMIZE_IMAGE_QUEUE: &str = "optproductimage";

/// Central system queue receiving `ProductUpdate` records.
pub const CENTRAL_UPDATE_QUEUE: &str = "productupdate";

/// Central system queue receiving `ProductImageUpdate` records.
pub const CENTRAL_IMAGE_UPDATE_QUEUE: &str = "productimageupdate";

/// Container holding original, unoptimized image bytes.
pub const WORKING_CONTAINER: &str = "images";

/// Container holding optimized, publicly addressable images.
pub const PUBLIC_CONTAINER: &str = "publicimages";

/// Maximum number of concurrent enqueue operations per batch chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 250;
