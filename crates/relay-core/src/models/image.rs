use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use url::Url;

use super::TenantId;

/// Which of a product's three images an asset is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Brand,
    Logo,
    Image,
}

impl ImageType {
    /// All image types, in the order they appear in an image update request.
    pub const ALL: [ImageType; 3] = [ImageType::Brand, ImageType::Logo, ImageType::Image];
}

impl Display for ImageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ImageType::Brand => write!(f, "brand"),
            ImageType::Logo => write!(f, "logo"),
            ImageType::Image => write!(f, "image"),
        }
    }
}

impl FromStr for ImageType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brand" => Ok(ImageType::Brand),
            "logo" => Ok(ImageType::Logo),
            "image" => Ok(ImageType::Image),
            _ => Err(anyhow::anyhow!("Invalid image type: {}", s)),
        }
    }
}

/// Partner request to replace a product's image set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpdateRequest {
    pub brand_uri: Url,
    pub logo_uri: Url,
    pub product_uri: Url,
    pub product_id: String,
}

impl ImageUpdateRequest {
    /// Source URI for each image type, in request order.
    pub fn sources(&self) -> [(ImageType, &Url); 3] {
        [
            (ImageType::Brand, &self.brand_uri),
            (ImageType::Logo, &self.logo_uri),
            (ImageType::Image, &self.product_uri),
        ]
    }
}

/// One fetched image waiting to be optimized and published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeImageTask {
    /// Opaque handle into the working store.
    pub blob_name: String,
    pub image_type: ImageType,
    pub product_id: String,
}

/// Image update in the central system's contract form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImageUpdate {
    pub tenant_id: TenantId,
    pub image_type: ImageType,
    pub image_uri: String,
    pub product_id: String,
}
