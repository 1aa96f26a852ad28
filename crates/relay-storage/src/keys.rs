//! Blob name generation.

use uuid::Uuid;

/// Generate a fresh, random blob name.
///
/// Names are UUID v4 values rendered as 32 lowercase hex characters. They are
/// never derived from partner input, so concurrent stages cannot collide and a
/// hostile source URI cannot choose where its bytes land.
pub fn generate_blob_name() -> String {
    Uuid::new_v4().simple().to_string()
}
