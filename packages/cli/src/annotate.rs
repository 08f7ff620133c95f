//! Canonical annotation files.
//!
//! Space ids follow the position of each polygon in the sorted list, so
//! the canonical file is itself a valid annotation file whose ids never
//! change when it is loaded again.

use std::path::Path;

use lot_monitor_occupancy_models::SpaceId;
use lot_monitor_spatial::{LayoutError, SpaceLayout, sort_key};

/// Validates an annotation file and renders its polygons in id order.
///
/// # Errors
///
/// Returns a [`LayoutError`] if the file cannot be read or fails
/// validation.
pub fn canonical_json(path: &Path) -> Result<String, LayoutError> {
    let annotations = SpaceLayout::load_json(path)?.sorted_annotations();

    for (index, annotation) in annotations.iter().enumerate() {
        let (min_y, min_x) = sort_key(annotation);
        log::info!(
            "Space {} starts at ({min_x}, {min_y})",
            SpaceId::from_index(index)
        );
    }

    Ok(serde_json::to_string_pretty(&annotations)?)
}
