/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the catalog, the query cache and the layout core.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog id of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub i64);

/// Catalog id of a tag. Negative ids are local placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub i64);

impl TagId {
    pub fn is_placeholder(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tag that can be attached to images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    /// CSS-style hex color, e.g. "#3B82F6"
    pub color: String,
}

impl Tag {
    pub fn new(id: TagId, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            color: color.into(),
        }
    }

    /// True while the tag only exists locally, waiting for the catalog to
    /// confirm its creation
    pub fn is_optimistic(&self) -> bool {
        self.id.is_placeholder()
    }
}

/// Represents a single image in the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageItem {
    /// Unique catalog ID
    pub id: ImageId,
    /// Path to the image file, used as the image source
    pub url: String,
    /// Intrinsic width in pixels
    pub width: f32,
    /// Intrinsic height in pixels
    pub height: f32,
    /// Filename only (e.g., "DSC_0001.jpg")
    pub name: String,
    pub tags: Vec<Tag>,
}

impl ImageItem {
    pub fn has_tag(&self, tag: TagId) -> bool {
        self.tags.iter().any(|t| t.id == tag)
    }

    /// Width and height are usable for aspect scaling
    pub fn has_valid_dimensions(&self) -> bool {
        self.width.is_finite() && self.width > 0.0 && self.height.is_finite() && self.height >= 0.0
    }

    /// Height of this image when drawn `width` pixels wide
    pub fn scaled_height(&self, width: f32) -> f32 {
        self.height * (width / self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(width: f32, height: f32) -> ImageItem {
        ImageItem {
            id: ImageId(1),
            url: "a.jpg".into(),
            width,
            height,
            name: "a.jpg".into(),
            tags: vec![],
        }
    }

    #[test]
    fn test_placeholder_tags_are_optimistic() {
        assert!(Tag::new(TagId(-1), "new", "#fff").is_optimistic());
        assert!(!Tag::new(TagId(3), "old", "#fff").is_optimistic());
    }

    #[test]
    fn test_degenerate_dimensions() {
        assert!(item(200.0, 100.0).has_valid_dimensions());
        assert!(!item(0.0, 100.0).has_valid_dimensions());
        assert!(!item(f32::NAN, 100.0).has_valid_dimensions());
        assert!(!item(100.0, f32::INFINITY).has_valid_dimensions());
    }

    #[test]
    fn test_scaled_height_keeps_aspect() {
        assert_eq!(item(400.0, 300.0).scaled_height(200.0), 150.0);
    }
}
