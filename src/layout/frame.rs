/// Geometry of the detail card shown for the selected image.
///
/// The card view in `ui::detail` draws with the same constants, so the height
/// measured offscreen is the height the card really takes on screen.

use super::geometry::Rect;
use super::measure::{Fragment, FragmentBox, ImageLoad, ImageSize, ImageSizes};
use crate::state::data::ImageItem;

pub const CARD_PADDING: f32 = 24.0;
pub const SECTION_GAP: f32 = 24.0;
pub const HEADER_HEIGHT: f32 = 36.0;

pub const BADGE_TEXT_SIZE: f32 = 12.0;
pub const BADGE_PADDING_X: f32 = 8.0;
pub const BADGE_HEIGHT: f32 = 22.0;
pub const BADGE_SPACING: f32 = 6.0;
/// Rough advance of one glyph relative to the text size
const GLYPH_WIDTH_RATIO: f32 = 0.6;

pub const UNTAGGED_LABEL: &str = "Untagged";

/// Id of the image element inside the card
pub const IMAGE_ID: &str = "image";

/// The detail card of one image, as seen by the measurement service
#[derive(Debug, Clone, PartialEq)]
pub struct DetailFrame {
    pub image_url: String,
    pub tag_names: Vec<String>,
    /// Catalog dimensions, only used when measurement is unavailable
    pub fallback_size: (f32, f32),
}

impl DetailFrame {
    pub fn for_item(item: &ImageItem) -> Self {
        Self {
            image_url: item.url.clone(),
            tag_names: item.tags.iter().map(|t| t.name.clone()).collect(),
            fallback_size: (item.width, item.height),
        }
    }

    /// Layout using the catalog dimensions instead of decoded image sizes
    pub fn layout_with_fallback(&self, width: f32) -> FragmentBox {
        let mut sizes = ImageSizes::default();
        let (w, h) = self.fallback_size;
        if w > 0.0 && w.is_finite() && h.is_finite() {
            sizes.insert(
                self.image_url.clone(),
                ImageLoad::Loaded(ImageSize { width: w, height: h }),
            );
        }
        self.layout(width, &sizes)
    }
}

/// Estimated width of a tag badge
pub fn badge_width(label: &str) -> f32 {
    label.chars().count() as f32 * BADGE_TEXT_SIZE * GLYPH_WIDTH_RATIO + 2.0 * BADGE_PADDING_X
}

/// Number of rows `labels` wrap into within `width`
pub fn badge_rows(labels: &[String], width: f32) -> usize {
    if labels.is_empty() {
        return 0;
    }

    let mut rows = 1;
    let mut line = 0.0;
    for label in labels {
        let w = badge_width(label);
        let needed = if line == 0.0 { w } else { line + BADGE_SPACING + w };
        if needed > width && line > 0.0 {
            rows += 1;
            line = w;
        } else {
            line = needed;
        }
    }
    rows
}

impl Fragment for DetailFrame {
    fn images(&self) -> Vec<String> {
        vec![self.image_url.clone()]
    }

    fn layout(&self, width: f32, images: &ImageSizes) -> FragmentBox {
        let inner = (width - 2.0 * CARD_PADDING).max(0.0);

        let header = Rect::new(CARD_PADDING, CARD_PADDING, inner, HEADER_HEIGHT);

        let image_height = images
            .get(&self.image_url)
            .filter(|size| size.width > 0.0)
            .map(|size| size.height * inner / size.width)
            .unwrap_or(0.0);
        let image = Rect::new(CARD_PADDING, header.bottom() + SECTION_GAP, inner, image_height);

        let rows = if self.tag_names.is_empty() {
            1
        } else {
            badge_rows(&self.tag_names, inner)
        };
        let footer_height = rows as f32 * BADGE_HEIGHT + rows.saturating_sub(1) as f32 * BADGE_SPACING;
        let footer = Rect::new(CARD_PADDING, image.bottom() + SECTION_GAP, inner, footer_height);

        FragmentBox::new(Rect::new(0.0, 0.0, width, footer.bottom() + CARD_PADDING))
            .push(FragmentBox::new(header).with_id("header"))
            .push(FragmentBox::new(image).with_id(IMAGE_ID))
            .push(FragmentBox::new(footer).with_id("footer"))
    }
}
