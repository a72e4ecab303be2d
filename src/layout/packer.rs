/// Greedy shortest-column packing.
///
/// Each item joins whichever column is currently shortest (lowest index on
/// ties), scaled to the column width so its aspect ratio is kept. An optional
/// reservation pre-fills the leading columns, modeling a block that sits at
/// the top-left of the grid.

use tracing::warn;

use super::geometry::Rect;
use crate::state::data::{ImageId, ImageItem};

/// Space held for the selected item's detail frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reservation {
    /// The selected item; it is never packed as a normal item
    pub item: ImageId,
    /// Number of leading columns the block covers
    pub occupied_columns: usize,
    pub height: f32,
}

/// Position of one item for one layout pass
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSlot {
    pub item: ImageItem,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    /// Aspect-scaled height (measured frame height for the reserved slot)
    pub height: f32,
}

impl LayoutSlot {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Result of one packing pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Packing {
    pub slots: Vec<LayoutSlot>,
    /// Final running height of every column, gaps included
    pub column_heights: Vec<f32>,
    /// Required container height
    pub content_height: f32,
    /// Items left out because their dimensions cannot be scaled
    pub skipped: Vec<ImageId>,
}

pub fn pack(
    items: &[ImageItem],
    column_count: usize,
    column_width: f32,
    column_gap: f32,
    vertical_gap: f32,
    reserved: Option<Reservation>,
) -> Packing {
    if column_count == 0 {
        return Packing::default();
    }

    let mut heights = vec![0.0_f32; column_count];
    if let Some(reservation) = reserved {
        let occupied = reservation.occupied_columns.min(column_count);
        for height in heights.iter_mut().take(occupied) {
            *height = reservation.height + vertical_gap;
        }
    }

    let mut slots = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();

    for item in items {
        if reserved.is_some_and(|r| r.item == item.id) {
            continue;
        }
        if !item.has_valid_dimensions() {
            warn!(image = %item.id, width = item.width, height = item.height, "skipping image with unusable dimensions");
            skipped.push(item.id);
            continue;
        }

        let column = shortest_column(&heights);
        let scaled = item.scaled_height(column_width);

        slots.push(LayoutSlot {
            item: item.clone(),
            x: column as f32 * (column_width + column_gap),
            y: heights[column],
            width: column_width,
            height: scaled,
        });
        heights[column] += scaled + vertical_gap;
    }

    let content_height = heights.iter().copied().fold(0.0, f32::max);

    Packing {
        slots,
        column_heights: heights,
        content_height,
        skipped,
    }
}

/// First column with the minimum height
fn shortest_column(heights: &[f32]) -> usize {
    let mut min_index = 0;
    let mut min_value = f32::INFINITY;
    for (index, height) in heights.iter().enumerate() {
        if *height < min_value {
            min_index = index;
            min_value = *height;
        }
    }
    min_index
}
