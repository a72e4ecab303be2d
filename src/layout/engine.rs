/// Masonry layout engine.
///
/// Owns the published layout and is its only writer. Every input change
/// (items, selection, container width) starts a new pass:
///
/// ```text
/// Idle -> Measuring (only with a selection) -> Packing -> Published
/// ```
///
/// Measuring is asynchronous and driven by the caller: the engine hands out a
/// [`MeasureJob`] and later receives the result through
/// [`LayoutEngine::complete_measurement`]. Results are tagged with the input
/// signature of the pass that asked for them and are dropped if the inputs
/// changed in the meantime, so a slow measurement can never overwrite a newer
/// layout.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tracing::{debug, info, warn};

use super::frame::{DetailFrame, IMAGE_ID};
use super::geometry::Rect;
use super::measure::FrameGeometry;
use super::packer::{pack, LayoutSlot, Reservation};
use crate::error::MeasureError;
use crate::state::data::{ImageId, ImageItem};

/// The selected frame never spans more than this many columns
pub const MAX_SELECTION_COLUMNS: usize = 2;

/// Grid metrics that come from configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub min_item_width: f32,
    pub column_gap: f32,
    pub vertical_gap: f32,
}

/// Column geometry for one container width
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub column_count: usize,
    pub column_width: f32,
}

impl Grid {
    pub fn for_width(width: f32, params: &LayoutParams) -> Self {
        if !(width.is_finite() && width > 0.0) || params.min_item_width <= 0.0 {
            return Self {
                column_count: 0,
                column_width: 0.0,
            };
        }

        let column_count = ((width / params.min_item_width).floor() as usize).max(1);
        let gaps = (column_count - 1) as f32 * params.column_gap;
        Self {
            column_count,
            column_width: ((width - gaps) / column_count as f32).max(0.0),
        }
    }

    /// Width of a block spanning `columns` columns and the gaps between them
    pub fn span_width(&self, columns: usize, column_gap: f32) -> f32 {
        if columns == 0 {
            return 0.0;
        }
        self.column_width * columns as f32 + column_gap * (columns - 1) as f32
    }

    pub fn selection_columns(&self) -> usize {
        self.column_count.min(MAX_SELECTION_COLUMNS)
    }
}

/// Hash of everything a layout pass depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LayoutSignature(u64);

/// Identifies one pass and the inputs it was started with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassTicket {
    pub pass: u64,
    pub signature: LayoutSignature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPhase {
    Idle,
    Measuring(PassTicket),
    Packing,
    Published,
}

/// The selected item's detail frame, pinned to the top-left of the grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReservedBlock {
    pub item: ImageId,
    pub occupied_columns: usize,
    pub bounds: Rect,
    /// The frame's image element in grid coordinates; seeds the
    /// expand/collapse animation
    pub image: Rect,
}

/// A published layout
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub signature: LayoutSignature,
    pub grid: Grid,
    /// One slot per displayed item; the reserved item's slot comes first
    pub slots: Vec<LayoutSlot>,
    pub reserved: Option<ReservedBlock>,
    pub content_height: f32,
    pub skipped: Vec<ImageId>,
}

impl Layout {
    pub fn slot(&self, id: ImageId) -> Option<&LayoutSlot> {
        self.slots.iter().find(|slot| slot.item.id == id)
    }
}

/// Work the caller has to do before the pass can publish
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureJob {
    pub ticket: PassTicket,
    pub frame: DetailFrame,
    pub width: f32,
    /// Element whose box seeds the selection animation
    pub target: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassRequest {
    /// The pass finished synchronously and the new layout is published
    Published,
    /// The selected frame must be measured first
    Measure(MeasureJob),
}

pub struct LayoutEngine {
    params: LayoutParams,
    items: Vec<ImageItem>,
    container_width: f32,
    selection: Option<ImageId>,
    latest: LayoutSignature,
    passes: u64,
    phase: PassPhase,
    published: Option<Layout>,
}

impl LayoutEngine {
    pub fn new(params: LayoutParams) -> Self {
        Self {
            params,
            items: Vec::new(),
            container_width: 0.0,
            selection: None,
            latest: LayoutSignature::default(),
            passes: 0,
            phase: PassPhase::Idle,
            published: None,
        }
    }

    pub fn layout(&self) -> Option<&Layout> {
        self.published.as_ref()
    }

    #[cfg(test)]
    pub fn phase(&self) -> PassPhase {
        self.phase
    }

    pub fn items(&self) -> &[ImageItem] {
        &self.items
    }

    /// Requested selection, whether or not it is currently displayed
    pub fn selection(&self) -> Option<ImageId> {
        self.selection
    }

    pub fn grid(&self) -> Grid {
        Grid::for_width(self.container_width, &self.params)
    }

    pub fn set_items(&mut self, items: Vec<ImageItem>) -> PassRequest {
        self.items = items;
        self.run_pass()
    }

    pub fn set_selection(&mut self, selection: Option<ImageId>) -> PassRequest {
        self.selection = selection;
        self.run_pass()
    }

    /// Callers debounce resizes before getting here
    pub fn set_container_width(&mut self, width: f32) -> PassRequest {
        self.container_width = width;
        self.run_pass()
    }

    /// The selected item, if it is among the displayed items
    fn selected_item(&self) -> Option<&ImageItem> {
        let id = self.selection?;
        self.items.iter().find(|item| item.id == id)
    }

    fn signature(&self) -> LayoutSignature {
        let mut hasher = DefaultHasher::new();

        self.container_width.to_bits().hash(&mut hasher);
        self.params.min_item_width.to_bits().hash(&mut hasher);
        self.params.column_gap.to_bits().hash(&mut hasher);
        self.params.vertical_gap.to_bits().hash(&mut hasher);

        self.items.len().hash(&mut hasher);
        for item in &self.items {
            item.id.hash(&mut hasher);
            item.width.to_bits().hash(&mut hasher);
            item.height.to_bits().hash(&mut hasher);
        }

        // the selected frame's height depends on its image and tags
        match self.selected_item() {
            Some(item) => {
                item.id.hash(&mut hasher);
                item.url.hash(&mut hasher);
                for tag in &item.tags {
                    tag.name.hash(&mut hasher);
                }
            }
            None => 0_u8.hash(&mut hasher),
        }

        LayoutSignature(hasher.finish())
    }

    fn run_pass(&mut self) -> PassRequest {
        self.passes += 1;
        let ticket = PassTicket {
            pass: self.passes,
            signature: self.signature(),
        };
        self.latest = ticket.signature;

        let grid = self.grid();
        let job = match self.selected_item() {
            Some(item) if grid.column_count > 0 => Some(MeasureJob {
                ticket,
                frame: DetailFrame::for_item(item),
                width: grid.span_width(grid.selection_columns(), self.params.column_gap),
                target: IMAGE_ID,
            }),
            _ => None,
        };

        match job {
            Some(job) => {
                debug!(pass = ticket.pass, width = job.width, "layout pass waiting for measurement");
                self.phase = PassPhase::Measuring(ticket);
                PassRequest::Measure(job)
            }
            None => {
                self.phase = PassPhase::Packing;
                let layout = self.pack_pass(ticket.signature, grid, None);
                self.publish(ticket, layout);
                PassRequest::Published
            }
        }
    }

    /// Finish a pass that was waiting for measurement. Returns false when the
    /// result belongs to outdated inputs and was discarded.
    pub fn complete_measurement(
        &mut self,
        ticket: PassTicket,
        result: Result<FrameGeometry, MeasureError>,
    ) -> bool {
        if ticket.signature != self.latest {
            debug!(
                pass = ticket.pass,
                latest = self.passes,
                phase = ?self.phase,
                "discarding stale measurement"
            );
            return false;
        }

        let grid = self.grid();
        let columns = grid.selection_columns();
        let width = grid.span_width(columns, self.params.column_gap);

        let Some(item) = self.selected_item().cloned() else {
            // Same signature as the latest pass, so the selection is still there
            return false;
        };

        let geometry = match result {
            Ok(geometry) => geometry,
            Err(e) => {
                warn!(image = %item.id, error = %e, "measurement failed, using catalog dimensions");
                let laid_out = DetailFrame::for_item(&item).layout_with_fallback(width);
                FrameGeometry {
                    frame: Rect::new(0.0, 0.0, width, laid_out.bounds.height),
                    target: laid_out.find(IMAGE_ID).map(|b| b.bounds),
                }
            }
        };

        let reserved = ReservedBlock {
            item: item.id,
            occupied_columns: columns,
            bounds: Rect::new(0.0, 0.0, width, geometry.frame.height),
            image: geometry.target.unwrap_or(geometry.frame),
        };

        // An older pass can match the latest inputs again (resize away and
        // back); it may publish but leaves the newest pass measuring
        if ticket.pass == self.passes {
            self.phase = PassPhase::Packing;
        }
        let layout = self.pack_pass(ticket.signature, grid, Some((item, reserved)));
        self.publish(ticket, layout);
        true
    }

    fn pack_pass(
        &self,
        signature: LayoutSignature,
        grid: Grid,
        reserved: Option<(ImageItem, ReservedBlock)>,
    ) -> Layout {
        let reservation = reserved.as_ref().map(|(_, block)| Reservation {
            item: block.item,
            occupied_columns: block.occupied_columns,
            height: block.bounds.height,
        });

        let packing = pack(
            &self.items,
            grid.column_count,
            grid.column_width,
            self.params.column_gap,
            self.params.vertical_gap,
            reservation,
        );

        let mut slots = Vec::with_capacity(packing.slots.len() + 1);
        let block = reserved.map(|(item, block)| {
            slots.push(LayoutSlot {
                item,
                x: block.bounds.x,
                y: block.bounds.y,
                width: block.bounds.width,
                height: block.bounds.height,
            });
            block
        });
        slots.extend(packing.slots);

        let content_height = block
            .map(|b| b.bounds.bottom())
            .unwrap_or(0.0)
            .max(packing.content_height);

        Layout {
            signature,
            grid,
            slots,
            reserved: block,
            content_height,
            skipped: packing.skipped,
        }
    }

    fn publish(&mut self, ticket: PassTicket, layout: Layout) {
        info!(
            pass = ticket.pass,
            columns = layout.grid.column_count,
            slots = layout.slots.len(),
            height = layout.content_height,
            "📐 layout published"
        );
        self.published = Some(layout);
        if ticket.pass == self.passes {
            self.phase = PassPhase::Published;
        }
    }
}
