/// The masonry grid
///
/// Every slot of the published layout becomes an anchored child at the
/// rectangle the anchor animator reports for it right now. The selected
/// item's slot holds the detail card; its image is a separate child on top.

use std::time::Instant;

use iced::widget::image::Handle;
use iced::widget::{container, image, mouse_area, scrollable, text, Space};
use iced::{mouse, ContentFit, Element, Length};

use super::anchored::Anchored;
use super::detail;
use crate::layout::engine::Layout;
use crate::selection::controller::SelectionController;
use crate::selection::transition::{AnchorAnimator, AnchorKey};
use crate::state::data::ImageItem;
use crate::Message;

pub struct GalleryView<'a> {
    pub layout: Option<&'a Layout>,
    pub animator: &'a AnchorAnimator,
    pub selection: &'a SelectionController,
    pub tag_input: &'a str,
    pub padding: [f32; 2],
    pub loaded: bool,
}

impl<'a> GalleryView<'a> {
    pub fn view(self, now: Instant) -> Element<'a, Message> {
        let Some(layout) = self.layout.filter(|layout| !layout.slots.is_empty()) else {
            let message = if self.loaded {
                "No images here. Import a folder or change the search."
            } else {
                "Loading library..."
            };
            return container(text(message).size(16))
                .width(Length::Fill)
                .height(Length::Fill)
                .center_x(Length::Fill)
                .center_y(Length::Fill)
                .into();
        };

        let mut grid = Anchored::new(layout.content_height);

        for slot in &layout.slots {
            let id = slot.item.id;
            let rect = self
                .animator
                .rect(AnchorKey::Slot(id), now)
                .unwrap_or_else(|| slot.rect());

            let child: Element<'a, Message> = match layout.reserved {
                Some(reserved) if reserved.item == id => {
                    detail::card(&slot.item, reserved.image.height, self.tag_input)
                }
                _ if self.selection.is_excluded_from_grid(id) => Space::new(Length::Fill, Length::Fill).into(),
                _ => thumbnail(&slot.item, Message::Open(id)),
            };
            grid = grid.push(rect, child);
        }

        if let Some(reserved) = layout.reserved {
            let rect = self
                .animator
                .rect(AnchorKey::SelectedImage(reserved.item), now)
                .unwrap_or(reserved.image);
            let selected = layout.slot(reserved.item).map(|slot| &slot.item);

            let child: Element<'a, Message> = match selected {
                Some(item) if !self.selection.is_excluded_from_grid(item.id) => {
                    thumbnail(item, Message::EnterFullscreen(item.id))
                }
                _ => Space::new(Length::Fill, Length::Fill).into(),
            };
            grid = grid.push(rect, child);
        }

        let [padding_y, padding_x] = self.padding;
        scrollable(container(grid).padding([padding_y, padding_x]))
            .on_scroll(Message::Scrolled)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}

fn thumbnail(item: &ImageItem, on_press: Message) -> Element<'_, Message> {
    mouse_area(
        image(Handle::from_path(&item.url))
            .width(Length::Fill)
            .height(Length::Fill)
            .content_fit(ContentFit::Cover),
    )
    .on_press(on_press)
    .interaction(mouse::Interaction::Pointer)
    .into()
}
