/// Fullscreen overlay: a dimmed backdrop with the focused image on top.
/// Clicking anywhere closes it.

use iced::widget::image::Handle;
use iced::widget::{container, image, mouse_area};
use iced::{Background, Color, ContentFit, Element, Length, Theme};

use super::anchored::Anchored;
use crate::layout::geometry::Rect;
use crate::state::data::ImageItem;
use crate::Message;

pub fn overlay(item: &ImageItem, rect: Rect, opacity: f32, viewport_height: f32) -> Element<'_, Message> {
    let focused = Anchored::new(viewport_height).push(
        rect,
        image(Handle::from_path(&item.url))
            .width(Length::Fill)
            .height(Length::Fill)
            .content_fit(ContentFit::Fill),
    );

    let backdrop = Color {
        a: opacity.clamp(0.0, 1.0),
        ..Color::BLACK
    };

    mouse_area(
        container(focused)
            .width(Length::Fill)
            .height(Length::Fill)
            .style(move |_theme: &Theme| container::Style {
                background: Some(Background::Color(backdrop)),
                ..container::Style::default()
            }),
    )
    .on_press(Message::CloseFullscreen)
    .into()
}
