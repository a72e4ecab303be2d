/// Detail card for the selected image
///
/// Drawn with the same constants `layout::frame` measures with. The image
/// itself is not part of the card: the grid draws it as a separate anchor on
/// top so it can animate between the thumbnail and the card independently.

use iced::widget::{button, column, container, row, text, text_input, Row, Space};
use iced::{Alignment, Background, Border, Element, Length, Theme};

use crate::color;
use crate::layout::frame::{
    BADGE_HEIGHT, BADGE_PADDING_X, BADGE_SPACING, BADGE_TEXT_SIZE, CARD_PADDING, HEADER_HEIGHT,
    SECTION_GAP, UNTAGGED_LABEL,
};
use crate::state::data::{ImageItem, Tag};
use crate::Message;

pub const TAG_INPUT_WIDTH: f32 = 200.0;

pub fn card<'a>(item: &'a ImageItem, image_height: f32, tag_input: &'a str) -> Element<'a, Message> {
    let header = row![
        text(&item.name).size(18).width(Length::Fill),
        text_input("Add tag…", tag_input)
            .on_input(Message::TagInput)
            .on_submit(Message::TagSubmit)
            .size(14)
            .padding(6)
            .width(TAG_INPUT_WIDTH),
        button(text("Add").size(14)).on_press(Message::TagSubmit).padding([6, 10]),
        button(text("✕").size(14)).on_press(Message::Back).padding([6, 10]),
    ]
    .spacing(8)
    .align_y(Alignment::Center)
    .height(HEADER_HEIGHT);

    let content = column![
        header,
        Space::with_height(image_height),
        footer(item),
    ]
    .spacing(SECTION_GAP);

    container(content)
        .padding(CARD_PADDING)
        .width(Length::Fill)
        .height(Length::Fill)
        .style(|theme: &Theme| {
            let palette = theme.extended_palette();
            container::Style {
                background: Some(Background::Color(palette.background.weak.color)),
                border: Border {
                    radius: 8.0.into(),
                    ..Border::default()
                },
                ..container::Style::default()
            }
        })
        .into()
}

fn footer(item: &ImageItem) -> Element<'_, Message> {
    if item.tags.is_empty() {
        return container(text(UNTAGGED_LABEL).size(BADGE_TEXT_SIZE))
            .height(BADGE_HEIGHT)
            .align_y(Alignment::Center)
            .into();
    }

    Row::with_children(item.tags.iter().map(|tag| badge(item, tag)))
        .spacing(BADGE_SPACING)
        .wrap()
        .into()
}

/// Clicking a badge removes the tag. Tags still being created can't be removed.
fn badge<'a>(item: &'a ImageItem, tag: &'a Tag) -> Element<'a, Message> {
    let fill = color::tag_color(&tag.color);
    let label = color::text_on(fill);
    let pending = tag.is_optimistic();

    button(text(&tag.name).size(BADGE_TEXT_SIZE).color(label))
        .padding([3.0, BADGE_PADDING_X])
        .height(BADGE_HEIGHT)
        .on_press_maybe((!pending).then_some(Message::RemoveTag(item.id, tag.id)))
        .style(move |_theme: &Theme, _status| button::Style {
            background: Some(Background::Color(if pending { fill.scale_alpha(0.5) } else { fill })),
            text_color: label,
            border: Border {
                radius: (BADGE_HEIGHT / 2.0).into(),
                ..Border::default()
            },
            ..button::Style::default()
        })
        .into()
}
