/// Search bar: selected tag chips, the search input, `#tag` suggestions and
/// the import button
///
/// Fixed height, so the grid below starts at a known offset.

use iced::widget::{button, column, container, row, text, text_input, Row};
use iced::{Alignment, Background, Border, Element, Length, Theme};

use crate::color;
use crate::search::SearchFacet;
use crate::state::data::Tag;
use crate::Message;

pub const SEARCH_BAR_HEIGHT: f32 = 96.0;
const BAR_PADDING: f32 = 12.0;
const MAIN_ROW_HEIGHT: f32 = 40.0;
const SUGGESTION_ROW_HEIGHT: f32 = 24.0;

pub fn view<'a>(facet: &'a SearchFacet, suggestions: Vec<Tag>, status: &'a str) -> Element<'a, Message> {
    let chips = facet.selected_tags().iter().map(|tag| {
        chip(
            tag,
            format!("#{}  ✕", tag.name),
            Message::SearchRemoveTag(tag.id),
        )
    });

    let mut main = Row::with_children(chips)
        .push(
            text_input("Search by name, # to filter by tag", facet.input())
                .on_input(Message::SearchInput)
                .on_submit(Message::SearchSubmit)
                .padding(8)
                .width(Length::Fill),
        )
        .spacing(8)
        .align_y(Alignment::Center)
        .height(MAIN_ROW_HEIGHT);

    if facet.has_content() {
        main = main.push(button("Clear").on_press(Message::SearchClear).padding([8, 12]));
    }
    main = main.push(button("Import Folder").on_press(Message::ImportFolder).padding([8, 12]));

    let hints = if suggestions.is_empty() {
        row![text(status).size(13)]
    } else {
        Row::with_children(
            suggestions
                .into_iter()
                .map(|tag| chip(&tag, format!("#{}", tag.name), Message::SearchSelectTag(tag.clone()))),
        )
    };

    container(
        column![main, hints.spacing(6).height(SUGGESTION_ROW_HEIGHT).align_y(Alignment::Center)].spacing(8),
    )
    .padding(BAR_PADDING)
    .width(Length::Fill)
    .height(SEARCH_BAR_HEIGHT)
    .into()
}

fn chip<'a>(tag: &Tag, label: String, on_press: Message) -> Element<'a, Message> {
    let fill = color::tag_color(&tag.color);
    let label_color = color::text_on(fill);

    button(text(label).size(13).color(label_color))
        .padding([3, 8])
        .on_press(on_press)
        .style(move |_theme: &Theme, _status| button::Style {
            background: Some(Background::Color(fill)),
            text_color: label_color,
            border: Border {
                radius: 11.0.into(),
                ..Border::default()
            },
            ..button::Style::default()
        })
        .into()
}
