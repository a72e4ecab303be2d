/// Absolute positioning container
///
/// Places every child at an explicit rectangle inside a box of fixed height.
/// The masonry grid and the fullscreen overlay use it to draw widgets exactly
/// where the layout engine (or an animation) says they are.

use iced::advanced::layout::{self, Layout};
use iced::advanced::renderer;
use iced::advanced::widget::{Tree, Widget};
use iced::advanced::{Clipboard, Shell};
use iced::event;
use iced::mouse;
use iced::{Element, Event, Length, Rectangle, Size};

use crate::layout::geometry::Rect;

pub struct Anchored<'a, Message, Theme = iced::Theme, Renderer = iced::Renderer> {
    width: Length,
    height: f32,
    anchors: Vec<Rectangle>,
    children: Vec<Element<'a, Message, Theme, Renderer>>,
}

impl<'a, Message, Theme, Renderer> Anchored<'a, Message, Theme, Renderer>
where
    Renderer: renderer::Renderer,
{
    /// An empty container `height` pixels tall, filling the available width
    pub fn new(height: f32) -> Self {
        Self {
            width: Length::Fill,
            height: height.max(0.0),
            anchors: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn width(mut self, width: impl Into<Length>) -> Self {
        self.width = width.into();
        self
    }

    /// Add `child` at `rect`. Children are drawn in insertion order, so later
    /// children end up on top.
    pub fn push(mut self, rect: Rect, child: impl Into<Element<'a, Message, Theme, Renderer>>) -> Self {
        self.anchors.push(rect.into());
        self.children.push(child.into());
        self
    }
}

impl<'a, Message, Theme, Renderer> Widget<Message, Theme, Renderer> for Anchored<'a, Message, Theme, Renderer>
where
    Renderer: renderer::Renderer,
{
    fn size(&self) -> Size<Length> {
        Size::new(self.width, Length::Fixed(self.height))
    }

    fn children(&self) -> Vec<Tree> {
        self.children.iter().map(Tree::new).collect()
    }

    fn diff(&self, tree: &mut Tree) {
        tree.diff_children(&self.children);
    }

    fn layout(&self, tree: &mut Tree, renderer: &Renderer, limits: &layout::Limits) -> layout::Node {
        let size = limits.resolve(self.width, Length::Fixed(self.height), Size::ZERO);

        let nodes = self
            .children
            .iter()
            .zip(&mut tree.children)
            .zip(&self.anchors)
            .map(|((child, state), anchor)| {
                // children get exactly their anchor's size
                let limits = layout::Limits::new(anchor.size(), anchor.size());
                child
                    .as_widget()
                    .layout(state, renderer, &limits)
                    .move_to(anchor.position())
            })
            .collect();

        layout::Node::with_children(size, nodes)
    }

    fn draw(
        &self,
        tree: &Tree,
        renderer: &mut Renderer,
        theme: &Theme,
        style: &renderer::Style,
        layout: Layout<'_>,
        cursor: mouse::Cursor,
        viewport: &Rectangle,
    ) {
        for ((child, state), child_layout) in self
            .children
            .iter()
            .zip(&tree.children)
            .zip(layout.children())
        {
            // skip anything scrolled out of view
            if child_layout.bounds().intersection(viewport).is_none() {
                continue;
            }
            child
                .as_widget()
                .draw(state, renderer, theme, style, child_layout, cursor, viewport);
        }
    }

    fn on_event(
        &mut self,
        tree: &mut Tree,
        event: Event,
        layout: Layout<'_>,
        cursor: mouse::Cursor,
        renderer: &Renderer,
        clipboard: &mut dyn Clipboard,
        shell: &mut Shell<'_, Message>,
        viewport: &Rectangle,
    ) -> event::Status {
        // topmost children get the event first
        let children: Vec<_> = self
            .children
            .iter_mut()
            .zip(&mut tree.children)
            .zip(layout.children())
            .collect();

        let mut status = event::Status::Ignored;
        for ((child, state), child_layout) in children.into_iter().rev() {
            status = status.merge(child.as_widget_mut().on_event(
                state,
                event.clone(),
                child_layout,
                cursor,
                renderer,
                clipboard,
                shell,
                viewport,
            ));
            if status == event::Status::Captured {
                break;
            }
        }
        status
    }

    fn mouse_interaction(
        &self,
        tree: &Tree,
        layout: Layout<'_>,
        cursor: mouse::Cursor,
        viewport: &Rectangle,
        renderer: &Renderer,
    ) -> mouse::Interaction {
        self.children
            .iter()
            .zip(&tree.children)
            .zip(layout.children())
            .map(|((child, state), child_layout)| {
                child
                    .as_widget()
                    .mouse_interaction(state, child_layout, cursor, viewport, renderer)
            })
            .max()
            .unwrap_or_default()
    }
}

impl<'a, Message, Theme, Renderer> From<Anchored<'a, Message, Theme, Renderer>> for Element<'a, Message, Theme, Renderer>
where
    Message: 'a,
    Theme: 'a,
    Renderer: renderer::Renderer + 'a,
{
    fn from(anchored: Anchored<'a, Message, Theme, Renderer>) -> Self {
        Element::new(anchored)
    }
}
