/// Selection state machine: browsing, detail card and fullscreen overlay.
///
/// The controller is the single owner of selection and focus. The selected
/// item is derived from the current route and the items that are actually
/// displayed; the focused (fullscreen) item is a snapshot that lives in the
/// overlay layer until its closing animation has finished.

use std::time::{Duration, Instant};

use iced::Size;
use tracing::{debug, info};

use super::route::{History, Route};
use super::transition::{Easing, Tween};
use crate::layout::geometry::Rect;
use crate::state::data::{ImageId, ImageItem};

/// Share of the viewport width a landscape image gets in fullscreen
pub const LANDSCAPE_WIDTH_RATIO: f32 = 0.6;
/// Share of the viewport height a portrait or square image gets in fullscreen
pub const PORTRAIT_HEIGHT_RATIO: f32 = 0.8;
/// Backdrop opacity once the overlay is fully open
pub const BACKDROP_OPACITY: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browsing,
    Detail(ImageId),
    Fullscreen(ImageId),
}

/// Result of a back navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Back {
    /// The overlay has to animate back; the caller supplies the return rect
    CloseOverlay(ImageId),
    /// A route was popped
    Route(Route),
    /// Already at the start of the history
    Nothing,
}

#[derive(Debug, Clone)]
struct Focus {
    item: ImageItem,
    tween: Tween,
    closing: bool,
}

/// Where a fullscreen image ends up: landscape images take 60 % of the
/// viewport width, the rest 80 % of its height, centered either way
pub fn fullscreen_target(item: &ImageItem, viewport: Size) -> Rect {
    let (width, height) = if !item.has_valid_dimensions() {
        let side = viewport.width.min(viewport.height) * PORTRAIT_HEIGHT_RATIO;
        (side, side)
    } else if item.width > item.height {
        let width = viewport.width * LANDSCAPE_WIDTH_RATIO;
        (width, width * item.height / item.width)
    } else {
        let height = viewport.height * PORTRAIT_HEIGHT_RATIO;
        (height * item.width / item.height, height)
    };

    Rect::new(
        (viewport.width - width) / 2.0,
        (viewport.height - height) / 2.0,
        width,
        height,
    )
}

#[derive(Debug)]
pub struct SelectionController {
    history: History,
    selected: Option<ImageId>,
    focus: Option<Focus>,
    duration: Duration,
}

impl SelectionController {
    /// Starting on an image route still puts the gallery below it, so back
    /// leads there
    pub fn new(start: Route, duration: Duration) -> Self {
        let mut history = History::default();
        history.push(start);
        Self {
            history,
            selected: None,
            focus: None,
            duration,
        }
    }

    pub fn route(&self) -> Route {
        self.history.current()
    }

    pub fn mode(&self) -> Mode {
        match (&self.focus, self.selected) {
            (Some(focus), _) => Mode::Fullscreen(focus.item.id),
            (None, Some(id)) => Mode::Detail(id),
            (None, None) => Mode::Browsing,
        }
    }

    /// Click on a grid item. Returns false if it was already open.
    pub fn open(&mut self, id: ImageId) -> bool {
        let pushed = self.history.push(Route::Image(id));
        if pushed {
            debug!(route = %self.route(), "navigated");
        }
        pushed
    }

    pub fn navigate_back(&mut self) -> Back {
        if let Some(focus) = &self.focus {
            if !focus.closing {
                return Back::CloseOverlay(focus.item.id);
            }
        }

        match self.history.back() {
            Some(route) => {
                debug!(%route, "navigated back");
                Back::Route(route)
            }
            None => Back::Nothing,
        }
    }

    /// Derive the selection from the route. A route naming an image that is
    /// not displayed selects nothing.
    pub fn sync_with(&mut self, visible: &[ImageItem]) -> Option<ImageId> {
        self.selected = self
            .route()
            .image()
            .filter(|id| visible.iter().any(|item| item.id == *id));
        self.selected
    }

    /// Click on the detail card image. `on_screen` is where the image is
    /// drawn right now and must be captured before anything re-renders.
    pub fn enter_fullscreen(&mut self, item: ImageItem, on_screen: Rect, viewport: Size, now: Instant) -> bool {
        if self.selected != Some(item.id) || self.focus.is_some() {
            return false;
        }

        let target = fullscreen_target(&item, viewport);
        info!(image = %item.id, "🔍 fullscreen");
        self.focus = Some(Focus {
            item,
            tween: Tween::new(on_screen, target, now, self.duration, Easing::EaseInOut),
            closing: false,
        });
        true
    }

    /// Start the closing animation toward the item's recomputed on-screen
    /// rectangle. The overlay is removed by [`tick`](Self::tick) once done.
    pub fn leave_fullscreen(&mut self, return_to: Rect, now: Instant) -> bool {
        let duration = self.duration;
        match self.focus.as_mut() {
            Some(focus) if !focus.closing => {
                let from = focus.tween.sample(now);
                focus.tween = Tween::new(from, return_to, now, duration, Easing::EaseInOut);
                focus.closing = true;
                true
            }
            _ => false,
        }
    }

    /// The window changed size. An open overlay heads for the target of the
    /// new viewport without restarting its animation; a closing one keeps
    /// going back to the grid.
    pub fn resize_viewport(&mut self, viewport: Size) -> bool {
        match self.focus.as_mut() {
            Some(focus) if !focus.closing => {
                let target = fullscreen_target(&focus.item, viewport);
                focus.tween = focus.tween.with_target(target);
                true
            }
            _ => false,
        }
    }

    /// Advance animations. Returns true while the overlay is still moving.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(focus) = &self.focus else {
            return false;
        };

        let finished = focus.tween.is_finished(now);
        if finished && focus.closing {
            debug!(image = %focus.item.id, "overlay removed");
            self.focus = None;
        }
        !finished
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        self.focus
            .as_ref()
            .is_some_and(|focus| !focus.tween.is_finished(now) || focus.closing)
    }

    pub fn overlay_item(&self) -> Option<&ImageItem> {
        self.focus.as_ref().map(|focus| &focus.item)
    }

    pub fn overlay_rect(&self, now: Instant) -> Option<Rect> {
        self.focus.as_ref().map(|focus| focus.tween.sample(now))
    }

    /// Backdrop opacity, fading in while opening and out while closing
    pub fn overlay_opacity(&self, now: Instant) -> f32 {
        match &self.focus {
            None => 0.0,
            Some(focus) => {
                let t = Easing::EaseInOut.apply(focus.tween.progress(now));
                let shown = if focus.closing { 1.0 - t } else { t };
                shown * BACKDROP_OPACITY
            }
        }
    }

    /// The focused item is drawn by the overlay instead of the grid
    pub fn is_excluded_from_grid(&self, id: ImageId) -> bool {
        self.focus.as_ref().is_some_and(|focus| focus.item.id == id)
    }
}
