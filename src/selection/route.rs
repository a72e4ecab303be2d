/// In-process navigation: `/` is the gallery, `/<id>/` selects one image.

use std::fmt;

use crate::state::data::ImageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Route {
    #[default]
    Gallery,
    Image(ImageId),
}

impl Route {
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Some(Route::Gallery);
        }
        // only a single numeric segment is a valid image route
        if trimmed.contains('/') {
            return None;
        }
        trimmed.parse::<i64>().ok().map(|id| Route::Image(ImageId(id)))
    }

    pub fn path(&self) -> String {
        match self {
            Route::Gallery => "/".to_string(),
            Route::Image(id) => format!("/{id}/"),
        }
    }

    pub fn image(&self) -> Option<ImageId> {
        match self {
            Route::Gallery => None,
            Route::Image(id) => Some(*id),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Back stack of visited routes. Never empty; the bottom entry is where the
/// session started.
#[derive(Debug, Clone)]
pub struct History {
    stack: Vec<Route>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(Route::Gallery)
    }
}

impl History {
    pub fn new(start: Route) -> Self {
        Self { stack: vec![start] }
    }

    pub fn current(&self) -> Route {
        self.stack.last().copied().unwrap_or_default()
    }

    /// Returns false when `route` is already current
    pub fn push(&mut self, route: Route) -> bool {
        if self.current() == route {
            return false;
        }
        self.stack.push(route);
        true
    }

    /// Pop the current route. `None` at the bottom of the stack.
    pub fn back(&mut self) -> Option<Route> {
        if !self.can_go_back() {
            return None;
        }
        self.stack.pop();
        Some(self.current())
    }

    pub fn can_go_back(&self) -> bool {
        self.stack.len() > 1
    }
}
