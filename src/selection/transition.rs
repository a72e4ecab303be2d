/// Rectangle tweens and the animator that moves grid anchors between layouts.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::layout::engine::Layout;
use crate::layout::geometry::Rect;
use crate::state::data::ImageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    Linear,
    #[default]
    EaseInOut,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            // cubic
            Easing::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// Interpolation between two rectangles over a fixed duration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    from: Rect,
    to: Rect,
    start: Instant,
    duration: Duration,
    easing: Easing,
}

impl Tween {
    pub fn new(from: Rect, to: Rect, start: Instant, duration: Duration, easing: Easing) -> Self {
        Self {
            from,
            to,
            start,
            duration,
            easing,
        }
    }

    /// A tween that is already at `rect`
    pub fn fixed(rect: Rect, now: Instant) -> Self {
        Self::new(rect, rect, now, Duration::ZERO, Easing::Linear)
    }

    /// Same start and timing, new destination
    pub fn with_target(self, to: Rect) -> Self {
        Self { to, ..self }
    }

    /// Linear progress in 0..=1
    pub fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    pub fn sample(&self, now: Instant) -> Rect {
        let t = self.easing.apply(self.progress(now));
        self.from.lerp(&self.to, t)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }
}

/// What an anchor tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorKey {
    /// The grid slot of an item (the whole detail frame when selected)
    Slot(ImageId),
    /// The image inside the selected item's detail frame
    SelectedImage(ImageId),
}

/// Tweens every anchor of the published layout from where it is displayed
/// now to where the newest layout puts it
#[derive(Debug, Clone)]
pub struct AnchorAnimator {
    duration: Duration,
    easing: Easing,
    anchors: HashMap<AnchorKey, Tween>,
}

impl AnchorAnimator {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            easing: Easing::EaseInOut,
            anchors: HashMap::new(),
        }
    }

    pub fn retarget(&mut self, layout: &Layout, now: Instant) {
        let selected = layout.reserved.map(|reserved| reserved.item);

        let mut targets: Vec<(AnchorKey, Rect)> = layout
            .slots
            .iter()
            .map(|slot| (AnchorKey::Slot(slot.item.id), slot.rect()))
            .collect();
        if let Some(reserved) = &layout.reserved {
            let image = reserved.image.translate(reserved.bounds.x, reserved.bounds.y);
            targets.push((AnchorKey::SelectedImage(reserved.item), image));
        }

        let mut next = HashMap::with_capacity(targets.len());
        for (key, to) in targets {
            let from = self.seed(key, selected, now).unwrap_or(to);
            let tween = if from == to {
                Tween::fixed(to, now)
            } else {
                Tween::new(from, to, now, self.duration, self.easing)
            };
            next.insert(key, tween);
        }

        self.anchors = next;
    }

    /// Where an anchor starts its move from. `None` means it appears in place.
    fn seed(&self, key: AnchorKey, selected: Option<ImageId>, now: Instant) -> Option<Rect> {
        let displayed = |k: AnchorKey| self.anchors.get(&k).map(|tween| tween.sample(now));

        match key {
            // expand from the item's previous grid rectangle
            AnchorKey::SelectedImage(id) => {
                displayed(AnchorKey::SelectedImage(id)).or_else(|| displayed(AnchorKey::Slot(id)))
            }
            // collapse from the last selected image rectangle
            AnchorKey::Slot(id) if selected != Some(id) => {
                displayed(AnchorKey::SelectedImage(id)).or_else(|| displayed(AnchorKey::Slot(id)))
            }
            AnchorKey::Slot(id) => displayed(AnchorKey::Slot(id)),
        }
    }

    pub fn rect(&self, key: AnchorKey, now: Instant) -> Option<Rect> {
        self.anchors.get(&key).map(|tween| tween.sample(now))
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        self.anchors.values().any(|tween| !tween.is_finished(now))
    }
}
